//! `aclrag index` and `aclrag show`: populate and inspect a persistent index.
//!
//! Index entries cache each document's owner, group, and permission summary
//! as of embedding time. Authorization always reads the live document, so a
//! permission change after indexing takes effect immediately; `show` lists
//! the cached value next to the current one so drift is visible.

use anyhow::{bail, Context, Result};
use std::fmt;
use std::path::Path;

use acl_rag_core::index::{EntryMetadata, IndexedEntry};

use crate::config::Config;
use crate::dataset::Dataset;
use crate::pipeline::{build_retriever, open_index};
use crate::sqlite_index::SqliteIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    /// Cached metadata matches the dataset.
    Current,
    /// The document changed since it was embedded.
    Stale,
    /// No dataset document has this id.
    Orphan,
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntryStatus::Current => "ok",
            EntryStatus::Stale => "stale",
            EntryStatus::Orphan => "orphan",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryReport {
    pub id: String,
    pub cached: EntryMetadata,
    pub current: Option<EntryMetadata>,
    pub status: EntryStatus,
}

pub fn compare_entries(entries: &[IndexedEntry], dataset: &Dataset) -> Vec<EntryReport> {
    entries
        .iter()
        .map(|entry| {
            let current = dataset
                .document(&entry.id)
                .map(EntryMetadata::for_document);
            let status = match &current {
                None => EntryStatus::Orphan,
                Some(meta) if *meta == entry.metadata => EntryStatus::Current,
                Some(_) => EntryStatus::Stale,
            };
            EntryReport {
                id: entry.id.clone(),
                cached: entry.metadata.clone(),
                current,
                status,
            }
        })
        .collect()
}

pub async fn run_index(config: &Config, dataset_path: Option<&Path>, reset: bool) -> Result<()> {
    let dataset = Dataset::load_or_sample(dataset_path)?;

    if reset {
        if config.index.backend != "sqlite" {
            bail!("--reset requires the sqlite index backend");
        }
        let path = config
            .index
            .path
            .as_deref()
            .context("index.path must be set when backend is 'sqlite'")?;
        let index = SqliteIndex::open(path).await?;
        let removed = index.clear().await?;
        index.close().await;
        println!("Cleared {} index entries.", removed);
    }

    let retriever = build_retriever(config, &dataset, None).await?;
    let total = retriever.index().len().await?;
    println!(
        "Indexed {} documents with {} ({} entries in {} index).",
        retriever.store().len(),
        retriever.provider().model_name(),
        total,
        config.index.backend
    );
    if config.index.backend == "memory" {
        println!("Note: the memory backend is not persisted between runs.");
    }
    Ok(())
}

pub async fn run_show(config: &Config, dataset_path: Option<&Path>) -> Result<()> {
    let dataset = Dataset::load_or_sample(dataset_path)?;
    let index = open_index(config).await?;
    let entries = index.entries().await?;

    if entries.is_empty() {
        println!("Index is empty. Run `aclrag index` first.");
        return Ok(());
    }

    println!(
        "{:<8} {:<10} {:<8} {:<7} {:<8} STATUS",
        "ID", "OWNER", "GROUP", "CACHED", "CURRENT"
    );
    for report in compare_entries(&entries, &dataset) {
        let current = report
            .current
            .as_ref()
            .map(|m| m.permissions.as_str())
            .unwrap_or("?");
        println!(
            "{:<8} {:<10} {:<8} {:<7} {:<8} {}",
            report.id,
            report.cached.owner,
            report.cached.group,
            report.cached.permissions,
            current,
            report.status
        );
    }
    Ok(())
}
