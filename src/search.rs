//! `aclrag search`: authorized retrieval from the command line.

use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use acl_rag_core::models::{Principal, SearchHit};

use crate::config::Config;
use crate::dataset::Dataset;
use crate::pipeline::build_retriever;

/// Options for a single CLI search.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub query: String,
    pub user: String,
    /// Overrides the user's dataset groups when non-empty.
    pub groups: Vec<String>,
    pub top_k: Option<usize>,
}

#[derive(Debug, Serialize)]
struct SearchOutput<'a> {
    query: &'a str,
    principal: &'a Principal,
    top_k: usize,
    results: &'a [SearchHit],
}

/// Resolve the principal, build a retriever over `dataset`, and search.
pub async fn search_documents(
    config: &Config,
    dataset: &Dataset,
    request: &SearchRequest,
) -> Result<(Principal, Vec<SearchHit>)> {
    let principal = dataset.resolve_principal(&request.user, &request.groups)?;
    let top_k = request.top_k.unwrap_or(config.retrieval.top_k);

    let retriever = build_retriever(config, dataset, None).await?;
    let hits = retriever.search(&request.query, &principal, top_k).await?;
    Ok((principal, hits))
}

pub async fn run_search(
    config: &Config,
    dataset_path: Option<&Path>,
    request: &SearchRequest,
    json: bool,
) -> Result<()> {
    let dataset = Dataset::load_or_sample(dataset_path)?;
    let (principal, hits) = search_documents(config, &dataset, request).await?;

    if json {
        let output = SearchOutput {
            query: &request.query,
            principal: &principal,
            top_k: request.top_k.unwrap_or(config.retrieval.top_k),
            results: &hits,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let groups: Vec<&str> = principal.groups.iter().map(String::as_str).collect();
    println!(
        "query: \"{}\"  user: {} (groups: [{}])",
        request.query,
        principal.id,
        groups.join(", ")
    );

    if hits.is_empty() {
        println!("No accessible results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!("{}. [{:.4}] {} / {}", i + 1, hit.similarity, hit.doc_id, hit.title);
        println!("    excerpt: \"{}\"", hit.content.replace('\n', " ").trim());
    }

    Ok(())
}
