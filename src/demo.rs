//! `aclrag demo` and `aclrag matrix`: tabular views of a dataset and a
//! scripted set of searches with their audit trail.

use anyhow::Result;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use acl_rag_core::audit::{AuditSink, FanoutAuditSink, MemoryAuditSink, TracingAuditSink};
use acl_rag_core::models::{Document, Principal};
use acl_rag_core::policy::AccessMatrix;

use crate::config::Config;
use crate::dataset::Dataset;
use crate::pipeline::build_retriever;

/// `(query, user)` pairs run by the demo.
pub const DEMO_CASES: &[(&str, &str)] = &[
    ("API", "alice"),
    ("API", "charlie"),
    ("リモートワーク", "guest"),
    ("設計", "alice"),
    ("設計", "bob"),
    ("技術", "bob"),
];

pub fn format_documents(documents: &[Document]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<8} {:<6} {:<10} {:<8} TITLE", "ID", "PERM", "OWNER", "GROUP");
    for doc in documents {
        let _ = writeln!(
            out,
            "{:<8} {:<6} {:<10} {:<8} {}",
            doc.id, doc.permissions, doc.owner, doc.group, doc.title
        );
    }
    out
}

pub fn format_principals(principals: &[Principal]) -> String {
    let mut out = String::new();
    for p in principals {
        let groups: Vec<&str> = p.groups.iter().map(String::as_str).collect();
        let _ = writeln!(out, "{:<10} [{}]", p.id, groups.join(", "));
    }
    out
}

/// One row per principal, `✓` where it may read the column's document.
pub fn format_matrix(matrix: &AccessMatrix) -> String {
    let mut out = String::new();
    let _ = write!(out, "{:<10}", "");
    for doc in &matrix.documents {
        let _ = write!(out, " {:^6}", doc);
    }
    out.push('\n');

    for (principal, row) in matrix.principals.iter().zip(&matrix.cells) {
        let _ = write!(out, "{:<10}", principal);
        for allowed in row {
            let _ = write!(out, " {:^6}", if *allowed { "✓" } else { "-" });
        }
        out.push('\n');
    }
    out
}

pub fn run_matrix(dataset_path: Option<&Path>) -> Result<()> {
    let dataset = Dataset::load_or_sample(dataset_path)?;
    let matrix = acl_rag_core::policy::access_matrix(&dataset.principals, &dataset.documents);
    print!("{}", format_matrix(&matrix));
    Ok(())
}

pub async fn run_demo(config: &Config, dataset_path: Option<&Path>) -> Result<()> {
    let dataset = Dataset::load_or_sample(dataset_path)?;

    println!("--- Documents ---");
    print!("{}", format_documents(&dataset.documents));
    println!();
    println!("--- Principals ---");
    print!("{}", format_principals(&dataset.principals));
    println!();
    println!("--- Access Matrix ---");
    let matrix = acl_rag_core::policy::access_matrix(&dataset.principals, &dataset.documents);
    print!("{}", format_matrix(&matrix));

    let memory = Arc::new(MemoryAuditSink::new());
    let sinks: Vec<Arc<dyn AuditSink>> = vec![memory.clone(), Arc::new(TracingAuditSink)];
    let retriever =
        build_retriever(config, &dataset, Some(Arc::new(FanoutAuditSink::new(sinks)))).await?;

    for (query, user) in DEMO_CASES {
        let Some(principal) = dataset.principal(user) else {
            println!();
            println!("=== \"{}\" as {} ===", query, user);
            println!("skipped: unknown user '{}'", user);
            continue;
        };

        let hits = retriever
            .search(query, principal, config.retrieval.top_k)
            .await?;

        println!();
        println!("=== \"{}\" as {} ===", query, user);
        if hits.is_empty() {
            println!("No accessible results.");
        }
        for (i, hit) in hits.iter().enumerate() {
            println!("{}. [{:.4}] {} / {}", i + 1, hit.similarity, hit.doc_id, hit.title);
        }
        println!("audit:");
        for record in memory.take() {
            println!("    {}", record);
        }
    }

    Ok(())
}
