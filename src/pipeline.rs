//! Wiring: configuration + dataset → a loaded [`Retriever`].

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing::info;

use acl_rag_core::audit::AuditSink;
use acl_rag_core::index::memory::InMemoryIndex;
use acl_rag_core::index::VectorIndex;
use acl_rag_core::retriever::Retriever;

use crate::config::Config;
use crate::dataset::Dataset;
use crate::embedding::create_provider;
use crate::sqlite_index::SqliteIndex;

/// Open the vector index named by `[index] backend`.
pub async fn open_index(config: &Config) -> Result<Arc<dyn VectorIndex>> {
    match config.index.backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryIndex::new())),
        "sqlite" => {
            let path = config
                .index
                .path
                .as_deref()
                .context("index.path must be set when backend is 'sqlite'")?;
            Ok(Arc::new(SqliteIndex::open(path).await?))
        }
        other => bail!("Unknown index backend: {}", other),
    }
}

/// Build a retriever over the configured index and register every dataset
/// document. Documents whose index entry is already current are not
/// re-embedded.
///
/// With the SQLite backend, entries left by a different dataset remain in
/// the index and surface as inconsistent-index errors at search time; run
/// `aclrag index --reset` to start clean.
pub async fn build_retriever(
    config: &Config,
    dataset: &Dataset,
    audit: Option<Arc<dyn AuditSink>>,
) -> Result<Retriever> {
    let provider = create_provider(&config.embedding)?;
    let index = open_index(config).await?;

    let mut retriever =
        Retriever::new(provider, index).with_options(config.retrieval.options());
    if let Some(sink) = audit {
        retriever = retriever.with_audit_sink(sink);
    }

    let stats = retriever
        .sync_documents(dataset.documents.iter().cloned())
        .await
        .context("Failed to ingest dataset")?;
    info!(
        embedded = stats.embedded,
        unchanged = stats.unchanged,
        backend = %config.index.backend,
        model = retriever.provider().model_name(),
        "retriever ready"
    );

    Ok(retriever)
}
