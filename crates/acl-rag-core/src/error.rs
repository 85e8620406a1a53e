//! Retrieval error taxonomy.
//!
//! An empty result set is never an error: a search that finds nothing the
//! principal may read returns `Ok(vec![])`.

/// Hard failures of ingestion and search.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// The embedding provider failed to produce a usable vector.
    #[error("embedding failed: {0}")]
    Embedding(#[source] anyhow::Error),

    /// An index candidate has no document in the store. Signals an
    /// ingestion bug, not an authorization failure.
    #[error("index entry '{doc_id}' has no matching document in the store")]
    InconsistentIndex { doc_id: String },

    #[error("document id '{doc_id}' is already registered")]
    DuplicateId { doc_id: String },

    /// The vector index backend failed.
    #[error("vector index failed: {0}")]
    Index(#[source] anyhow::Error),
}

pub type Result<T, E = RetrievalError> = std::result::Result<T, E>;
