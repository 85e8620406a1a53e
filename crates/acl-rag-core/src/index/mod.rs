//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait is the nearest-neighbor collaborator the
//! retriever queries. Each document is projected into exactly one
//! [`IndexedEntry`], keyed by the document id. The entry's
//! [`EntryMetadata`] caches the permission state at embedding time for
//! audit and display; it is never consulted for authorization.
//!
//! Implementations must be `Send + Sync` and return matches in ascending
//! distance order.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::Document;

/// Metadata stored next to each vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub doc_id: String,
    pub owner: String,
    pub group: String,
    /// Permission summary at embedding time, e.g. `rr-`.
    pub permissions: String,
    /// SHA-256 of the embedded text.
    pub content_hash: String,
}

impl EntryMetadata {
    pub fn for_document(doc: &Document) -> Self {
        Self {
            doc_id: doc.id.clone(),
            owner: doc.owner.clone(),
            group: doc.group.clone(),
            permissions: doc.permissions.summary(),
            content_hash: content_hash(&doc.embedding_text()),
        }
    }
}

/// The projection of one document into the index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedEntry {
    pub id: String,
    pub vector: Vec<f32>,
    pub text: String,
    pub metadata: EntryMetadata,
}

impl IndexedEntry {
    pub fn new(doc: &Document, vector: Vec<f32>) -> Self {
        Self {
            id: doc.id.clone(),
            vector,
            text: doc.embedding_text(),
            metadata: EntryMetadata::for_document(doc),
        }
    }
}

/// A nearest-neighbor candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMatch {
    pub id: String,
    pub text: String,
    pub metadata: EntryMetadata,
    /// Cosine distance to the query vector; smaller is closer.
    pub distance: f32,
}

/// Abstract nearest-neighbor index.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](VectorIndex::upsert) | Insert or replace the entry for an id |
/// | [`query`](VectorIndex::query) | Top-`n` entries by ascending distance |
/// | [`entries`](VectorIndex::entries) | All stored entries, sorted by id |
/// | [`len`](VectorIndex::len) | Number of stored entries |
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(&self, entry: IndexedEntry) -> Result<()>;

    /// Return at most `n` matches, closest first. Ties are broken by id so
    /// that repeated queries over the same state return the same order.
    async fn query(&self, vector: &[f32], n: usize) -> Result<Vec<IndexMatch>>;

    async fn entries(&self) -> Result<Vec<IndexedEntry>>;

    async fn len(&self) -> Result<usize>;
}

/// Hex SHA-256 of `text`.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Sort matches closest first, breaking ties by id, and keep `n`.
pub fn rank_matches(mut matches: Vec<IndexMatch>, n: usize) -> Vec<IndexMatch> {
    matches.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.id.cmp(&b.id))
    });
    matches.truncate(n);
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Permissions;

    fn m(id: &str, distance: f32) -> IndexMatch {
        IndexMatch {
            id: id.to_string(),
            text: String::new(),
            metadata: EntryMetadata {
                doc_id: id.to_string(),
                owner: String::new(),
                group: String::new(),
                permissions: String::new(),
                content_hash: String::new(),
            },
            distance,
        }
    }

    #[test]
    fn test_metadata_caches_permission_summary() {
        let perms = Permissions::new(true, true, false);
        let doc = Document::new("doc2", "API", "spec", "bob", "eng", perms);
        let meta = EntryMetadata::for_document(&doc);
        assert_eq!(meta.doc_id, "doc2");
        assert_eq!(meta.permissions, "rr-");
        assert_eq!(meta.content_hash, content_hash("API\nspec"));
        assert_eq!(meta.content_hash.len(), 64);
    }

    #[test]
    fn test_rank_matches_orders_and_truncates() {
        let ranked = rank_matches(vec![m("c", 0.5), m("b", 0.1), m("a", 0.5), m("d", 0.9)], 3);
        let ids: Vec<&str> = ranked.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }
}
