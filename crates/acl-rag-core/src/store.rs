//! Authoritative in-memory document registry.
//!
//! Keyed by document id behind a `std::sync::RwLock`, so id resolution at
//! query time is a single hash lookup. The vector index only caches a
//! permission summary; authorization always reads from here.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{Result, RetrievalError};
use crate::models::Document;

#[derive(Default)]
pub struct DocumentStore {
    docs: RwLock<HashMap<String, Document>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Document>> {
        self.docs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Document>> {
        self.docs.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, id: &str) -> Option<Document> {
        self.read().get(id).cloned()
    }

    /// Register a document. Fails with [`RetrievalError::DuplicateId`] if
    /// the id is already present; the existing document is left untouched.
    pub fn put(&self, document: Document) -> Result<()> {
        let mut docs = self.write();
        if docs.contains_key(&document.id) {
            return Err(RetrievalError::DuplicateId {
                doc_id: document.id,
            });
        }
        docs.insert(document.id.clone(), document);
        Ok(())
    }

    /// Drop a document whose ingestion failed part-way.
    pub(crate) fn remove(&self, id: &str) -> Option<Document> {
        self.write().remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Snapshot of all documents, sorted by id.
    pub fn documents(&self) -> Vec<Document> {
        let mut docs: Vec<Document> = self.read().values().cloned().collect();
        docs.sort_by(|a, b| a.id.cmp(&b.id));
        docs
    }
}
