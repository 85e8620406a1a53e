//! In-memory [`VectorIndex`] implementation.
//!
//! Uses a `BTreeMap` behind `std::sync::RwLock` for thread safety. Query
//! is brute-force cosine distance over every stored vector.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::cosine_distance;

use super::{rank_matches, IndexMatch, IndexedEntry, VectorIndex};

#[derive(Default)]
pub struct InMemoryIndex {
    entries: RwLock<BTreeMap<String, IndexedEntry>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, entry: IndexedEntry) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(entry.id.clone(), entry);
        Ok(())
    }

    async fn query(&self, vector: &[f32], n: usize) -> Result<Vec<IndexMatch>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let matches = entries
            .values()
            .map(|e| IndexMatch {
                id: e.id.clone(),
                text: e.text.clone(),
                metadata: e.metadata.clone(),
                distance: cosine_distance(vector, &e.vector),
            })
            .collect();
        Ok(rank_matches(matches, n))
    }

    async fn entries(&self) -> Result<Vec<IndexedEntry>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.values().cloned().collect())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.read().unwrap_or_else(PoisonError::into_inner).len())
    }
}
