//! Access-controlled retriever: ingestion and authorized similarity search.
//!
//! # Search Algorithm
//!
//! 1. Embed the query text (failures surface as
//!    [`RetrievalError::Embedding`], never retried here).
//! 2. Ask the vector index for `top_k × overfetch_factor` nearest
//!    neighbors, since authorization will discard some of them.
//! 3. For each candidate, closest first: resolve its [`Document`] from the
//!    store, evaluate [`can_access`], emit one [`AuditRecord`], and keep it
//!    if allowed with `similarity = 1 - distance`.
//! 4. Truncate to `top_k`, keeping index order.
//!
//! If the over-fetched window holds fewer than `top_k` readable documents
//! the caller gets only those, possibly none. The index is not re-queried
//! with a wider window.
//!
//! # Ingestion
//!
//! [`Retriever::add_document`] reserves the id in the document store before
//! the index entry is written and releases it if embedding or indexing
//! fails. Queries reach documents only through index candidates, so a
//! concurrent search never sees an index entry without its document.
//!
//! [`Retriever::sync_documents`] does the same against a persistent index,
//! skipping the embedding call for documents whose stored entry is current.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::audit::{AuditRecord, AuditSink, TracingAuditSink};
use crate::embedding::EmbeddingProvider;
use crate::error::{Result, RetrievalError};
use crate::index::{EntryMetadata, IndexedEntry, VectorIndex};
use crate::models::{Document, Principal, SearchHit};
use crate::policy::can_access;
use crate::store::DocumentStore;

/// Default multiplier applied to `top_k` when querying the index.
pub const OVERFETCH_FACTOR: usize = 4;

/// Retrieval tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrieverOptions {
    /// Candidates fetched per requested result. Values below 1 are
    /// treated as 1.
    pub overfetch_factor: usize,
}

impl Default for RetrieverOptions {
    fn default() -> Self {
        Self {
            overfetch_factor: OVERFETCH_FACTOR,
        }
    }
}

/// Outcome of [`Retriever::sync_documents`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Documents embedded and written to the index.
    pub embedded: usize,
    /// Documents whose existing entry was reused as-is.
    pub unchanged: usize,
}

/// Joins nearest-neighbor search with the access policy.
///
/// The embedding provider, vector index, and audit sink are injected; the
/// document store is owned.
pub struct Retriever {
    provider: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    store: DocumentStore,
    audit: Arc<dyn AuditSink>,
    options: RetrieverOptions,
}

impl Retriever {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            provider,
            index,
            store: DocumentStore::new(),
            audit: Arc::new(TracingAuditSink),
            options: RetrieverOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RetrieverOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the default [`TracingAuditSink`].
    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    pub fn options(&self) -> RetrieverOptions {
        self.options
    }

    /// Number of candidates requested from the index for `top_k` results.
    pub fn candidate_count(&self, top_k: usize) -> usize {
        top_k.saturating_mul(self.options.overfetch_factor.max(1))
    }

    /// Register a document and write its index entry.
    ///
    /// Fails with [`RetrievalError::DuplicateId`] if the id is already
    /// registered. On embedding or index failure nothing is left behind.
    pub async fn add_document(&self, document: Document) -> Result<()> {
        self.store.put(document.clone())?;

        match self.index_document(&document).await {
            Ok(()) => {
                debug!(
                    doc_id = %document.id,
                    owner = %document.owner,
                    group = %document.group,
                    perm = %document.permissions,
                    "document indexed"
                );
                Ok(())
            }
            Err(err) => {
                self.store.remove(&document.id);
                warn!(doc_id = %document.id, error = %err, "ingestion failed, document released");
                Err(err)
            }
        }
    }

    /// Ingest documents in order, stopping at the first failure.
    ///
    /// Documents added before the failure stay registered. Returns the
    /// number of documents added.
    pub async fn add_documents<I>(&self, documents: I) -> Result<usize>
    where
        I: IntoIterator<Item = Document>,
    {
        let mut added = 0;
        for document in documents {
            if let Err(err) = self.add_document(document).await {
                warn!(added, "batch ingestion stopped");
                return Err(err);
            }
            added += 1;
        }
        info!(added, model = self.provider.model_name(), "batch ingestion complete");
        Ok(added)
    }

    /// Register documents against an index that may already hold entries
    /// for them.
    ///
    /// A document whose stored [`EntryMetadata`] matches its current state
    /// (same owner, group, permissions and content hash) and whose vector
    /// has the provider's dimensionality is registered without embedding.
    /// New or changed documents go through [`Retriever::add_document`].
    /// Stops at the first error, like [`Retriever::add_documents`].
    pub async fn sync_documents<I>(&self, documents: I) -> Result<SyncStats>
    where
        I: IntoIterator<Item = Document>,
    {
        let dims = self.provider.dims();
        let existing: HashMap<String, EntryMetadata> = self
            .index
            .entries()
            .await
            .map_err(RetrievalError::Index)?
            .into_iter()
            .filter(|entry| dims == 0 || entry.vector.len() == dims)
            .map(|entry| (entry.id, entry.metadata))
            .collect();

        let mut stats = SyncStats::default();
        for document in documents {
            let current = EntryMetadata::for_document(&document);
            if existing.get(&document.id) == Some(&current) {
                self.store.put(document)?;
                stats.unchanged += 1;
            } else {
                self.add_document(document).await?;
                stats.embedded += 1;
            }
        }

        info!(
            embedded = stats.embedded,
            unchanged = stats.unchanged,
            model = self.provider.model_name(),
            "index sync complete"
        );
        Ok(stats)
    }

    async fn index_document(&self, document: &Document) -> Result<()> {
        let vector = self.embed(&document.embedding_text()).await?;
        self.index
            .upsert(IndexedEntry::new(document, vector))
            .await
            .map_err(RetrievalError::Index)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vector = self
            .provider
            .embed(text)
            .await
            .map_err(RetrievalError::Embedding)?;

        let dims = self.provider.dims();
        if vector.is_empty() || (dims != 0 && vector.len() != dims) {
            return Err(RetrievalError::Embedding(anyhow!(
                "provider '{}' returned {} dimensions, expected {}",
                self.provider.model_name(),
                vector.len(),
                dims
            )));
        }
        Ok(vector)
    }

    /// Similarity search restricted to documents `principal` may read.
    ///
    /// Returns at most `top_k` hits ordered by descending similarity. An
    /// audit record is emitted for every candidate examined.
    pub async fn search(
        &self,
        query: &str,
        principal: &Principal,
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let search_id = Uuid::new_v4().to_string();
        debug!(%search_id, principal = %principal.id, query, top_k, "search started");

        let query_vec = self.embed(query).await?;
        let requested = self.candidate_count(top_k);
        let candidates = self
            .index
            .query(&query_vec, requested)
            .await
            .map_err(RetrievalError::Index)?;
        debug!(%search_id, requested, candidates = candidates.len(), "index returned candidates");

        let examined = candidates.len();
        let mut hits = Vec::new();

        for candidate in candidates {
            let Some(document) = self.store.get(&candidate.id) else {
                error!(%search_id, doc_id = %candidate.id, "index entry without document");
                return Err(RetrievalError::InconsistentIndex {
                    doc_id: candidate.id,
                });
            };

            let allowed = can_access(principal, &document);
            let similarity = 1.0 - candidate.distance;
            self.audit.record(&AuditRecord::new(
                &search_id, principal, query, &document, allowed, similarity,
            ));

            if allowed {
                hits.push(SearchHit {
                    doc_id: document.id,
                    title: document.title,
                    content: document.body,
                    similarity,
                });
            }
        }

        let accessible = hits.len();
        hits.truncate(top_k);

        info!(
            %search_id,
            principal = %principal.id,
            examined,
            accessible,
            returned = hits.len(),
            "search complete"
        );

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::index::memory::InMemoryIndex;
    use crate::models::Permissions;
    use async_trait::async_trait;

    /// Embeds by keyword presence over a fixed vocabulary.
    struct KeywordProvider;

    const VOCAB: [&str; 4] = ["api", "design", "remote", "stack"];

    #[async_trait]
    impl EmbeddingProvider for KeywordProvider {
        fn model_name(&self) -> &str {
            "keyword-test"
        }
        fn dims(&self) -> usize {
            VOCAB.len() + 1
        }
        async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            let lower = text.to_lowercase();
            let mut v: Vec<f32> = VOCAB
                .iter()
                .map(|w| if lower.contains(w) { 1.0 } else { 0.0 })
                .collect();
            v.push(0.1);
            Ok(v)
        }
    }

    /// Wraps [`KeywordProvider`] and counts embed calls.
    #[derive(Default)]
    struct CountingProvider {
        calls: std::sync::atomic::AtomicUsize,
    }

    impl CountingProvider {
        fn calls(&self) -> usize {
            self.calls.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        fn model_name(&self) -> &str {
            "counting-test"
        }
        fn dims(&self) -> usize {
            KeywordProvider.dims()
        }
        async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            KeywordProvider.embed(text).await
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl EmbeddingProvider for FailingProvider {
        fn model_name(&self) -> &str {
            "failing"
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            anyhow::bail!("provider unavailable")
        }
    }

    fn retriever() -> (Retriever, Arc<MemoryAuditSink>) {
        let sink = Arc::new(MemoryAuditSink::new());
        let r = Retriever::new(Arc::new(KeywordProvider), Arc::new(InMemoryIndex::new()))
            .with_audit_sink(sink.clone());
        (r, sink)
    }

    #[tokio::test]
    async fn test_add_document_rejects_duplicate() {
        let (r, _) = retriever();
        let doc = Document::new("d1", "API", "", "bob", "eng", Permissions::public());
        r.add_document(doc.clone()).await.unwrap();
        let err = r.add_document(doc).await.unwrap_err();
        assert!(matches!(err, RetrievalError::DuplicateId { .. }));
        assert_eq!(r.index().len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_embedding_leaves_nothing_behind() {
        let r = Retriever::new(Arc::new(FailingProvider), Arc::new(InMemoryIndex::new()));
        let doc = Document::new("d1", "API", "", "bob", "eng", Permissions::public());
        let err = r.add_document(doc).await.unwrap_err();
        assert!(matches!(err, RetrievalError::Embedding(_)));
        assert!(r.store().is_empty());
        assert_eq!(r.index().len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_search_embedding_failure_surfaces() {
        let r = Retriever::new(Arc::new(FailingProvider), Arc::new(InMemoryIndex::new()));
        let alice = Principal::new("alice", ["eng"]);
        let err = r.search("API", &alice, 3).await.unwrap_err();
        assert!(matches!(err, RetrievalError::Embedding(_)));
    }

    #[tokio::test]
    async fn test_search_filters_and_audits_denied() {
        let (r, sink) = retriever();
        let secret = Document::new("secret", "API key", "", "bob", "eng", Permissions::private());
        let open = Document::new("open", "API guide", "", "bob", "eng", Permissions::public());
        r.add_document(secret).await.unwrap();
        r.add_document(open).await.unwrap();

        let carol = Principal::new("carol", ["mkt"]);
        let hits = r.search("api", &carol, 3).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].doc_id, "open");

        let records = sink.take();
        assert_eq!(records.len(), 2);
        assert_eq!(records.iter().filter(|rec| !rec.allowed).count(), 1);
        assert!(records.iter().all(|rec| rec.search_id == records[0].search_id));
    }

    #[tokio::test]
    async fn test_inconsistent_index_aborts_search() {
        let (r, _) = retriever();
        let orphan = Document::new("orphan", "API", "", "bob", "eng", Permissions::public());
        let vector = KeywordProvider.embed(&orphan.embedding_text()).await.unwrap();
        r.index().upsert(IndexedEntry::new(&orphan, vector)).await.unwrap();

        let alice = Principal::new("alice", ["eng"]);
        let err = r.search("api", &alice, 3).await.unwrap_err();
        assert!(
            matches!(err, RetrievalError::InconsistentIndex { ref doc_id } if doc_id == "orphan")
        );
    }

    #[tokio::test]
    async fn test_top_k_zero_returns_empty_without_audit() {
        let (r, sink) = retriever();
        r.add_document(Document::new("d1", "API", "", "bob", "eng", Permissions::public()))
            .await
            .unwrap();
        let alice = Principal::new("alice", ["eng"]);
        assert!(r.search("api", &alice, 0).await.unwrap().is_empty());
        assert!(sink.records().is_empty());
    }

    #[tokio::test]
    async fn test_overfetch_window_limits_candidates() {
        let (r, sink) = retriever();
        let r = r.with_options(RetrieverOptions {
            overfetch_factor: 2,
        });
        for i in 0..10 {
            let id = format!("d{i}");
            let doc = Document::new(id, "API", "", "bob", "eng", Permissions::public());
            r.add_document(doc).await.unwrap();
        }
        let alice = Principal::new("alice", ["eng"]);
        let hits = r.search("api", &alice, 3).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(sink.records().len(), 6);
    }

    #[test]
    fn test_candidate_count_clamps_factor() {
        let (r, _) = retriever();
        assert_eq!(r.candidate_count(3), 12);
        let r = r.with_options(RetrieverOptions {
            overfetch_factor: 0,
        });
        assert_eq!(r.candidate_count(3), 3);
        assert_eq!(r.candidate_count(usize::MAX), usize::MAX);
    }

    #[tokio::test]
    async fn test_add_documents_stops_at_first_error() {
        let (r, _) = retriever();
        let docs = vec![
            Document::new("a", "API", "", "bob", "eng", Permissions::public()),
            Document::new("a", "API again", "", "bob", "eng", Permissions::public()),
            Document::new("b", "design", "", "bob", "eng", Permissions::public()),
        ];
        assert!(r.add_documents(docs).await.is_err());
        assert!(r.store().contains("a"));
        assert!(!r.store().contains("b"));
    }

    #[tokio::test]
    async fn test_sync_reuses_unchanged_entries() {
        let index: Arc<dyn VectorIndex> = Arc::new(InMemoryIndex::new());
        let kept = Document::new("kept", "API", "", "bob", "eng", Permissions::public());
        let edited = Document::new("edited", "design", "", "bob", "eng", Permissions::private());
        Retriever::new(Arc::new(KeywordProvider), index.clone())
            .add_documents(vec![kept.clone(), edited.clone()])
            .await
            .unwrap();

        let counter = Arc::new(CountingProvider::default());
        let r = Retriever::new(counter.clone(), index.clone());
        let mut edited = edited;
        edited.permissions = Permissions::public();
        let added = Document::new("added", "stack", "", "bob", "eng", Permissions::public());

        let stats = r.sync_documents(vec![kept, edited, added]).await.unwrap();
        assert_eq!(stats, SyncStats { embedded: 2, unchanged: 1 });
        assert_eq!(counter.calls(), 2);
        assert_eq!(r.store().len(), 3);
        assert_eq!(index.len().await.unwrap(), 3);

        let again = Retriever::new(counter.clone(), index);
        let stats = again.sync_documents(r.store().documents()).await.unwrap();
        assert_eq!(stats, SyncStats { embedded: 0, unchanged: 3 });
        assert_eq!(counter.calls(), 2);
    }

    #[tokio::test]
    async fn test_sync_reembeds_on_dimension_change() {
        let index: Arc<dyn VectorIndex> = Arc::new(InMemoryIndex::new());
        let doc = Document::new("d1", "API", "", "bob", "eng", Permissions::public());
        index.upsert(IndexedEntry::new(&doc, vec![1.0, 0.0])).await.unwrap();

        let r = Retriever::new(Arc::new(KeywordProvider), index.clone());
        let stats = r.sync_documents(vec![doc]).await.unwrap();
        assert_eq!(stats.embedded, 1);
        assert_eq!(index.entries().await.unwrap()[0].vector.len(), KeywordProvider.dims());
    }
}
