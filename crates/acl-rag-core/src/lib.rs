//! # acl-rag core
//!
//! Access-controlled semantic retrieval: nearest-neighbor search over
//! embedded documents joined with a post-hoc authorization filter, so a
//! similarity query never returns content the requesting principal may not
//! read. Every candidate the index returns produces one audit record,
//! allowed or denied.
//!
//! This crate contains no tokio, sqlx, network, or filesystem code. The
//! embedding provider and vector index are injected through the
//! [`embedding::EmbeddingProvider`] and [`index::VectorIndex`] traits;
//! concrete backends live in the `acl-rag` app crate.
//!
//! ```text
//! query ─▶ EmbeddingProvider ─▶ VectorIndex.query(top_k × 4)
//!                                      │
//!                                      ▼
//!            DocumentStore.get(id) ─▶ can_access ─▶ AuditSink
//!                                      │
//!                                      ▼
//!                           allowed hits, truncated to top_k
//! ```

pub mod audit;
pub mod embedding;
pub mod error;
pub mod index;
pub mod models;
pub mod policy;
pub mod retriever;
pub mod store;
