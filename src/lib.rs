//! # ACL RAG
//!
//! Semantic retrieval that enforces a per-document owner/group/other read
//! permission on every candidate before it reaches the caller.
//!
//! The policy and retrieval engine live in `acl_rag_core`; this crate adds
//! configuration, concrete embedding providers, a SQLite-backed vector
//! index, dataset loading, and the `aclrag` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌──────────────┐
//! │ Dataset  │──▶│  Retriever  │──▶│ Vector index │
//! │ TOML     │   │ embed+store │   │ memory/SQLite│
//! └──────────┘   └──────┬──────┘   └──────────────┘
//!                       │ can_access per candidate
//!                       ▼
//!                ┌─────────────┐
//!                │ hits + audit│
//!                └─────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`dataset`] | Document/principal dataset files and the sample set |
//! | [`embedding`] | Hash, OpenAI, and disabled embedding providers |
//! | [`sqlite_index`] | Persistent vector index |
//! | [`pipeline`] | Builds a loaded retriever from config |
//! | [`search`] | `aclrag search` |
//! | [`demo`] | `aclrag demo` and `aclrag matrix` |
//! | [`inspect`] | `aclrag index` and `aclrag show` |
//! | [`logging`] | Tracing subscriber setup |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod dataset;
pub mod db;
pub mod demo;
pub mod embedding;
pub mod inspect;
pub mod logging;
pub mod migrate;
pub mod pipeline;
pub mod search;
pub mod sqlite_index;
