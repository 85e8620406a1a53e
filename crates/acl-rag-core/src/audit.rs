//! Access-decision audit trail.
//!
//! The retriever emits one [`AuditRecord`] per candidate the vector index
//! returns, allowed or denied, in index order and before truncation to
//! `top_k`. Records go to an [`AuditSink`]; the default sink writes a
//! `tracing` event on the [`AUDIT_TARGET`] target.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::info;

use crate::models::{Document, Principal};

/// `tracing` target for audit events.
pub const AUDIT_TARGET: &str = "acl_rag::audit";

/// One logged access decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    /// Correlates all records produced by one search call.
    pub search_id: String,
    pub principal: String,
    pub query: String,
    pub allowed: bool,
    pub doc_id: String,
    pub title: String,
    pub owner: String,
    pub group: String,
    pub permissions: String,
    pub similarity: f32,
}

impl AuditRecord {
    pub fn new(
        search_id: &str,
        principal: &Principal,
        query: &str,
        document: &Document,
        allowed: bool,
        similarity: f32,
    ) -> Self {
        Self {
            search_id: search_id.to_string(),
            principal: principal.id.clone(),
            query: query.to_string(),
            allowed,
            doc_id: document.id.clone(),
            title: document.title.clone(),
            owner: document.owner.clone(),
            group: document.group.clone(),
            permissions: document.permissions.summary(),
            similarity,
        }
    }

    pub fn decision(&self) -> &'static str {
        if self.allowed {
            "ALLOW"
        } else {
            "DENY"
        }
    }
}

/// `decision, document_id, title, owner, group, permission_triple, similarity_score`
impl fmt::Display for AuditRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, {}, {}, {}, {}, {:.4}",
            self.decision(),
            self.doc_id,
            self.title,
            self.owner,
            self.group,
            self.permissions,
            self.similarity
        )
    }
}

/// Destination for audit records. Called synchronously from `search`.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord);
}

/// Writes each record as an INFO event on [`AUDIT_TARGET`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: &AuditRecord) {
        info!(
            target: AUDIT_TARGET,
            search_id = %record.search_id,
            principal = %record.principal,
            allowed = record.allowed,
            doc_id = %record.doc_id,
            title = %record.title,
            owner = %record.owner,
            group = %record.group,
            perm = %record.permissions,
            similarity = record.similarity,
            "{}",
            record
        );
    }
}

/// Collects records in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drain and return everything recorded so far.
    pub fn take(&self) -> Vec<AuditRecord> {
        std::mem::take(&mut *self.records.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: &AuditRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
    }
}

/// Forwards every record to each inner sink in turn.
pub struct FanoutAuditSink {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl FanoutAuditSink {
    pub fn new(sinks: Vec<Arc<dyn AuditSink>>) -> Self {
        Self { sinks }
    }
}

impl AuditSink for FanoutAuditSink {
    fn record(&self, record: &AuditRecord) {
        for sink in &self.sinks {
            sink.record(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Permissions;

    fn record(allowed: bool) -> AuditRecord {
        let doc = Document::new(
            "doc2",
            "API仕様書",
            "body",
            "bob",
            "eng",
            Permissions::new(true, true, false),
        );
        let alice = Principal::new("alice", ["eng"]);
        AuditRecord::new("s1", &alice, "API", &doc, allowed, 0.81234)
    }

    #[test]
    fn test_display_line() {
        assert_eq!(
            record(true).to_string(),
            "ALLOW, doc2, API仕様書, bob, eng, rr-, 0.8123"
        );
        assert!(record(false).to_string().starts_with("DENY, doc2"));
    }

    #[test]
    fn test_memory_sink_take_drains() {
        let sink = MemoryAuditSink::new();
        sink.record(&record(true));
        sink.record(&record(false));
        assert_eq!(sink.records().len(), 2);
        let taken = sink.take();
        assert_eq!(taken.len(), 2);
        assert!(!taken[1].allowed);
        assert!(sink.records().is_empty());
    }

    #[test]
    fn test_fanout_reaches_every_sink() {
        let a = Arc::new(MemoryAuditSink::new());
        let b = Arc::new(MemoryAuditSink::new());
        let sinks: Vec<Arc<dyn AuditSink>> = vec![a.clone(), b.clone(), Arc::new(TracingAuditSink)];
        let fanout = FanoutAuditSink::new(sinks);
        fanout.record(&record(true));
        assert_eq!(a.records().len(), 1);
        assert_eq!(b.records().len(), 1);
    }
}
