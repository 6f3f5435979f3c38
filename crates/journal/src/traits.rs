//! The `Journal` contract (spec.md §4.1), mirroring the shape of the
//! teacher's `AuditTrail` trait in `runtime/src/integrations/audit_trail.rs`
//! (`record_event`, `query_records`, `verify_integrity`) generalized to the
//! hash-chained, session-scoped semantics this spec needs.

use async_trait::async_trait;
use fulcrum_common::SessionId;
use serde_json::Value;

use crate::error::JournalError;
use crate::subscribe::Subscription;
use crate::types::{IntegrityReport, JournalEvent, JournalEventStream, ReadWindow};

#[async_trait]
pub trait Journal: Send + Sync {
    /// Append one event for `session_id`. On failure the in-memory
    /// `prev_seq`/`prev_hash` cursor is not advanced (spec.md §4.1: "callers
    /// treat emit failure as fatal for the triggering operation").
    async fn emit(
        &self,
        session_id: SessionId,
        event_type: &str,
        payload: Value,
    ) -> Result<JournalEvent, JournalError>;

    /// All events for `session_id`, oldest first, honoring `window` if
    /// given, as a lazy stream rather than a fully materialized `Vec`.
    /// `window`'s offset/limit are applied as the stream is consumed, so a
    /// small `limit` never forces a full-file scan to hold in memory.
    async fn read_session(
        &self,
        session_id: SessionId,
        window: Option<ReadWindow>,
    ) -> Result<JournalEventStream, JournalError>;

    /// Re-read the backing store and recompute the hash chain.
    async fn verify_integrity(&self) -> Result<IntegrityReport, JournalError>;

    /// Subscribe to events appended from this point forward, optionally
    /// filtered to one session.
    fn subscribe(&self, session_id: Option<SessionId>) -> Subscription;
}
