//! Journal event types (spec.md §3, §4.1).

use chrono::{DateTime, Utc};
use fulcrum_common::{EventId, SessionId};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::JournalError;

/// A lazy, ordered sequence of a session's events, as returned by
/// [`crate::Journal::read_session`]. Consumers pull events one at a time
/// rather than forcing the backing store to materialize them all up front.
pub type JournalEventStream = BoxStream<'static, Result<JournalEvent, JournalError>>;

/// One entry in the hash-chained append-only log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEvent {
    pub event_id: EventId,
    pub timestamp: DateTime<Utc>,
    pub session_id: SessionId,
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: serde_json::Value,
    /// Strictly monotonic per-process counter.
    pub seq: u64,
    /// Hex SHA-256 of the canonical JSON of the previous event, or
    /// [`fulcrum_common::ZERO_HASH`] for the first event ever written.
    pub hash_prev: String,
}

/// What [`verify_integrity`](crate::FileJournal::verify_integrity) found.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IntegrityReport {
    pub valid: bool,
    pub first_broken_seq: Option<u64>,
    pub events_checked: u64,
}

/// Pagination for [`crate::Journal::read_session`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadWindow {
    pub offset: usize,
    pub limit: Option<usize>,
}

/// Disk-pressure signal emitted alongside ordinary events (spec.md §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskPressure {
    Ok,
    Warning,
    Critical,
}
