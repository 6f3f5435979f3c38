//! SSE-style fan-out for freshly appended events, built on
//! `tokio::sync::broadcast` the way the teacher's scheduler and error
//! handler use `tokio::sync::Notify` for their own background loops.

use fulcrum_common::SessionId;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use crate::types::JournalEvent;

/// Capacity of the broadcast channel backing every [`FileJournal`](crate::FileJournal).
/// Slow subscribers that fall this far behind receive `Lagged` and resume
/// from the next event rather than blocking writers.
pub const CHANNEL_CAPACITY: usize = 1024;

/// A live view over events appended after the subscription was created.
/// Does not replay history; callers that need the backlog should call
/// [`Journal::read_session`](crate::Journal::read_session) first.
pub struct Subscription {
    session_id: Option<SessionId>,
    rx: broadcast::Receiver<JournalEvent>,
}

impl Subscription {
    pub(crate) fn new(session_id: Option<SessionId>, rx: broadcast::Receiver<JournalEvent>) -> Self {
        Self { session_id, rx }
    }

    /// Next matching event, or `None` once the sender side is gone.
    pub async fn next(&mut self) -> Option<JournalEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => {
                    if self.matches(&event) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "journal subscriber lagged, skipping ahead");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Adapt this subscription into a [`Stream`] for use with SSE/axum
    /// response bodies.
    pub fn into_stream(self) -> impl Stream<Item = JournalEvent> {
        let session_id = self.session_id;
        BroadcastStream::new(self.rx).filter_map(move |item| match item {
            Ok(event) if session_id.map_or(true, |sid| sid == event.session_id) => Some(event),
            _ => None,
        })
    }

    fn matches(&self, event: &JournalEvent) -> bool {
        self.session_id.map_or(true, |sid| sid == event.session_id)
    }
}
