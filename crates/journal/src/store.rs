//! `FileJournal`: the default, file-backed [`Journal`] implementation
//! (spec.md §4.1). Every event is appended as one canonical-JSON line to an
//! append-only file, fsynced before the in-memory cursor advances, and
//! broadcast to live subscribers. The teacher's scheduler and error handler
//! hold their mutable state behind `parking_lot::Mutex`/`RwLock` rather than
//! tokio's async locks for anything that's only ever held briefly and
//! synchronously; the journal cursor follows the same pattern.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use fulcrum_common::{canonical_sha256, EventId, SessionId, ZERO_HASH};
use futures::stream;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::disk::{classify, unlimited_probe, DiskPressureThresholds, DiskSpaceProbe};
use crate::error::JournalError;
use crate::subscribe::{Subscription, CHANNEL_CAPACITY};
use crate::traits::Journal;
use crate::types::{DiskPressure, IntegrityReport, JournalEvent, JournalEventStream, ReadWindow};

struct Cursor {
    last_seq: u64,
    last_hash: String,
    last_pressure: DiskPressure,
}

pub struct FileJournal {
    path: PathBuf,
    file: Mutex<File>,
    cursor: Mutex<Cursor>,
    tx: broadcast::Sender<JournalEvent>,
    thresholds: DiskPressureThresholds,
    probe: DiskSpaceProbe,
    fsync: bool,
}

impl FileJournal {
    /// Open (creating if absent) the journal file at `path`, replaying any
    /// existing records to rebuild the append cursor.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, JournalError> {
        Self::open_with(path, unlimited_probe(), DiskPressureThresholds::default(), true)
    }

    pub fn open_with(
        path: impl AsRef<Path>,
        probe: DiskSpaceProbe,
        thresholds: DiskPressureThresholds,
        fsync: bool,
    ) -> Result<Self, JournalError> {
        let path: PathBuf = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        let (last_seq, last_hash) = Self::replay_cursor(&mut file)?;
        file.seek(SeekFrom::End(0))?;

        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Ok(Self {
            path,
            file: Mutex::new(file),
            cursor: Mutex::new(Cursor {
                last_seq,
                last_hash,
                last_pressure: DiskPressure::Ok,
            }),
            tx,
            thresholds,
            probe,
            fsync,
        })
    }

    fn replay_cursor(file: &mut File) -> Result<(u64, String), JournalError> {
        file.seek(SeekFrom::Start(0))?;
        let reader = BufReader::new(&mut *file);
        let mut last_seq = 0u64;
        let mut last_hash = ZERO_HASH.to_string();
        for (offset, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let event: JournalEvent = serde_json::from_str(&line)
                .map_err(|_| JournalError::Corrupt(offset as u64))?;
            last_seq = event.seq;
            last_hash = canonical_sha256(&event)?;
        }
        Ok((last_seq, last_hash))
    }

    fn append_raw(&self, session_id: SessionId, event_type: &str, payload: Value) -> Result<JournalEvent, JournalError> {
        let mut cursor = self.cursor.lock();
        let event = JournalEvent {
            event_id: EventId::new(),
            timestamp: Utc::now(),
            session_id,
            event_type: event_type.to_string(),
            payload,
            seq: cursor.last_seq + 1,
            hash_prev: cursor.last_hash.clone(),
        };

        let line = serde_json::to_string(&event)?;
        let new_hash = canonical_sha256(&event)?;

        {
            let mut file = self.file.lock();
            writeln!(file, "{line}")?;
            if self.fsync {
                file.sync_data()?;
            }
        }

        cursor.last_seq = event.seq;
        cursor.last_hash = new_hash;
        drop(cursor);

        let _ = self.tx.send(event.clone());
        Ok(event)
    }

    fn sample_pressure(&self) -> DiskPressure {
        classify(&self.thresholds, (self.probe)())
    }
}

/// Lazily decodes one session's events off an independent file handle,
/// skipping `skip` matches and stopping after `remaining` (if set) so a
/// caller asking for `limit = 1` never pulls more than one event into
/// memory.
struct SessionLines {
    reader: BufReader<File>,
    session_id: SessionId,
    skip: usize,
    remaining: Option<usize>,
}

impl Iterator for SessionLines {
    type Item = Result<JournalEvent, JournalError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == Some(0) {
            return None;
        }
        loop {
            let mut line = String::new();
            match self.reader.read_line(&mut line) {
                Ok(0) => return None,
                Ok(_) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let event: JournalEvent = match serde_json::from_str(&line) {
                        Ok(event) => event,
                        Err(err) => return Some(Err(JournalError::from(err))),
                    };
                    if event.session_id != self.session_id {
                        continue;
                    }
                    if self.skip > 0 {
                        self.skip -= 1;
                        continue;
                    }
                    if let Some(remaining) = self.remaining.as_mut() {
                        *remaining -= 1;
                    }
                    return Some(Ok(event));
                }
                Err(err) => return Some(Err(JournalError::from(err))),
            }
        }
    }
}

#[async_trait]
impl Journal for FileJournal {
    async fn emit(
        &self,
        session_id: SessionId,
        event_type: &str,
        payload: Value,
    ) -> Result<JournalEvent, JournalError> {
        let pressure = self.sample_pressure();
        if pressure == DiskPressure::Critical {
            tracing::error!(%session_id, "journal rejecting append: disk critical");
            return Err(JournalError::DiskCritical);
        }

        let previous = {
            let mut cursor = self.cursor.lock();
            std::mem::replace(&mut cursor.last_pressure, pressure)
        };
        if pressure != previous {
            let meta_type = match pressure {
                DiskPressure::Warning => "journal.disk_warning",
                DiskPressure::Ok => "journal.disk_recovered",
                DiskPressure::Critical => unreachable!("handled above"),
            };
            self.append_raw(session_id, meta_type, Value::Null)?;
        }

        self.append_raw(session_id, event_type, payload)
    }

    async fn read_session(&self, session_id: SessionId, window: Option<ReadWindow>) -> Result<JournalEventStream, JournalError> {
        {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(0))?;
            let reader = BufReader::new(&mut *file);
            let mut found = false;
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let event: JournalEvent = serde_json::from_str(&line)?;
                if event.session_id == session_id {
                    found = true;
                    break;
                }
            }
            if !found {
                return Err(JournalError::SessionNotFound(session_id));
            }
        }

        let offset = window.map(|w| w.offset).unwrap_or(0);
        let limit = window.and_then(|w| w.limit);
        let reader = BufReader::new(File::open(&self.path)?);
        let lines = SessionLines { reader, session_id, skip: offset, remaining: limit };
        Ok(Box::pin(stream::iter(lines)))
    }

    async fn verify_integrity(&self) -> Result<IntegrityReport, JournalError> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(0))?;
        let reader = BufReader::new(&mut *file);

        let mut expected_prev = ZERO_HASH.to_string();
        let mut events_checked = 0u64;
        let mut first_broken_seq = None;

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let event: JournalEvent = serde_json::from_str(&line)?;
            events_checked += 1;

            if event.hash_prev != expected_prev {
                first_broken_seq.get_or_insert(event.seq);
            }
            expected_prev = canonical_sha256(&event)?;
        }

        Ok(IntegrityReport {
            valid: first_broken_seq.is_none(),
            first_broken_seq,
            events_checked,
        })
    }

    fn subscribe(&self, session_id: Option<SessionId>) -> Subscription {
        Subscription::new(session_id, self.tx.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fulcrum_common::SessionId;
    use futures::TryStreamExt;
    use serde_json::json;

    fn temp_journal() -> (tempfile::TempDir, FileJournal) {
        let dir = tempfile::tempdir().unwrap();
        let journal = FileJournal::open(dir.path().join("journal.ndjson")).unwrap();
        (dir, journal)
    }

    #[tokio::test]
    async fn emits_and_reads_back_in_order() {
        let (_dir, journal) = temp_journal();
        let session = SessionId::new();
        journal.emit(session, "session.created", json!({"n": 1})).await.unwrap();
        journal.emit(session, "step.started", json!({"n": 2})).await.unwrap();

        let events: Vec<JournalEvent> = journal.read_session(session, None).await.unwrap().try_collect().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "session.created");
        assert_eq!(events[1].hash_prev, canonical_sha256(&events[0]).unwrap());
    }

    #[tokio::test]
    async fn read_session_window_limits_events_held_at_once() {
        let (_dir, journal) = temp_journal();
        let session = SessionId::new();
        for n in 0..5 {
            journal.emit(session, "step.started", json!({"n": n})).await.unwrap();
        }

        let mut stream = journal
            .read_session(session, Some(ReadWindow { offset: 1, limit: Some(2) }))
            .await
            .unwrap();
        let first = stream.try_next().await.unwrap().unwrap();
        assert_eq!(first.payload.get("n").and_then(Value::as_i64), Some(1));
        let second = stream.try_next().await.unwrap().unwrap();
        assert_eq!(second.payload.get("n").and_then(Value::as_i64), Some(2));
        assert!(stream.try_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn verify_integrity_detects_tamper() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.ndjson");
        {
            let journal = FileJournal::open(&path).unwrap();
            let session = SessionId::new();
            journal.emit(session, "a", json!({})).await.unwrap();
            journal.emit(session, "b", json!({})).await.unwrap();
        }

        // Tamper with the first line's payload without recomputing the chain.
        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines: Vec<String> = contents.lines().map(String::from).collect();
        let mut first: Value = serde_json::from_str(&lines[0]).unwrap();
        first["payload"] = json!({"tampered": true});
        lines[0] = serde_json::to_string(&first).unwrap();
        std::fs::write(&path, lines.join("\n") + "\n").unwrap();

        let journal = FileJournal::open(&path).unwrap();
        let report = journal.verify_integrity().await.unwrap();
        assert!(!report.valid);
        assert_eq!(report.first_broken_seq, Some(2));
    }

    #[tokio::test]
    async fn read_missing_session_errors() {
        let (_dir, journal) = temp_journal();
        let err = journal.read_session(SessionId::new(), None).await.unwrap_err();
        assert!(matches!(err, JournalError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn disk_critical_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let probe: DiskSpaceProbe = Arc::new(|| Some(1024));
        let journal = FileJournal::open_with(
            dir.path().join("journal.ndjson"),
            probe,
            DiskPressureThresholds::default(),
            true,
        )
        .unwrap();

        let err = journal.emit(SessionId::new(), "x", Value::Null).await.unwrap_err();
        assert!(matches!(err, JournalError::DiskCritical));
    }

    #[tokio::test]
    async fn subscribers_see_new_events() {
        let (_dir, journal) = temp_journal();
        let session = SessionId::new();
        let mut sub = journal.subscribe(Some(session));
        journal.emit(session, "step.started", json!({})).await.unwrap();
        let event = sub.next().await.unwrap();
        assert_eq!(event.event_type, "step.started");
    }
}
