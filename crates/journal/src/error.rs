use fulcrum_common::SessionId;

#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("journal I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode journal event: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to canonicalize journal event: {0}")]
    Canonical(#[from] fulcrum_common::CanonicalError),
    #[error("no events found for session {0}")]
    SessionNotFound(SessionId),
    #[error("journal rejecting writes: disk space below critical threshold")]
    DiskCritical,
    #[error("corrupt journal record at byte offset {0}")]
    Corrupt(u64),
}
