use fulcrum_common::SessionId;

#[derive(Debug, thiserror::Error)]
pub enum PermissionError {
    #[error("invalid scope `{0}`: domain must not be a wildcard")]
    WildcardDomain(String),
    #[error("invalid scope `{0}`: expected domain:action[:target]")]
    MalformedScope(String),
    #[error("no active prompt lock for session {0}")]
    NoPromptLock(SessionId),
    #[error("approval callback failed: {0}")]
    PromptFailed(String),
    #[error("delegation capability token has an invalid signature")]
    InvalidDctSignature,
    #[error("delegation capability token expired at {0}")]
    DctExpired(chrono::DateTime<chrono::Utc>),
    #[error("requested scope `{0}` widens the parent delegation capability token's scope set")]
    AttenuationViolation(String),
    #[error(transparent)]
    Journal(#[from] fulcrum_journal::JournalError),
}

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("path `{0}` is outside allowed paths")]
    PathNotAllowed(String),
    #[error("path `{0}` is not writable under this policy profile")]
    WriteNotAllowed(String),
    #[error("path `{0}` matches a sensitive-file pattern and is always denied")]
    SensitiveFile(String),
    #[error("command `{0}` is not in the allowed command list")]
    CommandNotAllowed(String),
    #[error("command `{0}` matches a known-dangerous pattern")]
    DangerousCommand(String),
    #[error("url `{0}` could not be parsed")]
    InvalidUrl(String),
    #[error("url `{0}` was rejected by the SSRF guard")]
    SsrfBlocked(String),
    #[error("url `{0}` is not in the allowed endpoint list")]
    EndpointNotAllowed(String),
    #[error("io error resolving path: {0}")]
    Io(#[from] std::io::Error),
}
