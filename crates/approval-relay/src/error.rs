#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("webhook delivery failed: {0}")]
    Delivery(#[from] reqwest::Error),
    #[error("inbound decision signature invalid")]
    SignatureInvalid,
    #[error("no pending prompt for request {0}")]
    NoPendingPrompt(String),
    #[error("approval prompt timed out after {0}ms")]
    Timeout(u64),
    #[error("malformed decision payload: {0}")]
    MalformedPayload(String),
}

impl From<RelayError> for fulcrum_permission::PermissionError {
    fn from(err: RelayError) -> Self {
        fulcrum_permission::PermissionError::PromptFailed(err.to_string())
    }
}
