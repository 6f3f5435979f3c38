#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("tool `{0}` is not registered")]
    ToolNotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("circuit breaker open for tool `{0}`")]
    CircuitBreakerOpen(String),
    #[error("tool `{0}` timed out after {1}ms")]
    Timeout(String, u64),
    #[error("tool handler error: {0}")]
    Handler(String),
    #[error(transparent)]
    Policy(#[from] fulcrum_permission::PolicyError),
    #[error(transparent)]
    Journal(#[from] fulcrum_journal::JournalError),
}
