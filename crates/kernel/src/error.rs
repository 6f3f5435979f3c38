use fulcrum_common::SessionId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KernelError {
    #[error("session {0} not found")]
    SessionNotFound(SessionId),
    #[error("session {0} is not in a runnable state: {1}")]
    InvalidTransition(SessionId, String),
    #[error("planner failed: {0}")]
    PlannerFailed(String),
    #[error("plan rejected by critics: {0}")]
    PlanRejected(String),
    #[error("tool error: {0}")]
    Tool(#[from] fulcrum_tools::ToolError),
    #[error("permission error: {0}")]
    Permission(#[from] fulcrum_permission::PermissionError),
    #[error("journal error: {0}")]
    Journal(#[from] fulcrum_journal::JournalError),
    #[error("budget exceeded: used {used}, limit {limit}")]
    BudgetExceeded { used: u64, limit: u64 },
    #[error("halted by futility monitor: {0}")]
    Futility(String),
}
