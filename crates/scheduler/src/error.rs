use fulcrum_common::ScheduleId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("schedule {0} not found")]
    NotFound(ScheduleId),
    #[error("invalid cron expression: {0}")]
    InvalidCron(String),
    #[error("invalid trigger: {0}")]
    InvalidTrigger(String),
    #[error("job failed: {0}")]
    JobFailed(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
