use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Journal(#[from] fulcrum_journal::JournalError),
    #[error(transparent)]
    Kernel(#[from] fulcrum_kernel::KernelError),
    #[error(transparent)]
    Scheduler(#[from] fulcrum_scheduler::SchedulerError),
    #[error(transparent)]
    Swarm(#[from] fulcrum_swarm::SwarmError),
}
