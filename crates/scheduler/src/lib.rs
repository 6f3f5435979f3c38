//! Scheduler (spec.md §4.8): fires `at`/`every`/`cron`-triggered jobs
//! against a durable JSON-lines store, with configurable missed-fire
//! handling and consecutive-failure tracking.

pub mod engine;
pub mod error;
pub mod factory;
pub mod store;
pub mod trigger;
pub mod types;

pub use engine::{SchedulerConfig, SchedulerEngine};
pub use error::SchedulerError;
pub use factory::SessionFactory;
pub use store::ScheduleStore;
pub use types::{JobKind, MissedFirePolicy, Schedule, ScheduleStatus, ScheduleTrigger, MAX_CATCHUP_FIRES};
