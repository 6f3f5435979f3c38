//! Session Kernel (spec.md §4.2), Critics (§4.3), and Futility Monitor
//! (§4.7). The kernel drives one session at a time through
//! `created -> planning -> running -> {completed, failed, aborted}`,
//! delegating tool dispatch to `fulcrum_tools`, scope checks to
//! `fulcrum_permission`, and recording every transition through
//! `fulcrum_journal`.

pub mod critics;
pub mod error;
pub mod futility;
pub mod kernel;
pub mod planner;
pub mod state_machine;
pub mod types;

pub use critics::{default_critics, run_critics, Critic, CriticContext, CriticReport, CriticResult, Severity};
pub use error::KernelError;
pub use futility::{CumulativeUsage, FutilityConfig, FutilityDecision, FutilityMonitor, IterationRecord, IterationUsage, StepResultSummary};
pub use kernel::{Kernel, KernelConfig};
pub use planner::{LessonExcerpt, PlanConstraints, Planner, PlannerOutput, StateSnapshot};
pub use state_machine::SessionStateMachine;
pub use types::{
    FailurePolicy, Limits, Plan, Session, SessionMode, SessionStatus, Step, StepError, StepResult, StepStatus, ToolRef,
};
