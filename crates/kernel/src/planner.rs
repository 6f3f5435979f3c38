//! The planner interface (spec.md §6): `generatePlan(task, tool_schemas,
//! state_snapshot, constraints) -> {plan, usage?}`. The planner itself is an
//! external collaborator (spec.md §1) — this crate only defines the trait
//! host code implements and the read-only snapshot the kernel hands it.

use async_trait::async_trait;
use fulcrum_tools::{ToolSchema, Usage};
use serde::{Deserialize, Serialize};

use crate::error::KernelError;
use crate::types::{Plan, StepResult};

/// A short excerpt of a lesson learned from a prior failed attempt,
/// surfaced to the planner when the kernel replans after a `replan`
/// failure policy (spec.md §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonExcerpt {
    pub step_id: fulcrum_common::StepId,
    pub summary: String,
}

/// Read-only context handed to the planner on every invocation, including
/// replans. Prior step results let the planner avoid repeating failed
/// approaches; lesson excerpts are a condensed version of the same for
/// when the full result history would be too large to resend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub task: String,
    pub prior_results: Vec<StepResult>,
    pub lessons: Vec<LessonExcerpt>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanConstraints {
    pub max_steps: Option<usize>,
    pub max_cost_usd: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct PlannerOutput {
    pub plan: Plan,
    pub usage: Option<Usage>,
}

#[async_trait]
pub trait Planner: Send + Sync {
    async fn generate_plan(
        &self,
        task: &str,
        tool_schemas: &[ToolSchema],
        state_snapshot: &StateSnapshot,
        constraints: &PlanConstraints,
    ) -> Result<PlannerOutput, KernelError>;
}
