//! Session / Plan / Step data model (spec.md §3).

use chrono::{DateTime, Utc};
use fulcrum_common::{PlanId, SessionId, StepId};
use fulcrum_permission::PolicyProfile;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Created,
    Planning,
    Running,
    AwaitingApproval,
    Paused,
    Completed,
    Failed,
    Aborted,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed | SessionStatus::Aborted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    Real,
    DryRun,
    Mock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limits {
    pub max_tokens: Option<u64>,
    pub max_cost_usd: Option<f64>,
    pub max_steps: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self { max_tokens: None, max_cost_usd: None, max_steps: 50 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub mode: SessionMode,
    pub task: String,
    pub active_plan_id: Option<PlanId>,
    pub limits: Limits,
    pub policy: PolicyProfile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(task: String, mode: SessionMode, limits: Limits, policy: PolicyProfile) -> Self {
        let now = Utc::now();
        Self {
            session_id: SessionId::new(),
            status: SessionStatus::Created,
            mode,
            task,
            active_plan_id: None,
            limits,
            policy,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    Abort,
    Replan,
    Continue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRef {
    pub name: String,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub step_id: StepId,
    pub tool_ref: ToolRef,
    pub input: Value,
    /// Maps an input key to a prior step's output, resolved before dispatch
    /// via a `{step_id}#{json_pointer}` reference (decided in DESIGN.md;
    /// spec.md leaves the binding syntax unspecified).
    pub input_from: Option<HashMap<String, String>>,
    pub success_criteria: Option<Value>,
    pub failure_policy: FailurePolicy,
    pub max_retries: u32,
    pub timeout_ms: Option<u64>,
    pub depends_on: Vec<StepId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub plan_id: PlanId,
    pub goal: String,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepError {
    pub code: String,
    pub message: String,
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: StepId,
    pub status: StepStatus,
    pub output: Option<Value>,
    pub error: Option<StepError>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub attempt: u32,
}

impl StepResult {
    pub fn pending(step_id: StepId) -> Self {
        Self {
            step_id,
            status: StepStatus::Pending,
            output: None,
            error: None,
            started_at: None,
            finished_at: None,
            attempt: 0,
        }
    }
}
