//! Built-in planner, tool and approval channel used by `fulcrum session run`
//! and `fulcrum up` when no host process is wired in. These stand in for
//! the external collaborators spec.md §6 names (the LLM-backed planner, the
//! tool handlers, the human approval UI) so the binary has something to
//! drive end-to-end without a real agent behind it.

use std::sync::Arc;

use async_trait::async_trait;
use fulcrum_common::StepId;
use fulcrum_kernel::{
    FailurePolicy, KernelError, Plan, Planner, PlanConstraints, PlannerOutput, Step, StateSnapshot, ToolRef,
};
use fulcrum_permission::{ApprovalChannel, ApprovalDecision, ApprovalPromptRequest, LegacyDecision, PermissionError};
use fulcrum_tools::{ToolError, ToolHandler, ToolMode, ToolSchema, ToolSupports};
use serde_json::{json, Value};

/// Always grants whatever scope was missing for the remainder of the
/// session, logging the prompt instead of blocking on a terminal. Good
/// enough for a local smoke run; a real deployment wires in
/// `fulcrum-approval-relay`'s CLI or webhook channel instead.
pub struct AutoApproveChannel;

#[async_trait]
impl ApprovalChannel for AutoApproveChannel {
    async fn prompt(&self, request: ApprovalPromptRequest) -> Result<ApprovalDecision, PermissionError> {
        tracing::info!(
            session_id = %request.session_id,
            tool_name = %request.tool_name,
            scopes = ?request.missing_scopes,
            "auto-approving prompt (no approval channel configured)"
        );
        Ok(ApprovalDecision::Legacy(LegacyDecision::AllowSession))
    }
}

/// Echoes its `text` input back verbatim. Supports every mode; exists so a
/// fresh checkout can run the single-step happy path from spec.md §8
/// without any handler of its own.
pub struct EchoTool;

#[async_trait]
impl ToolHandler for EchoTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "echo".to_string(),
            version: "1.0.0".to_string(),
            input_schema: json!({
                "type": "object",
                "required": ["text"],
                "properties": { "text": { "type": "string" } }
            }),
            supports: ToolSupports { mock: true, dry_run: true },
            mock_responses: Some(json!({ "text": "<mock>" })),
        }
    }

    async fn handle(&self, input: Value, mode: ToolMode, _policy: &fulcrum_permission::PolicyProfile) -> Result<Value, ToolError> {
        let text = input.get("text").and_then(Value::as_str).ok_or_else(|| {
            ToolError::InvalidInput("echo requires a string `text` field".to_string())
        })?;
        match mode {
            ToolMode::Mock => Ok(json!({ "text": "<mock>" })),
            ToolMode::DryRun | ToolMode::Real => Ok(json!({ "text": text })),
        }
    }
}

/// Generates a single `echo` step from the raw task text. Not a real
/// planner — no reasoning happens here — but it satisfies every critic in
/// `fulcrum_kernel::default_critics` and is enough to drive a session
/// through `planning -> running -> completed`.
pub struct EchoPlanner;

#[async_trait]
impl Planner for EchoPlanner {
    async fn generate_plan(
        &self,
        task: &str,
        _tool_schemas: &[fulcrum_tools::ToolSchema],
        _state_snapshot: &StateSnapshot,
        _constraints: &PlanConstraints,
    ) -> Result<PlannerOutput, KernelError> {
        let plan = Plan {
            plan_id: fulcrum_common::PlanId::new(),
            goal: task.to_string(),
            steps: vec![Step {
                step_id: StepId::new(),
                tool_ref: ToolRef { name: "echo".to_string(), version: None },
                input: json!({ "text": task }),
                input_from: None,
                success_criteria: None,
                failure_policy: FailurePolicy::Abort,
                max_retries: 0,
                timeout_ms: Some(30_000),
                depends_on: vec![],
            }],
        };
        Ok(PlannerOutput { plan, usage: None })
    }
}

pub fn builtin_tool_handlers() -> Vec<Arc<dyn ToolHandler>> {
    vec![Arc::new(EchoTool)]
}
