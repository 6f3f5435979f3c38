//! The Session Kernel (spec.md §4.2): drives a session from a task through
//! planning and execution to a terminal state. Grounded on `runtime/src/
//! lifecycle`'s state-machine shape for the transition table and on
//! `crates/repl-core/src/session.rs` for the snapshot/restore shape of the
//! per-session state held behind a lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use fulcrum_common::{RequestId, SessionId, StepId};
use fulcrum_journal::Journal;
use fulcrum_permission::{
    DefaultPermissionEngine, PermissionCheckRequest, PolicyProfile, RequiredPermission,
};
use fulcrum_tools::{ToolExecutionRequest, ToolMode, ToolRuntime, UsageSummary};
use serde_json::json;
use tokio::sync::Mutex as AsyncMutex;

use crate::critics::{run_critics, Critic, CriticContext};
use crate::error::KernelError;
use crate::futility::{CumulativeUsage, FutilityConfig, FutilityDecision, FutilityMonitor, IterationRecord, IterationUsage, StepResultSummary};
use crate::planner::{LessonExcerpt, PlanConstraints, Planner, StateSnapshot};
use crate::state_machine::SessionStateMachine;
use crate::types::{FailurePolicy, Limits, Plan, Session, SessionMode, SessionStatus, Step, StepError, StepResult, StepStatus};

/// How many times the kernel re-invokes the planner after a plan is
/// rejected by critics, before giving up and failing the session.
const MAX_PLANNER_RETRIES: u32 = 3;

/// The scope a step's tool call requires, derived from the tool name.
/// spec.md leaves the binding between a step and a permission scope
/// unspecified beyond "the permission engine gates tool calls" (§2); this
/// convention is recorded in DESIGN.md.
fn tool_scope(tool_name: &str) -> String {
    format!("tool:execute:{tool_name}")
}

struct RunningSession {
    session: Session,
    plan: Option<Plan>,
    results: HashMap<StepId, StepResult>,
    iteration: u64,
}

pub struct KernelConfig {
    pub futility: FutilityConfig,
    pub backoff_base_ms: u64,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            futility: FutilityConfig::default(),
            backoff_base_ms: 200,
        }
    }
}

pub struct Kernel {
    journal: Arc<dyn Journal>,
    permission: Arc<DefaultPermissionEngine>,
    tools: Arc<ToolRuntime>,
    planner: Arc<dyn Planner>,
    critics: Vec<Box<dyn Critic>>,
    state_machine: SessionStateMachine,
    config: KernelConfig,
    sessions: DashMap<SessionId, Arc<AsyncMutex<RunningSession>>>,
    futility_monitors: DashMap<SessionId, AsyncMutex<FutilityMonitor>>,
}

impl Kernel {
    pub fn new(
        journal: Arc<dyn Journal>,
        permission: Arc<DefaultPermissionEngine>,
        tools: Arc<ToolRuntime>,
        planner: Arc<dyn Planner>,
        critics: Vec<Box<dyn Critic>>,
        config: KernelConfig,
    ) -> Self {
        Self {
            journal,
            permission,
            tools,
            planner,
            critics,
            state_machine: SessionStateMachine::new(),
            config,
            sessions: DashMap::new(),
            futility_monitors: DashMap::new(),
        }
    }

    pub async fn create_session(&self, task: String, mode: SessionMode, limits: Limits, policy: PolicyProfile) -> Result<SessionId, KernelError> {
        let session = Session::new(task, mode, limits, policy);
        let session_id = session.session_id;
        self.journal
            .emit(session_id, "session.created", json!({ "task": session.task, "mode": session.mode }))
            .await?;
        self.sessions.insert(
            session_id,
            Arc::new(AsyncMutex::new(RunningSession { session, plan: None, results: HashMap::new(), iteration: 0 })),
        );
        self.futility_monitors
            .insert(session_id, AsyncMutex::new(FutilityMonitor::new(self.config.futility.clone())));
        Ok(session_id)
    }

    pub async fn session_status(&self, session_id: SessionId) -> Result<SessionStatus, KernelError> {
        let handle = self.handle(session_id)?;
        let running = handle.lock().await;
        Ok(running.session.status)
    }

    fn handle(&self, session_id: SessionId) -> Result<Arc<AsyncMutex<RunningSession>>, KernelError> {
        self.sessions
            .get(&session_id)
            .map(|entry| entry.value().clone())
            .ok_or(KernelError::SessionNotFound(session_id))
    }

    /// `abort()`: any non-terminal status transitions to `aborted`
    /// immediately (spec.md §4.2, §5 cancellation).
    pub async fn abort(&self, session_id: SessionId) -> Result<(), KernelError> {
        let handle = self.handle(session_id)?;
        let mut running = handle.lock().await;
        if running.session.status.is_terminal() {
            return Ok(());
        }
        running.session.status = SessionStatus::Aborted;
        self.journal
            .emit(session_id, "session.aborted", json!({ "reason": "external_abort" }))
            .await?;
        Ok(())
    }

    /// Drives the session from `created` to a terminal status, running the
    /// full plan/execute/replan loop (spec.md §4.2).
    pub async fn run(&self, session_id: SessionId) -> Result<SessionStatus, KernelError> {
        self.journal.emit(session_id, "session.started", json!({})).await?;

        loop {
            let aborted = {
                let handle = self.handle(session_id)?;
                let running = handle.lock().await;
                running.session.status == SessionStatus::Aborted
            };
            if aborted {
                return Ok(SessionStatus::Aborted);
            }

            self.transition(session_id, SessionStatus::Planning).await?;

            let plan = match self.plan_with_retries(session_id).await? {
                Some(plan) => plan,
                None => return Ok(SessionStatus::Failed),
            };

            {
                let handle = self.handle(session_id)?;
                let mut running = handle.lock().await;
                running.plan = Some(plan.clone());
                for step in &plan.steps {
                    running.results.insert(step.step_id, StepResult::pending(step.step_id));
                }
            }
            self.journal
                .emit(session_id, "plan.accepted", json!({ "plan_id": plan.plan_id, "steps": plan.steps.len() }))
                .await?;
            self.transition(session_id, SessionStatus::Running).await?;

            match self.execute_plan(session_id, &plan).await? {
                PlanOutcome::Completed => {
                    self.transition(session_id, SessionStatus::Completed).await?;
                    self.journal.emit(session_id, "session.completed", json!({ "reason": "plan_completed" })).await?;
                    return Ok(SessionStatus::Completed);
                }
                PlanOutcome::Failed(reason) => {
                    self.transition(session_id, SessionStatus::Failed).await?;
                    self.journal.emit(session_id, "session.failed", json!({ "reason": reason })).await?;
                    return Ok(SessionStatus::Failed);
                }
                PlanOutcome::Replan => {
                    // loop back to planning with accumulated state as context
                    continue;
                }
                PlanOutcome::Aborted => {
                    self.journal.emit(session_id, "session.aborted", json!({ "reason": "external_abort" })).await?;
                    return Ok(SessionStatus::Aborted);
                }
            }
        }
    }

    async fn transition(&self, session_id: SessionId, to: SessionStatus) -> Result<(), KernelError> {
        let handle = self.handle(session_id)?;
        let mut running = handle.lock().await;
        let from = running.session.status;
        if from == to {
            return Ok(());
        }
        if !self.state_machine.is_valid_transition(from, to) {
            return Err(KernelError::InvalidTransition(session_id, format!("{from:?} -> {to:?}")));
        }
        running.session.status = to;
        running.session.updated_at = chrono::Utc::now();
        if to == SessionStatus::Running || to == SessionStatus::AwaitingApproval || to == SessionStatus::Paused {
            let plan_id = running.plan.as_ref().map(|p| p.plan_id);
            running.session.active_plan_id = plan_id;
        } else if to.is_terminal() {
            running.session.active_plan_id = None;
        }
        Ok(())
    }

    /// Invokes the planner, running critics on each candidate, retrying up
    /// to `MAX_PLANNER_RETRIES` times. Returns `None` (session already
    /// failed) if the planner errors or every candidate is rejected.
    async fn plan_with_retries(&self, session_id: SessionId) -> Result<Option<Plan>, KernelError> {
        let (task, limits, prior_results) = {
            let handle = self.handle(session_id)?;
            let running = handle.lock().await;
            let prior_results: Vec<StepResult> = running.results.values().cloned().collect();
            (running.session.task.clone(), running.session.limits.clone(), prior_results)
        };

        let tool_schemas = self.tools.registry_schemas();
        let snapshot = StateSnapshot {
            task: task.clone(),
            prior_results,
            lessons: lessons_from_failures(&self.handle(session_id)?.lock().await.results),
        };
        let constraints = PlanConstraints {
            max_steps: Some(limits.max_steps),
            max_cost_usd: limits.max_cost_usd,
        };

        for attempt in 0..MAX_PLANNER_RETRIES {
            self.journal.emit(session_id, "planner.requested", json!({ "attempt": attempt })).await?;

            let output = match self.planner.generate_plan(&task, &tool_schemas, &snapshot, &constraints).await {
                Ok(output) => output,
                Err(err) => {
                    self.journal.emit(session_id, "planner.failed", json!({ "error": err.to_string() })).await?;
                    self.transition(session_id, SessionStatus::Failed).await?;
                    self.journal.emit(session_id, "session.failed", json!({ "reason": "planner_error" })).await?;
                    return Ok(None);
                }
            };
            self.journal
                .emit(session_id, "planner.plan_received", json!({ "plan_id": output.plan.plan_id, "steps": output.plan.steps.len() }))
                .await?;

            let ctx = CriticContext { limits: &limits, tool_schemas: &tool_schemas };
            let report = run_critics(&self.critics, &output.plan, &ctx);
            if report.passed {
                return Ok(Some(output.plan));
            }
            self.journal
                .emit(session_id, "plan.rejected", json!({ "report": &report }))
                .await?;
        }

        self.transition(session_id, SessionStatus::Failed).await?;
        self.journal.emit(session_id, "session.failed", json!({ "reason": "critics_rejected_every_candidate" })).await?;
        Ok(None)
    }

    async fn execute_plan(&self, session_id: SessionId, plan: &Plan) -> Result<PlanOutcome, KernelError> {
        for step in &plan.steps {
            let aborted = {
                let handle = self.handle(session_id)?;
                running_is_aborted(&handle).await
            };
            if aborted {
                return Ok(PlanOutcome::Aborted);
            }

            match self.execute_step(session_id, plan, step).await? {
                StepOutcome::Succeeded | StepOutcome::ContinuedAfterFailure => continue,
                StepOutcome::AbortPlan(reason) => return Ok(PlanOutcome::Failed(reason)),
                StepOutcome::Replan => return Ok(PlanOutcome::Replan),
                StepOutcome::Futility(reason) => return Ok(PlanOutcome::Failed(format!("futility: {reason}"))),
            }
        }
        Ok(PlanOutcome::Completed)
    }

    async fn execute_step(&self, session_id: SessionId, plan: &Plan, step: &Step) -> Result<StepOutcome, KernelError> {
        // 1. budget check
        if let Some(outcome) = self.check_budget(session_id, step).await? {
            return Ok(outcome);
        }

        // 2. resolve input_from bindings
        let resolved_input = self.resolve_inputs(session_id, step).await?;

        let (policy, mode) = {
            let handle = self.handle(session_id)?;
            let running = handle.lock().await;
            (running.session.policy.clone(), running.session.mode)
        };

        self.journal.emit(session_id, "step.started", json!({ "step_id": step.step_id, "tool": step.tool_ref.name })).await?;

        // permission gate
        let scope = tool_scope(&step.tool_ref.name);
        let check = self
            .gate_permission(session_id, &step.tool_ref.name, step.step_id, scope)
            .await?;
        if !check.allowed {
            return self
                .apply_failure(
                    session_id,
                    plan,
                    step,
                    StepError { code: "PERMISSION_DENIED".to_string(), message: "permission denied".to_string(), data: None },
                    0,
                )
                .await;
        }

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let request = ToolExecutionRequest {
                request_id: RequestId::new(),
                tool_name: step.tool_ref.name.clone(),
                tool_version: step.tool_ref.version.clone(),
                input: resolved_input.clone(),
                mode: tool_mode(mode),
                session_id,
                step_id: Some(step.step_id.to_string()),
                timeout_ms: step.timeout_ms,
            };

            match self.tools.dispatch(request, &policy).await {
                Ok(result) => {
                    self.record_step_result(session_id, step.step_id, StepStatus::Succeeded, Some(result.output.clone()), None, attempt)
                        .await?;
                    self.journal
                        .emit(session_id, "step.succeeded", json!({ "step_id": step.step_id, "attempt": attempt }))
                        .await?;
                    let decision = self.feed_futility(session_id, plan, step.step_id, true, None).await?;
                    if let FutilityDecision::Halt { reason } = decision {
                        return Ok(StepOutcome::Futility(reason));
                    }
                    return Ok(StepOutcome::Succeeded);
                }
                Err(err) => {
                    if attempt <= step.max_retries {
                        let backoff = self.config.backoff_base_ms * 2u64.pow(attempt.saturating_sub(1));
                        tokio::time::sleep(Duration::from_millis(backoff)).await;
                        continue;
                    }
                    let step_error = StepError { code: "EXECUTION_ERROR".to_string(), message: err.to_string(), data: None };
                    return self.apply_failure(session_id, plan, step, step_error, attempt).await;
                }
            }
        }
    }

    async fn gate_permission(
        &self,
        session_id: SessionId,
        tool_name: &str,
        step_id: StepId,
        scope: String,
    ) -> Result<fulcrum_permission::PermissionCheckResult, KernelError> {
        let needs_prompt = !self.permission.is_granted(&scope, session_id).await?;
        if needs_prompt {
            self.transition(session_id, SessionStatus::AwaitingApproval).await?;
        }
        let result = self
            .permission
            .check(PermissionCheckRequest {
                session_id,
                tool_name: tool_name.to_string(),
                step_id: Some(step_id.to_string()),
                permissions: vec![RequiredPermission { scope }],
            })
            .await?;
        if needs_prompt {
            self.transition(session_id, SessionStatus::Running).await?;
        }
        Ok(result)
    }

    async fn apply_failure(
        &self,
        session_id: SessionId,
        plan: &Plan,
        step: &Step,
        error: StepError,
        attempt: u32,
    ) -> Result<StepOutcome, KernelError> {
        self.record_step_result(session_id, step.step_id, StepStatus::Failed, None, Some(error.clone()), attempt)
            .await?;
        self.journal
            .emit(session_id, "step.failed", json!({ "step_id": step.step_id, "error": &error, "attempt": attempt }))
            .await?;

        let decision = self.feed_futility(session_id, plan, step.step_id, false, Some(error.message.clone())).await?;
        if let FutilityDecision::Halt { reason } = decision {
            return Ok(StepOutcome::Futility(reason));
        }

        match step.failure_policy {
            FailurePolicy::Abort => Ok(StepOutcome::AbortPlan(error.message)),
            FailurePolicy::Continue => Ok(StepOutcome::ContinuedAfterFailure),
            FailurePolicy::Replan => Ok(StepOutcome::Replan),
        }
    }

    async fn check_budget(&self, session_id: SessionId, step: &Step) -> Result<Option<StepOutcome>, KernelError> {
        let handle = self.handle(session_id)?;
        let running = handle.lock().await;
        let Some(max_tokens) = running.session.limits.max_tokens else {
            return Ok(None);
        };
        let usage = self.tools.usage_for(session_id);
        // a step's own token estimate isn't known ahead of dispatch; treat
        // `tokens_used` already crossing the limit as the exceeded case.
        drop(running);
        if usage.tokens_used >= max_tokens {
            self.journal
                .emit(session_id, "limit.exceeded", json!({ "step_id": step.step_id, "tokens_used": usage.tokens_used, "max_tokens": max_tokens }))
                .await?;
            self.transition(session_id, SessionStatus::Failed).await?;
            self.journal.emit(session_id, "session.failed", json!({ "reason": "budget_exceeded" })).await?;
            return Ok(Some(StepOutcome::AbortPlan("budget exceeded".to_string())));
        }
        Ok(None)
    }

    async fn resolve_inputs(&self, session_id: SessionId, step: &Step) -> Result<serde_json::Value, KernelError> {
        let Some(bindings) = &step.input_from else {
            return Ok(step.input.clone());
        };
        let handle = self.handle(session_id)?;
        let running = handle.lock().await;
        let mut input = step.input.clone();
        let obj = input.as_object_mut().ok_or_else(|| KernelError::PlanRejected("step input must be an object to use input_from".to_string()))?;
        for (key, reference) in bindings {
            let (ref_step, pointer) = reference.split_once('#').unwrap_or((reference.as_str(), ""));
            let ref_step_id: StepId = ref_step
                .parse()
                .map_err(|_| KernelError::PlanRejected(format!("invalid input_from reference `{reference}`")))?;
            let result = running
                .results
                .get(&ref_step_id)
                .ok_or_else(|| KernelError::PlanRejected(format!("input_from references unknown step `{ref_step}`")))?;
            let output = result.output.as_ref().ok_or_else(|| KernelError::PlanRejected(format!("step `{ref_step}` has no output yet")))?;
            let value = if pointer.is_empty() {
                output.clone()
            } else {
                output.pointer(pointer).cloned().unwrap_or(serde_json::Value::Null)
            };
            obj.insert(key.clone(), value);
        }
        Ok(input)
    }

    async fn record_step_result(
        &self,
        session_id: SessionId,
        step_id: StepId,
        status: StepStatus,
        output: Option<serde_json::Value>,
        error: Option<StepError>,
        attempt: u32,
    ) -> Result<(), KernelError> {
        let handle = self.handle(session_id)?;
        let mut running = handle.lock().await;
        let now = chrono::Utc::now();
        let entry = running.results.entry(step_id).or_insert_with(|| StepResult::pending(step_id));
        entry.status = status;
        entry.output = output;
        entry.error = error;
        entry.attempt = attempt;
        entry.finished_at = Some(now);
        if entry.started_at.is_none() {
            entry.started_at = Some(now);
        }
        Ok(())
    }

    async fn feed_futility(
        &self,
        session_id: SessionId,
        plan: &Plan,
        _step_id: StepId,
        succeeded: bool,
        error_message: Option<String>,
    ) -> Result<FutilityDecision, KernelError> {
        let handle = self.handle(session_id)?;
        let (max_cost_usd, iteration) = {
            let mut running = handle.lock().await;
            running.iteration += 1;
            (running.session.limits.max_cost_usd, running.iteration)
        };
        let usage = self.tools.usage_for(session_id);

        let record = IterationRecord {
            iteration,
            plan_goal: plan.goal.clone(),
            step_results: vec![StepResultSummary { succeeded, error_message }],
            iteration_usage: Some(IterationUsage { cost_usd: usage.total_cost_usd }),
            cumulative_usage: Some(CumulativeUsage { total_cost_usd: usage.total_cost_usd }),
            max_cost_usd,
        };

        let monitor_lock = self
            .futility_monitors
            .get(&session_id)
            .ok_or(KernelError::SessionNotFound(session_id))?;
        let mut monitor = monitor_lock.lock().await;
        let decision = monitor.record_iteration(record);
        if let FutilityDecision::Halt { reason } = &decision {
            self.journal.emit(session_id, "futility.detected", json!({ "reason": reason })).await?;
        }
        Ok(decision)
    }
}

async fn running_is_aborted(handle: &Arc<AsyncMutex<RunningSession>>) -> bool {
    handle.lock().await.session.status == SessionStatus::Aborted
}

fn tool_mode(mode: SessionMode) -> ToolMode {
    match mode {
        SessionMode::Real => ToolMode::Real,
        SessionMode::DryRun => ToolMode::DryRun,
        SessionMode::Mock => ToolMode::Mock,
    }
}

fn lessons_from_failures(results: &HashMap<StepId, StepResult>) -> Vec<LessonExcerpt> {
    results
        .values()
        .filter_map(|r| {
            r.error.as_ref().map(|e| LessonExcerpt {
                step_id: r.step_id,
                summary: e.message.chars().take(200).collect(),
            })
        })
        .collect()
}

enum PlanOutcome {
    Completed,
    Failed(String),
    Replan,
    Aborted,
}

enum StepOutcome {
    Succeeded,
    ContinuedAfterFailure,
    AbortPlan(String),
    Replan,
    Futility(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fulcrum_journal::FileJournal;
    use fulcrum_permission::{ApprovalChannel, ApprovalDecision, ApprovalPromptRequest, LegacyDecision, PermissionError};
    use futures::TryStreamExt;
    use fulcrum_tools::{CircuitBreakerConfig, ToolHandler, ToolRegistry, ToolSchema, ToolSupports};
    use serde_json::json;
    use std::sync::Arc;

    struct EchoTool;

    #[async_trait]
    impl ToolHandler for EchoTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "echo".to_string(),
                version: "1.0.0".to_string(),
                input_schema: json!({ "required": ["text"] }),
                supports: ToolSupports { mock: true, dry_run: true },
                mock_responses: None,
            }
        }

        async fn handle(&self, input: serde_json::Value, _mode: ToolMode, _policy: &PolicyProfile) -> Result<serde_json::Value, fulcrum_tools::ToolError> {
            Ok(json!({ "echoed": input.get("text").cloned().unwrap_or(serde_json::Value::Null) }))
        }
    }

    struct OneStepPlanner;

    #[async_trait]
    impl Planner for OneStepPlanner {
        async fn generate_plan(
            &self,
            _task: &str,
            _tool_schemas: &[ToolSchema],
            _state_snapshot: &StateSnapshot,
            _constraints: &PlanConstraints,
        ) -> Result<crate::planner::PlannerOutput, KernelError> {
            Ok(crate::planner::PlannerOutput {
                plan: Plan {
                    plan_id: fulcrum_common::PlanId::new(),
                    goal: "say hi".to_string(),
                    steps: vec![Step {
                        step_id: StepId::new(),
                        tool_ref: crate::types::ToolRef { name: "echo".to_string(), version: None },
                        input: json!({ "text": "hi" }),
                        input_from: None,
                        success_criteria: None,
                        failure_policy: FailurePolicy::Abort,
                        max_retries: 0,
                        timeout_ms: None,
                        depends_on: vec![],
                    }],
                },
                usage: None,
            })
        }
    }

    struct AllowAll;

    #[async_trait]
    impl ApprovalChannel for AllowAll {
        async fn prompt(&self, _request: ApprovalPromptRequest) -> Result<ApprovalDecision, PermissionError> {
            Ok(ApprovalDecision::Legacy(LegacyDecision::AllowSession))
        }
    }

    async fn build_kernel(dir: &tempfile::TempDir) -> (Kernel, Arc<dyn Journal>) {
        let journal: Arc<dyn Journal> = Arc::new(FileJournal::open(dir.path().join("j.ndjson")).unwrap());
        let permission = Arc::new(DefaultPermissionEngine::new(journal.clone(), Arc::new(AllowAll), b"secret".to_vec()));
        let registry = Arc::new(ToolRegistry::new());
        registry.register(Arc::new(EchoTool));
        let tools = Arc::new(ToolRuntime::new(registry, journal.clone(), CircuitBreakerConfig::default()));
        let kernel = Kernel::new(journal.clone(), permission, tools, Arc::new(OneStepPlanner), crate::critics::default_critics(), KernelConfig::default());
        (kernel, journal)
    }

    #[tokio::test]
    async fn single_step_happy_path_completes() {
        let dir = tempfile::tempdir().unwrap();
        let (kernel, journal) = build_kernel(&dir).await;
        let session_id = kernel
            .create_session("say hi".to_string(), SessionMode::Mock, Limits::default(), PolicyProfile::default())
            .await
            .unwrap();

        let status = kernel.run(session_id).await.unwrap();
        assert_eq!(status, SessionStatus::Completed);

        let events: Vec<_> = journal.read_session(session_id, None).await.unwrap().try_collect().await.unwrap();
        let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert!(types.contains(&"session.created"));
        assert!(types.contains(&"step.succeeded"));
        assert!(types.contains(&"session.completed"));
        assert_eq!(types.last(), Some(&"session.completed"));
    }

    #[tokio::test]
    async fn abort_short_circuits_the_run_loop() {
        let dir = tempfile::tempdir().unwrap();
        let (kernel, _journal) = build_kernel(&dir).await;
        let session_id = kernel
            .create_session("say hi".to_string(), SessionMode::Mock, Limits::default(), PolicyProfile::default())
            .await
            .unwrap();
        kernel.abort(session_id).await.unwrap();
        let status = kernel.run(session_id).await.unwrap();
        assert_eq!(status, SessionStatus::Aborted);
    }
}
