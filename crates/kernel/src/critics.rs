//! Plan critics (spec.md §4.3): pure checks over a plan candidate. All
//! critics run regardless of earlier failures so the report enumerates
//! every issue in one pass.

use std::collections::{HashSet, VecDeque};

use fulcrum_tools::ToolSchema;
use serde::Serialize;

use crate::types::{Limits, Plan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize)]
pub struct CriticResult {
    pub name: &'static str,
    pub passed: bool,
    pub message: Option<String>,
    pub severity: Severity,
}

impl CriticResult {
    fn pass(name: &'static str) -> Self {
        Self { name, passed: true, message: None, severity: Severity::Error }
    }

    fn fail(name: &'static str, message: impl Into<String>) -> Self {
        Self { name, passed: false, message: Some(message.into()), severity: Severity::Error }
    }
}

pub struct CriticContext<'a> {
    pub limits: &'a Limits,
    pub tool_schemas: &'a [ToolSchema],
}

pub trait Critic: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, plan: &Plan, ctx: &CriticContext<'_>) -> CriticResult;
}

#[derive(Debug, Clone, Serialize)]
pub struct CriticReport {
    pub results: Vec<CriticResult>,
    pub passed: bool,
}

pub fn run_critics(critics: &[Box<dyn Critic>], plan: &Plan, ctx: &CriticContext<'_>) -> CriticReport {
    let results: Vec<CriticResult> = critics.iter().map(|c| c.check(plan, ctx)).collect();
    let passed = results.iter().all(|r| r.passed);
    CriticReport { results, passed }
}

pub fn default_critics() -> Vec<Box<dyn Critic>> {
    vec![
        Box::new(ToolInputCritic),
        Box::new(StepLimitCritic),
        Box::new(SelfReferenceCritic),
        Box::new(UnknownToolCritic),
    ]
}

pub struct ToolInputCritic;

impl Critic for ToolInputCritic {
    fn name(&self) -> &'static str {
        "toolInputCritic"
    }

    fn check(&self, plan: &Plan, ctx: &CriticContext<'_>) -> CriticResult {
        for step in &plan.steps {
            let Some(schema) = ctx.tool_schemas.iter().find(|s| s.name == step.tool_ref.name) else {
                continue; // unknownToolCritic reports this separately
            };
            let Some(required) = schema.input_schema.get("required").and_then(|v| v.as_array()) else {
                continue;
            };
            for field in required {
                let Some(field_name) = field.as_str() else { continue };
                let present = step.input.get(field_name).is_some()
                    || step.input_from.as_ref().map(|m| m.contains_key(field_name)).unwrap_or(false);
                if !present {
                    return CriticResult::fail(
                        self.name(),
                        format!("step {} missing required input `{field_name}` for tool `{}`", step.step_id, step.tool_ref.name),
                    );
                }
            }
        }
        CriticResult::pass(self.name())
    }
}

pub struct StepLimitCritic;

impl Critic for StepLimitCritic {
    fn name(&self) -> &'static str {
        "stepLimitCritic"
    }

    fn check(&self, plan: &Plan, ctx: &CriticContext<'_>) -> CriticResult {
        if plan.steps.len() > ctx.limits.max_steps {
            return CriticResult::fail(
                self.name(),
                format!("plan has {} steps, exceeding limit of {}", plan.steps.len(), ctx.limits.max_steps),
            );
        }
        CriticResult::pass(self.name())
    }
}

pub struct SelfReferenceCritic;

impl Critic for SelfReferenceCritic {
    fn name(&self) -> &'static str {
        "selfReferenceCritic"
    }

    fn check(&self, plan: &Plan, _ctx: &CriticContext<'_>) -> CriticResult {
        for step in &plan.steps {
            if step.depends_on.contains(&step.step_id) {
                return CriticResult::fail(self.name(), format!("step {} depends on itself", step.step_id));
            }
        }
        if let Some(cycle_step) = find_cycle(plan) {
            return CriticResult::fail(self.name(), format!("dependency cycle detected at step {cycle_step}"));
        }
        CriticResult::pass(self.name())
    }
}

#[derive(PartialEq, Eq, Clone, Copy)]
enum Mark {
    Visiting,
    Done,
}

fn find_cycle(plan: &Plan) -> Option<fulcrum_common::StepId> {
    let mut marks = std::collections::HashMap::new();
    for step in &plan.steps {
        if !marks.contains_key(&step.step_id) {
            let mut stack = VecDeque::new();
            if dfs(plan, step.step_id, &mut marks, &mut stack) {
                return Some(step.step_id);
            }
        }
    }
    None
}

fn dfs(
    plan: &Plan,
    step_id: fulcrum_common::StepId,
    marks: &mut std::collections::HashMap<fulcrum_common::StepId, Mark>,
    recursion_stack: &mut VecDeque<fulcrum_common::StepId>,
) -> bool {
    if let Some(Mark::Done) = marks.get(&step_id) {
        return false;
    }
    if recursion_stack.contains(&step_id) {
        return true;
    }
    recursion_stack.push_back(step_id);
    marks.insert(step_id, Mark::Visiting);

    if let Some(step) = plan.steps.iter().find(|s| s.step_id == step_id) {
        for dep in &step.depends_on {
            if dfs(plan, *dep, marks, recursion_stack) {
                return true;
            }
        }
    }

    recursion_stack.pop_back();
    marks.insert(step_id, Mark::Done);
    false
}

pub struct UnknownToolCritic;

impl Critic for UnknownToolCritic {
    fn name(&self) -> &'static str {
        "unknownToolCritic"
    }

    fn check(&self, plan: &Plan, ctx: &CriticContext<'_>) -> CriticResult {
        let known: HashSet<&str> = ctx.tool_schemas.iter().map(|s| s.name.as_str()).collect();
        for step in &plan.steps {
            if !known.contains(step.tool_ref.name.as_str()) {
                return CriticResult::fail(self.name(), format!("unknown tool `{}` referenced by step {}", step.tool_ref.name, step.step_id));
            }
        }
        CriticResult::pass(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FailurePolicy, ToolRef};
    use fulcrum_common::{PlanId, StepId};
    use fulcrum_tools::ToolSupports;
    use serde_json::json;

    fn step(step_id: StepId, tool: &str, depends_on: Vec<StepId>) -> crate::types::Step {
        crate::types::Step {
            step_id,
            tool_ref: ToolRef { name: tool.to_string(), version: None },
            input: json!({}),
            input_from: None,
            success_criteria: None,
            failure_policy: FailurePolicy::Abort,
            max_retries: 0,
            timeout_ms: None,
            depends_on,
        }
    }

    fn schema(name: &str) -> ToolSchema {
        ToolSchema {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            input_schema: json!({ "required": ["x"] }),
            supports: ToolSupports { mock: true, dry_run: true },
            mock_responses: None,
        }
    }

    #[test]
    fn self_reference_critic_detects_direct_cycle() {
        let a = StepId::new();
        let plan = Plan { plan_id: PlanId::new(), goal: "g".to_string(), steps: vec![step(a, "t", vec![a])] };
        let ctx = CriticContext { limits: &Limits::default(), tool_schemas: &[] };
        let result = SelfReferenceCritic.check(&plan, &ctx);
        assert!(!result.passed);
    }

    #[test]
    fn self_reference_critic_detects_indirect_cycle() {
        let a = StepId::new();
        let b = StepId::new();
        let plan = Plan {
            plan_id: PlanId::new(),
            goal: "g".to_string(),
            steps: vec![step(a, "t", vec![b]), step(b, "t", vec![a])],
        };
        let ctx = CriticContext { limits: &Limits::default(), tool_schemas: &[] };
        assert!(!SelfReferenceCritic.check(&plan, &ctx).passed);
    }

    #[test]
    fn unknown_tool_critic_flags_missing_registration() {
        let plan = Plan { plan_id: PlanId::new(), goal: "g".to_string(), steps: vec![step(StepId::new(), "ghost", vec![])] };
        let ctx = CriticContext { limits: &Limits::default(), tool_schemas: &[schema("real_tool")] };
        assert!(!UnknownToolCritic.check(&plan, &ctx).passed);
    }

    #[test]
    fn tool_input_critic_requires_required_fields() {
        let mut s = step(StepId::new(), "real_tool", vec![]);
        s.input = json!({});
        let plan = Plan { plan_id: PlanId::new(), goal: "g".to_string(), steps: vec![s] };
        let ctx = CriticContext { limits: &Limits::default(), tool_schemas: &[schema("real_tool")] };
        assert!(!ToolInputCritic.check(&plan, &ctx).passed);
    }

    #[test]
    fn step_limit_critic_enforces_max_steps() {
        let plan = Plan {
            plan_id: PlanId::new(),
            goal: "g".to_string(),
            steps: (0..5).map(|_| step(StepId::new(), "real_tool", vec![])).collect(),
        };
        let limits = Limits { max_steps: 3, ..Limits::default() };
        let ctx = CriticContext { limits: &limits, tool_schemas: &[schema("real_tool")] };
        assert!(!StepLimitCritic.check(&plan, &ctx).passed);
    }

    #[test]
    fn run_critics_runs_every_critic_regardless_of_failure() {
        let plan = Plan { plan_id: PlanId::new(), goal: "g".to_string(), steps: vec![step(StepId::new(), "ghost", vec![])] };
        let ctx = CriticContext { limits: &Limits::default(), tool_schemas: &[] };
        let report = run_critics(&default_critics(), &plan, &ctx);
        assert!(!report.passed);
        assert_eq!(report.results.len(), 4);
    }
}
