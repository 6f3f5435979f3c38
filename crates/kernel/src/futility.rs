//! Futility Monitor (spec.md §4.7): detects unproductive iteration loops
//! and halts them. Grounded on `crates/repl-core/src/execution_monitor.rs`'s
//! `ExecutionMonitor` (bounded trace history, rolling stats recomputed from
//! that history on every call) generalized from "trace length/cost stats"
//! to the five priority-ordered halting checks spec.md names.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::types::StepResult;

/// Internal history is bounded at 100 iterations; older entries drop FIFO.
const MAX_HISTORY: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FutilityConfig {
    pub max_repeated_errors: u32,
    pub max_identical_plans: u32,
    pub max_stagnant_iterations: u32,
    pub max_cost_without_progress: u32,
    pub budget_burn_threshold: f64,
}

impl Default for FutilityConfig {
    fn default() -> Self {
        Self {
            max_repeated_errors: 3,
            max_identical_plans: 3,
            max_stagnant_iterations: 3,
            max_cost_without_progress: 3,
            budget_burn_threshold: 0.9,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IterationUsage {
    pub cost_usd: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CumulativeUsage {
    pub total_cost_usd: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: u64,
    pub plan_goal: String,
    pub step_results: Vec<StepResultSummary>,
    pub iteration_usage: Option<IterationUsage>,
    pub cumulative_usage: Option<CumulativeUsage>,
    pub max_cost_usd: Option<f64>,
}

/// A slimmed view of a [`StepResult`] — only what the monitor needs, so
/// callers don't have to thread full `Value` outputs through it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResultSummary {
    pub succeeded: bool,
    pub error_message: Option<String>,
}

impl From<&StepResult> for StepResultSummary {
    fn from(result: &StepResult) -> Self {
        Self {
            succeeded: matches!(result.status, crate::types::StepStatus::Succeeded),
            error_message: result.error.as_ref().map(|e| e.message.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FutilityDecision {
    Continue,
    Halt { reason: String },
}

/// Normalize an error message the way spec.md §4.7 #1 requires: trim,
/// collapse internal whitespace, lowercase, truncate to 200 chars.
fn normalize_error(message: &str) -> String {
    let collapsed = message.split_whitespace().collect::<Vec<_>>().join(" ");
    let lowered = collapsed.to_lowercase();
    lowered.chars().take(200).collect()
}

fn succeeded_count(record: &IterationRecord) -> usize {
    record.step_results.iter().filter(|r| r.succeeded).count()
}

fn any_succeeded(record: &IterationRecord) -> bool {
    record.step_results.iter().any(|r| r.succeeded)
}

/// Bounded iteration history plus the derived counters needed to evaluate
/// each check without rescanning the whole history every call.
pub struct FutilityMonitor {
    config: FutilityConfig,
    history: VecDeque<IterationRecord>,
    repeated_error_streak: u32,
    identical_plan_streak: u32,
    stagnant_streak: u32,
    cost_without_progress_streak: u32,
    last_succeeded_count: Option<usize>,
}

impl FutilityMonitor {
    pub fn new(config: FutilityConfig) -> Self {
        Self {
            config,
            history: VecDeque::new(),
            repeated_error_streak: 0,
            identical_plan_streak: 0,
            stagnant_streak: 0,
            cost_without_progress_streak: 0,
            last_succeeded_count: None,
        }
    }

    pub fn record_iteration(&mut self, record: IterationRecord) -> FutilityDecision {
        let decision = self.evaluate(&record);

        self.history.push_back(record);
        while self.history.len() > MAX_HISTORY {
            self.history.pop_front();
        }

        decision
    }

    fn evaluate(&mut self, record: &IterationRecord) -> FutilityDecision {
        if let Some(decision) = self.check_repeated_errors(record) {
            return decision;
        }
        if let Some(decision) = self.check_identical_plan(record) {
            return decision;
        }
        if let Some(decision) = self.check_stagnation(record) {
            return decision;
        }
        if let Some(decision) = self.check_cost_without_progress(record) {
            return decision;
        }
        if let Some(decision) = self.check_budget_burn(record) {
            return decision;
        }
        FutilityDecision::Continue
    }

    /// 1. Repeated errors: a successful iteration resets the streak.
    fn check_repeated_errors(&mut self, record: &IterationRecord) -> Option<FutilityDecision> {
        if any_succeeded(record) {
            self.repeated_error_streak = 0;
            return None;
        }

        let current_normalized = record
            .step_results
            .iter()
            .filter(|r| !r.succeeded)
            .filter_map(|r| r.error_message.as_deref())
            .map(normalize_error)
            .last()?;

        let prev_normalized = self
            .history
            .back()
            .and_then(|prev| prev.step_results.iter().filter(|r| !r.succeeded).filter_map(|r| r.error_message.as_deref()).last())
            .map(normalize_error);

        if prev_normalized.as_deref() == Some(current_normalized.as_str()) {
            self.repeated_error_streak += 1;
        } else {
            self.repeated_error_streak = 1;
        }

        if self.repeated_error_streak >= self.config.max_repeated_errors {
            return Some(FutilityDecision::Halt {
                reason: format!("Same error repeated {} times", self.repeated_error_streak),
            });
        }
        None
    }

    /// 2. Identical plan goal, strictly consecutive.
    fn check_identical_plan(&mut self, record: &IterationRecord) -> Option<FutilityDecision> {
        let matches_prev = self.history.back().map(|prev| prev.plan_goal == record.plan_goal).unwrap_or(false);
        if matches_prev {
            self.identical_plan_streak += 1;
        } else {
            self.identical_plan_streak = 1;
        }

        if self.identical_plan_streak >= self.config.max_identical_plans {
            return Some(FutilityDecision::Halt {
                reason: format!(
                    "Identical plan goal \"{}\" for {} consecutive iterations",
                    record.plan_goal, self.identical_plan_streak
                ),
            });
        }
        None
    }

    /// 3. Stagnation: succeeded-step count hasn't increased.
    fn check_stagnation(&mut self, record: &IterationRecord) -> Option<FutilityDecision> {
        let current = succeeded_count(record);
        let progressed = self.last_succeeded_count.map(|prev| current > prev).unwrap_or(true);

        if progressed {
            self.stagnant_streak = 0;
        } else {
            self.stagnant_streak += 1;
        }
        self.last_succeeded_count = Some(current);

        if self.stagnant_streak >= self.config.max_stagnant_iterations {
            return Some(FutilityDecision::Halt {
                reason: format!("No progress (stuck at {current} succeeded steps)"),
            });
        }
        None
    }

    /// 4. Cost without progress: only tracked when `iteration_usage` is
    /// present; resets on any growth in succeeded-step count.
    fn check_cost_without_progress(&mut self, record: &IterationRecord) -> Option<FutilityDecision> {
        record.iteration_usage.as_ref()?;

        let current = succeeded_count(record);
        let prev = self.history.back().map(|p| succeeded_count(p));
        let progressed = prev.map(|prev| current > prev).unwrap_or(true);

        if progressed {
            self.cost_without_progress_streak = 0;
            return None;
        }
        self.cost_without_progress_streak += 1;

        if self.cost_without_progress_streak >= self.config.max_cost_without_progress {
            return Some(FutilityDecision::Halt {
                reason: "budget spent without new successful steps".to_string(),
            });
        }
        None
    }

    /// 5. Budget burn: cumulative burn ratio past threshold AND this
    /// iteration's success rate below 50%.
    fn check_budget_burn(&self, record: &IterationRecord) -> Option<FutilityDecision> {
        let cumulative = record.cumulative_usage.as_ref()?;
        let max_cost = record.max_cost_usd.filter(|m| *m > 0.0)?;

        let burn = cumulative.total_cost_usd / max_cost;
        if burn < self.config.budget_burn_threshold {
            return None;
        }

        let total = record.step_results.len();
        if total == 0 {
            return None;
        }
        let success_rate = succeeded_count(record) as f64 / total as f64;
        if success_rate >= 0.5 {
            return None;
        }

        Some(FutilityDecision::Halt {
            reason: format!("Budget {:.0}% spent with low success rate", burn * 100.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(iteration: u64, goal: &str, succeeded: usize, failed_msg: Option<&str>) -> IterationRecord {
        let mut steps = vec![StepResultSummary { succeeded: true, error_message: None }; succeeded];
        if let Some(msg) = failed_msg {
            steps.push(StepResultSummary { succeeded: false, error_message: Some(msg.to_string()) });
        }
        IterationRecord {
            iteration,
            plan_goal: goal.to_string(),
            step_results: steps,
            iteration_usage: None,
            cumulative_usage: None,
            max_cost_usd: None,
        }
    }

    #[test]
    fn stagnation_halts_on_the_configured_iteration() {
        let mut monitor = FutilityMonitor::new(FutilityConfig { max_stagnant_iterations: 3, ..Default::default() });
        assert_eq!(monitor.record_iteration(record(1, "g", 1, None)), FutilityDecision::Continue);
        assert_eq!(monitor.record_iteration(record(2, "g", 1, None)), FutilityDecision::Continue);
        assert_eq!(monitor.record_iteration(record(3, "g", 1, None)), FutilityDecision::Continue);
        let decision = monitor.record_iteration(record(4, "g", 1, None));
        match decision {
            FutilityDecision::Halt { reason } => assert!(reason.contains("No progress")),
            _ => panic!("expected halt"),
        }
    }

    #[test]
    fn progress_resets_stagnation_streak() {
        let mut monitor = FutilityMonitor::new(FutilityConfig { max_stagnant_iterations: 2, ..Default::default() });
        assert_eq!(monitor.record_iteration(record(1, "g", 1, None)), FutilityDecision::Continue);
        assert_eq!(monitor.record_iteration(record(2, "g", 2, None)), FutilityDecision::Continue);
        assert_eq!(monitor.record_iteration(record(3, "g", 2, None)), FutilityDecision::Continue);
        let decision = monitor.record_iteration(record(4, "g", 2, None));
        assert!(matches!(decision, FutilityDecision::Halt { .. }));
    }

    #[test]
    fn repeated_error_halts_and_resets_on_success() {
        let mut monitor = FutilityMonitor::new(FutilityConfig { max_repeated_errors: 2, ..Default::default() });
        assert_eq!(
            monitor.record_iteration(record(1, "g", 0, Some("Connection   Refused"))),
            FutilityDecision::Continue
        );
        let decision = monitor.record_iteration(record(2, "g", 0, Some("connection refused")));
        assert!(matches!(decision, FutilityDecision::Halt { .. }));

        let mut monitor2 = FutilityMonitor::new(FutilityConfig { max_repeated_errors: 2, ..Default::default() });
        monitor2.record_iteration(record(1, "g", 0, Some("boom")));
        monitor2.record_iteration(record(2, "g", 1, None));
        let decision = monitor2.record_iteration(record(3, "g", 0, Some("boom")));
        assert_eq!(decision, FutilityDecision::Continue);
    }

    #[test]
    fn identical_plan_goal_requires_consecutive_repetition() {
        let mut monitor = FutilityMonitor::new(FutilityConfig { max_identical_plans: 2, ..Default::default() });
        assert_eq!(monitor.record_iteration(record(1, "goal-a", 1, None)), FutilityDecision::Continue);
        assert_eq!(monitor.record_iteration(record(2, "goal-b", 1, None)), FutilityDecision::Continue);
        // non-consecutive repetition of goal-a does not trigger
        assert_eq!(monitor.record_iteration(record(3, "goal-a", 1, None)), FutilityDecision::Continue);
        let decision = monitor.record_iteration(record(4, "goal-a", 1, None));
        match decision {
            FutilityDecision::Halt { reason } => assert!(reason.contains("consecutive")),
            _ => panic!("expected halt"),
        }
    }

    #[test]
    fn budget_burn_requires_both_high_burn_and_low_success_rate() {
        let mut monitor = FutilityMonitor::new(FutilityConfig { budget_burn_threshold: 0.8, ..Default::default() });
        let mut rec = record(1, "g", 0, Some("x"));
        rec.cumulative_usage = Some(CumulativeUsage { total_cost_usd: 9.0 });
        rec.max_cost_usd = Some(10.0);
        let decision = monitor.record_iteration(rec);
        match decision {
            FutilityDecision::Halt { reason } => assert!(reason.contains("Budget")),
            _ => panic!("expected halt"),
        }
    }

    #[test]
    fn history_is_bounded_at_100_entries() {
        let mut monitor = FutilityMonitor::new(FutilityConfig::default());
        for i in 0..150u64 {
            monitor.record_iteration(record(i, "g", (i % 5) as usize + 1, None));
        }
        assert_eq!(monitor.history.len(), MAX_HISTORY);
    }
}
