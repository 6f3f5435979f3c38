//! Optimization loop (spec.md §4.12): periodically re-scores every active
//! delegation against the best currently-available alternative and decides
//! whether to keep, redelegate, or escalate.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use fulcrum_common::{PeerId, TaskId};

#[derive(Debug, Clone, Copy)]
pub struct OptimizationConfig {
    pub drift_threshold: f64,
    pub overhead_factor: f64,
    pub min_time_before_redelegate: Duration,
    pub escalate_on_missed_checkpoints: u32,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            drift_threshold: 0.25,
            overhead_factor: 0.05,
            min_time_before_redelegate: Duration::from_secs(60),
            escalate_on_missed_checkpoints: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OptimizationDecision {
    Keep,
    Redelegate { alternative: PeerId },
    Escalate,
}

/// Anti-thrashing state: when each task was last re-delegated, so the loop
/// can refuse to redelegate again inside `min_time_before_redelegate`.
pub struct OptimizationLoop {
    config: OptimizationConfig,
    last_redelegated_at: HashMap<TaskId, Instant>,
}

impl OptimizationLoop {
    pub fn new(config: OptimizationConfig) -> Self {
        Self { config, last_redelegated_at: HashMap::new() }
    }

    pub fn note_redelegated(&mut self, task_id: TaskId, at: Instant) {
        self.last_redelegated_at.insert(task_id, at);
    }

    /// `current_score`/`best_alternative_score` come from the same scoring
    /// function the work distributor uses. `checkpoint_misses` is the
    /// task monitor's current streak for this task.
    pub fn evaluate(
        &self,
        task_id: TaskId,
        current_score: f64,
        best_alternative: Option<(PeerId, f64)>,
        checkpoint_misses: u32,
        now: Instant,
    ) -> OptimizationDecision {
        if checkpoint_misses >= self.config.escalate_on_missed_checkpoints {
            return OptimizationDecision::Escalate;
        }

        let Some((alternative, best_alternative_score)) = best_alternative else {
            return OptimizationDecision::Keep;
        };

        let drift = (best_alternative_score - current_score) / current_score.max(0.01) - self.config.overhead_factor;
        if drift <= self.config.drift_threshold {
            return OptimizationDecision::Keep;
        }

        let cooled_down = self
            .last_redelegated_at
            .get(&task_id)
            .map(|last| now.duration_since(*last) > self.config.min_time_before_redelegate)
            .unwrap_or(true);
        if !cooled_down {
            return OptimizationDecision::Keep;
        }

        OptimizationDecision::Redelegate { alternative }
    }
}
