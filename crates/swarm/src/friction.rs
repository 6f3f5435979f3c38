//! Cognitive-friction engine (spec.md §4.16): scores a delegation decision
//! point along several risk factors and maps the composite score to an
//! escalation tier, with an anti-alarm-fatigue reducer so a noisy run of
//! borderline decisions doesn't bury the human in prompts.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct FrictionWeights {
    pub criticality: f64,
    pub irreversibility: f64,
    pub uncertainty: f64,
    pub depth_ratio: f64,
    pub trust_deficit: f64,
}

impl Default for FrictionWeights {
    fn default() -> Self {
        Self {
            criticality: 0.3,
            irreversibility: 0.25,
            uncertainty: 0.2,
            depth_ratio: 0.15,
            trust_deficit: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FrictionInputs {
    pub criticality: f64,
    pub irreversibility: f64,
    pub uncertainty: f64,
    /// Current delegation depth over the firebreak's effective max depth.
    pub depth_ratio: f64,
    /// `1 - peer_reputation_score`.
    pub trust_deficit: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FrictionTier {
    None,
    Info,
    Confirm,
    MandatoryHuman,
}

#[derive(Debug, Clone, Copy)]
pub struct FrictionThresholds {
    pub info: f64,
    pub confirm: f64,
    pub mandatory_human: f64,
}

impl Default for FrictionThresholds {
    fn default() -> Self {
        Self { info: 0.25, confirm: 0.5, mandatory_human: 0.8 }
    }
}

pub fn composite_score(weights: &FrictionWeights, inputs: &FrictionInputs) -> f64 {
    weights.criticality * inputs.criticality.clamp(0.0, 1.0)
        + weights.irreversibility * inputs.irreversibility.clamp(0.0, 1.0)
        + weights.uncertainty * inputs.uncertainty.clamp(0.0, 1.0)
        + weights.depth_ratio * inputs.depth_ratio.clamp(0.0, 1.0)
        + weights.trust_deficit * inputs.trust_deficit.clamp(0.0, 1.0)
}

fn tier_for_score(thresholds: &FrictionThresholds, score: f64) -> FrictionTier {
    if score >= thresholds.mandatory_human {
        FrictionTier::MandatoryHuman
    } else if score >= thresholds.confirm {
        FrictionTier::Confirm
    } else if score >= thresholds.info {
        FrictionTier::Info
    } else {
        FrictionTier::None
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AntiFatigueConfig {
    pub window: Duration,
    pub max_escalations: u32,
}

impl Default for AntiFatigueConfig {
    fn default() -> Self {
        Self { window: Duration::from_secs(300), max_escalations: 5 }
    }
}

/// Suppresses repeated `Info`/`Confirm` escalations within a rolling window
/// once too many have already fired, to avoid training the operator to
/// ignore prompts. `MandatoryHuman` is never suppressed.
pub struct FrictionEngine {
    weights: FrictionWeights,
    thresholds: FrictionThresholds,
    anti_fatigue: AntiFatigueConfig,
    recent_escalations: VecDeque<Instant>,
}

impl FrictionEngine {
    pub fn new(weights: FrictionWeights, thresholds: FrictionThresholds, anti_fatigue: AntiFatigueConfig) -> Self {
        Self { weights, thresholds, anti_fatigue, recent_escalations: VecDeque::new() }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.recent_escalations.front() {
            if now.duration_since(*front) > self.anti_fatigue.window {
                self.recent_escalations.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn evaluate(&mut self, inputs: &FrictionInputs, now: Instant) -> FrictionTier {
        let score = composite_score(&self.weights, inputs);
        let tier = tier_for_score(&self.thresholds, score);

        self.prune(now);

        if matches!(tier, FrictionTier::Info | FrictionTier::Confirm)
            && self.recent_escalations.len() as u32 >= self.anti_fatigue.max_escalations
        {
            return FrictionTier::None;
        }

        if !matches!(tier, FrictionTier::None) {
            self.recent_escalations.push_back(now);
        }
        tier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(level: f64) -> FrictionInputs {
        FrictionInputs { criticality: level, irreversibility: level, uncertainty: level, depth_ratio: level, trust_deficit: level }
    }

    #[test]
    fn low_risk_maps_to_none() {
        let mut engine = FrictionEngine::new(FrictionWeights::default(), FrictionThresholds::default(), AntiFatigueConfig::default());
        assert_eq!(engine.evaluate(&inputs(0.0), Instant::now()), FrictionTier::None);
    }

    #[test]
    fn high_risk_maps_to_mandatory_human() {
        let mut engine = FrictionEngine::new(FrictionWeights::default(), FrictionThresholds::default(), AntiFatigueConfig::default());
        assert_eq!(engine.evaluate(&inputs(1.0), Instant::now()), FrictionTier::MandatoryHuman);
    }

    #[test]
    fn anti_fatigue_suppresses_repeated_confirm_but_never_mandatory_human() {
        let mut engine = FrictionEngine::new(
            FrictionWeights::default(),
            FrictionThresholds::default(),
            AntiFatigueConfig { window: Duration::from_secs(300), max_escalations: 2 },
        );
        let now = Instant::now();
        assert_eq!(engine.evaluate(&inputs(0.6), now), FrictionTier::Confirm);
        assert_eq!(engine.evaluate(&inputs(0.6), now), FrictionTier::Confirm);
        assert_eq!(engine.evaluate(&inputs(0.6), now), FrictionTier::None);
        assert_eq!(engine.evaluate(&inputs(1.0), now), FrictionTier::MandatoryHuman);
    }

    #[test]
    fn escalations_outside_the_window_are_forgotten() {
        let mut engine = FrictionEngine::new(
            FrictionWeights::default(),
            FrictionThresholds::default(),
            AntiFatigueConfig { window: Duration::from_millis(10), max_escalations: 1 },
        );
        let now = Instant::now();
        assert_eq!(engine.evaluate(&inputs(0.6), now), FrictionTier::Confirm);
        let later = now + Duration::from_millis(50);
        assert_eq!(engine.evaluate(&inputs(0.6), later), FrictionTier::Confirm);
    }
}
