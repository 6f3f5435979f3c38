//! Reputation & anti-gaming (spec.md §2's "Reputation & Anti-gaming"
//! component, folded into §4.10's peer-selection exclusions): an
//! outcome-weighted score per peer with exponential decay, plus an anomaly
//! detector that quarantines peers showing sybil-like or griefing behavior.
//! Shaped like the teacher's `CircuitBreaker` in
//! `crates/tools/src/circuit.rs` (consecutive-failure counters, cooldown
//! windows) generalized from a binary open/closed signal to a continuous
//! score.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use fulcrum_common::PeerId;
use parking_lot::RwLock;

#[derive(Debug, Clone, Copy)]
pub struct ReputationConfig {
    /// Score below which a peer is excluded from selection (spec.md §4.10).
    pub floor: f64,
    /// Multiplicative decay applied to the running score on each outcome,
    /// so recent behavior dominates stale history.
    pub decay: f64,
    /// Consecutive anomalous outcomes before quarantine.
    pub anomaly_threshold: u32,
    /// How long a quarantine lasts once triggered.
    pub quarantine_duration: Duration,
    pub initial_score: f64,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            floor: 0.2,
            decay: 0.9,
            anomaly_threshold: 3,
            quarantine_duration: Duration::from_secs(600),
            initial_score: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
    /// Behavior consistent with gaming the selection algorithm: claiming
    /// capabilities it doesn't have, fabricating checkpoint progress,
    /// collaborating with a sybil identity, etc.
    Anomalous,
}

#[derive(Debug, Clone, Default)]
struct PeerRecord {
    score: f64,
    consecutive_anomalies: u32,
    quarantined_until: Option<Instant>,
}

pub struct ReputationLedger {
    config: ReputationConfig,
    records: RwLock<HashMap<PeerId, PeerRecord>>,
}

impl ReputationLedger {
    pub fn new(config: ReputationConfig) -> Self {
        Self {
            config,
            records: RwLock::new(HashMap::new()),
        }
    }

    pub fn floor(&self) -> f64 {
        self.config.floor
    }

    fn record_mut<'a>(records: &'a mut HashMap<PeerId, PeerRecord>, config: &ReputationConfig, node_id: PeerId) -> &'a mut PeerRecord {
        records.entry(node_id).or_insert_with(|| PeerRecord {
            score: config.initial_score,
            consecutive_anomalies: 0,
            quarantined_until: None,
        })
    }

    /// Apply decay then blend in the new outcome: success nudges the score
    /// up toward 1.0, failure toward 0.0, anomalous toward 0.0 and also
    /// counts toward quarantine.
    pub fn record_outcome(&self, node_id: PeerId, outcome: Outcome) {
        let mut records = self.records.write();
        let record = Self::record_mut(&mut records, &self.config, node_id);

        let target = match outcome {
            Outcome::Success => 1.0,
            Outcome::Failure | Outcome::Anomalous => 0.0,
        };
        record.score = record.score * self.config.decay + target * (1.0 - self.config.decay);

        match outcome {
            Outcome::Anomalous => {
                record.consecutive_anomalies += 1;
                if record.consecutive_anomalies >= self.config.anomaly_threshold {
                    record.quarantined_until = Some(Instant::now() + self.config.quarantine_duration);
                }
            }
            _ => record.consecutive_anomalies = 0,
        }
    }

    pub fn score(&self, node_id: PeerId) -> f64 {
        self.records
            .read()
            .get(&node_id)
            .map(|r| r.score)
            .unwrap_or(self.config.initial_score)
    }

    pub fn is_quarantined(&self, node_id: PeerId) -> bool {
        let records = self.records.read();
        match records.get(&node_id).and_then(|r| r.quarantined_until) {
            Some(until) => Instant::now() < until,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_anomalies_trigger_quarantine() {
        let ledger = ReputationLedger::new(ReputationConfig { anomaly_threshold: 2, ..Default::default() });
        let node_id = PeerId::new();
        assert!(!ledger.is_quarantined(node_id));
        ledger.record_outcome(node_id, Outcome::Anomalous);
        assert!(!ledger.is_quarantined(node_id));
        ledger.record_outcome(node_id, Outcome::Anomalous);
        assert!(ledger.is_quarantined(node_id));
    }

    #[test]
    fn success_resets_anomaly_streak() {
        let ledger = ReputationLedger::new(ReputationConfig { anomaly_threshold: 2, ..Default::default() });
        let node_id = PeerId::new();
        ledger.record_outcome(node_id, Outcome::Anomalous);
        ledger.record_outcome(node_id, Outcome::Success);
        ledger.record_outcome(node_id, Outcome::Anomalous);
        assert!(!ledger.is_quarantined(node_id));
    }

    #[test]
    fn score_decays_toward_failure() {
        let ledger = ReputationLedger::new(ReputationConfig { initial_score: 0.5, decay: 0.5, ..Default::default() });
        let node_id = PeerId::new();
        ledger.record_outcome(node_id, Outcome::Failure);
        assert!(ledger.score(node_id) < 0.5);
    }
}
