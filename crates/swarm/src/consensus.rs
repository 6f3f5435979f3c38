//! Consensus rounds (spec.md §4.14): N peers vote a result hash for the same
//! task; once enough votes are in, the round evaluates majority agreement.
//! Shaped after the teacher's debate/consensus evaluation loop in the
//! reference swarm pack (stalled-round sweeping, quorum-triggered
//! evaluation) but built directly against this crate's own `ConsensusRound`
//! type rather than ported line-for-line.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use fulcrum_common::{ConsensusRoundId, PeerId, TaskId};

use crate::error::SwarmError;
use crate::types::{ConsensusOutcome, ConsensusRound, ConsensusStatus, ConsensusVote};

pub struct ConsensusRegistry {
    rounds: HashMap<ConsensusRoundId, ConsensusRound>,
}

impl ConsensusRegistry {
    pub fn new() -> Self {
        Self { rounds: HashMap::new() }
    }

    pub fn open(
        &mut self,
        task_id: TaskId,
        required_voters: u32,
        required_agreement: f64,
        ttl_ms: i64,
        now: DateTime<Utc>,
    ) -> Result<ConsensusRoundId, SwarmError> {
        let round_id = ConsensusRoundId::new();
        let required_voters = required_voters.clamp(1, 100);
        if !(0.0..=1.0).contains(&required_agreement) {
            return Err(SwarmError::InvalidConsensusParams(
                round_id.0,
                format!("required_agreement {required_agreement} out of [0,1]"),
            ));
        }

        self.rounds.insert(
            round_id,
            ConsensusRound {
                round_id,
                task_id,
                required_voters,
                required_agreement,
                votes: HashMap::new(),
                status: ConsensusStatus::Open,
                created_at: now,
                expires_at: now + chrono::Duration::milliseconds(ttl_ms),
                outcome: None,
            },
        );
        Ok(round_id)
    }

    pub fn get(&self, round_id: ConsensusRoundId) -> Option<&ConsensusRound> {
        self.rounds.get(&round_id)
    }

    /// Records a vote and auto-evaluates once `votes.len() >= required_voters`.
    pub fn cast_vote(
        &mut self,
        round_id: ConsensusRoundId,
        voter: PeerId,
        result_hash: String,
        outcome_score: f64,
        now: DateTime<Utc>,
    ) -> Result<&ConsensusRound, SwarmError> {
        let round = self
            .rounds
            .get_mut(&round_id)
            .ok_or_else(|| SwarmError::InvalidConsensusParams(round_id.0, "unknown round".to_string()))?;

        if round.status != ConsensusStatus::Open {
            return Err(SwarmError::InvalidConsensusParams(round_id.0, "round already closed".to_string()));
        }
        if now >= round.expires_at {
            round.status = ConsensusStatus::Expired;
            return Ok(round);
        }

        round.votes.insert(voter, ConsensusVote { result_hash, outcome_score, timestamp: now });

        if round.votes.len() as u32 >= round.required_voters {
            evaluate(round);
        }
        Ok(round)
    }

    /// Sweeps every still-open round past its expiry into `expired`.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> Vec<ConsensusRoundId> {
        let mut expired = Vec::new();
        for round in self.rounds.values_mut() {
            if round.status == ConsensusStatus::Open && now >= round.expires_at {
                round.status = ConsensusStatus::Expired;
                expired.push(round.round_id);
            }
        }
        expired
    }

    /// Drops terminal rounds older than twice their own TTL window, bounding
    /// memory use the way the redelegation monitor bounds its task table.
    pub fn gc(&mut self, now: DateTime<Utc>) {
        self.rounds.retain(|_, round| {
            if matches!(round.status, ConsensusStatus::Agreed | ConsensusStatus::Disagreed | ConsensusStatus::Expired) {
                let ttl = round.expires_at - round.created_at;
                now < round.expires_at + ttl
            } else {
                true
            }
        });
    }
}

impl Default for ConsensusRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Groups votes by result hash; the largest group's size over total votes is
/// the agreement ratio. Agreed if that ratio meets `required_agreement`.
fn evaluate(round: &mut ConsensusRound) {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for vote in round.votes.values() {
        *counts.entry(vote.result_hash.as_str()).or_insert(0) += 1;
    }

    let total = round.votes.len() as f64;
    let (majority_hash, majority_count) = counts
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map(|(hash, count)| (hash.to_string(), count))
        .unwrap_or_default();

    let agreement_ratio = if total > 0.0 { majority_count as f64 / total } else { 0.0 };
    let dissenting_voters = round
        .votes
        .iter()
        .filter(|(_, vote)| vote.result_hash != majority_hash)
        .map(|(voter, _)| *voter)
        .collect();

    round.status = if agreement_ratio >= round.required_agreement {
        ConsensusStatus::Agreed
    } else {
        ConsensusStatus::Disagreed
    };
    round.outcome = Some(ConsensusOutcome { agreement_ratio, majority_hash, dissenting_voters });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_once_required_voters_reached() {
        let mut registry = ConsensusRegistry::new();
        let now = Utc::now();
        let round_id = registry.open(TaskId::new(), 2, 0.5, 60_000, now).unwrap();

        registry.cast_vote(round_id, PeerId::new(), "hash-a".to_string(), 1.0, now).unwrap();
        let round = registry.get(round_id).unwrap();
        assert_eq!(round.status, ConsensusStatus::Open);

        registry.cast_vote(round_id, PeerId::new(), "hash-a".to_string(), 1.0, now).unwrap();
        let round = registry.get(round_id).unwrap();
        assert_eq!(round.status, ConsensusStatus::Agreed);
        assert_eq!(round.outcome.as_ref().unwrap().agreement_ratio, 1.0);
    }

    #[test]
    fn disagreement_below_required_ratio() {
        let mut registry = ConsensusRegistry::new();
        let now = Utc::now();
        let round_id = registry.open(TaskId::new(), 3, 0.9, 60_000, now).unwrap();

        registry.cast_vote(round_id, PeerId::new(), "hash-a".to_string(), 1.0, now).unwrap();
        registry.cast_vote(round_id, PeerId::new(), "hash-a".to_string(), 1.0, now).unwrap();
        registry.cast_vote(round_id, PeerId::new(), "hash-b".to_string(), 1.0, now).unwrap();

        let round = registry.get(round_id).unwrap();
        assert_eq!(round.status, ConsensusStatus::Disagreed);
        assert_eq!(round.outcome.as_ref().unwrap().dissenting_voters.len(), 1);
    }

    #[test]
    fn voting_past_expiry_closes_the_round() {
        let mut registry = ConsensusRegistry::new();
        let now = Utc::now();
        let round_id = registry.open(TaskId::new(), 2, 0.5, 1_000, now).unwrap();

        let later = now + chrono::Duration::milliseconds(2_000);
        registry.cast_vote(round_id, PeerId::new(), "hash-a".to_string(), 1.0, later).unwrap();
        assert_eq!(registry.get(round_id).unwrap().status, ConsensusStatus::Expired);
    }

    #[test]
    fn required_voters_is_clamped_into_range() {
        let mut registry = ConsensusRegistry::new();
        let round_id = registry.open(TaskId::new(), 0, 0.5, 60_000, Utc::now()).unwrap();
        assert_eq!(registry.get(round_id).unwrap().required_voters, 1);
    }
}
