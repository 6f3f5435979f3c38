//! Data model for the swarm delegation core (spec.md §3): peer identity and
//! status, delegation contracts, escrow accounts, and consensus rounds.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use fulcrum_common::{ConsensusRoundId, ContractId, PeerId, TaskId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerIdentity {
    pub node_id: PeerId,
    pub display_name: String,
    pub api_url: String,
    pub capabilities: Vec<String>,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerStatus {
    Active,
    Suspected,
    Unreachable,
    Left,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerEntry {
    pub identity: PeerIdentity,
    pub status: PeerStatus,
    pub last_heartbeat_at: DateTime<Utc>,
    pub last_latency_ms: u64,
    pub joined_at: DateTime<Utc>,
}

impl PeerEntry {
    pub fn new(identity: PeerIdentity, now: DateTime<Utc>) -> Self {
        Self {
            identity,
            status: PeerStatus::Active,
            last_heartbeat_at: now,
            last_latency_ms: 0,
            joined_at: now,
        }
    }
}

/// Failure-detector timeouts (spec.md §3 PeerEntry, §4.9).
#[derive(Debug, Clone, Copy)]
pub struct FailureDetectorConfig {
    pub suspect_timeout_ms: i64,
    pub unreachable_timeout_ms: i64,
    pub evict_timeout_ms: i64,
}

impl Default for FailureDetectorConfig {
    fn default() -> Self {
        Self {
            suspect_timeout_ms: 15_000,
            unreachable_timeout_ms: 45_000,
            evict_timeout_ms: 120_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    Pending,
    Active,
    Completed,
    Violated,
    Cancelled,
    Renegotiating,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceLevelObjective {
    pub max_cost_usd: Option<f64>,
    pub max_duration_ms: Option<u64>,
    pub required_capabilities: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringPolicy {
    pub checkpoint_interval_ms: u64,
    pub max_missed: u32,
}

/// One signed hop in a delegation's attestation chain: the originator's
/// initial contract signature, plus one entry per renegotiation/hop after
/// that, each verifiable independently of a shared secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestationHop {
    pub signer_node_id: PeerId,
    pub public_key: [u8; 32],
    pub signature: [u8; 64],
    pub payload_hash: String,
    pub signed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenegotiationRecord {
    pub at: DateTime<Utc>,
    pub reason: String,
    pub accepted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationContract {
    pub contract_id: ContractId,
    pub task_id: TaskId,
    pub originator_session_id: fulcrum_common::SessionId,
    pub peer_node_id: PeerId,
    pub permission_boundary: Vec<String>,
    pub slo: ServiceLevelObjective,
    pub monitoring: MonitoringPolicy,
    pub status: ContractStatus,
    pub created_at: DateTime<Utc>,
    pub renegotiation_history: Vec<RenegotiationRecord>,
    pub attestation_chain: Vec<AttestationHop>,
}

impl DelegationContract {
    /// Legal terminal-state transition rules (spec.md §3): once violated or
    /// completed, only staying put is legal; an active contract may move to
    /// renegotiating and back.
    pub fn can_transition_to(&self, next: ContractStatus) -> bool {
        use ContractStatus::*;
        match self.status {
            Completed | Violated => false,
            Cancelled => false,
            Active => matches!(next, Completed | Violated | Cancelled | Renegotiating),
            Renegotiating => matches!(next, Active | Completed | Violated | Cancelled),
            Pending => matches!(next, Active | Cancelled | Violated),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowTransaction {
    pub at: DateTime<Utc>,
    pub kind: EscrowTransactionKind,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscrowTransactionKind {
    Deposit,
    HoldBond,
    ReleaseBond,
    SlashBond,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowAccount {
    pub node_id: PeerId,
    pub balance: f64,
    pub held: f64,
    pub transactions: std::collections::VecDeque<EscrowTransaction>,
}

impl EscrowAccount {
    pub fn new(node_id: PeerId) -> Self {
        Self {
            node_id,
            balance: 0.0,
            held: 0.0,
            transactions: std::collections::VecDeque::new(),
        }
    }

    pub fn free_balance(&self) -> f64 {
        self.balance - self.held
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusStatus {
    Open,
    Evaluating,
    Agreed,
    Disagreed,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusVote {
    pub result_hash: String,
    pub outcome_score: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusOutcome {
    pub agreement_ratio: f64,
    pub majority_hash: String,
    pub dissenting_voters: Vec<PeerId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusRound {
    pub round_id: ConsensusRoundId,
    pub task_id: TaskId,
    pub required_voters: u32,
    pub required_agreement: f64,
    pub votes: HashMap<PeerId, ConsensusVote>,
    pub status: ConsensusStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub outcome: Option<ConsensusOutcome>,
}
