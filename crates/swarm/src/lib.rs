//! Swarm delegation core (spec.md §4.9-§4.16): peer mesh, work distributor,
//! delegation contracts with attestation chains, task monitoring, the
//! optimization and redelegation loops, escrow and consensus, the liability
//! firebreak, the cognitive-friction engine, and reputation/anti-gaming.
//!
//! Grounded on `TheFermiSea-beefcake-swarm`'s multi-agent coordination
//! crates for texture (circuit breakers, consensus evaluation, friction
//! scoring) but built against this crate's own data model rather than
//! ported from that pack's domain.

pub mod consensus;
pub mod contract;
pub mod distributor;
pub mod error;
pub mod escrow;
pub mod firebreak;
pub mod friction;
pub mod mesh;
pub mod monitor;
pub mod optimization;
pub mod redelegation;
pub mod reputation;
pub mod server;
pub mod transport;
pub mod types;

pub use consensus::ConsensusRegistry;
pub use contract::{append_hop, content_hash, create as create_contract, transition, verify_attestation_chain, verify_originator_signature};
pub use distributor::{CandidateMetrics, SelectionWeights, WorkDistributor};
pub use error::SwarmError;
pub use escrow::EscrowLedger;
pub use firebreak::{FirebreakConfig, FirebreakDecision};
pub use friction::{FrictionEngine, FrictionInputs, FrictionTier, FrictionWeights};
pub use mesh::PeerTable;
pub use monitor::{CheckpointsMissedHandler, TaskMonitor, TaskMonitorConfig};
pub use optimization::{OptimizationConfig, OptimizationDecision, OptimizationLoop};
pub use redelegation::{RedelegationCandidate, RedelegationConfig, RedelegationMonitor, TrackedDelegation};
pub use reputation::{Outcome, ReputationLedger};
pub use server::{router, SwarmState};
pub use transport::{Transport, TransportConfig};
pub use types::*;
