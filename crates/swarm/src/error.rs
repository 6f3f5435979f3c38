use fulcrum_common::{ContractId, PeerId, TaskId};

#[derive(Debug, thiserror::Error)]
pub enum SwarmError {
    #[error("no active peers available for delegation")]
    NoPeers,
    #[error("peer {0} is quarantined by the anomaly detector")]
    PeerQuarantined(PeerId),
    #[error("peer {0} is not known to the mesh")]
    UnknownPeer(PeerId),
    #[error("contract {0} violated: {1}")]
    ContractViolated(ContractId, String),
    #[error("attestation chain invalid: {0}")]
    AttestationInvalid(String),
    #[error("task {0} redelegation exhausted: {1} attempts at limit")]
    RedelegationExhausted(TaskId, u32),
    #[error("escrow account {0} has insufficient free balance for bond of {1}")]
    InsufficientBalance(PeerId, f64),
    #[error("escrow held amount exceeds balance for {0}")]
    EscrowInvariantViolated(PeerId),
    #[error("consensus round {0} parameters out of range: {1}")]
    InvalidConsensusParams(uuid::Uuid, String),
    #[error("liability firebreak halted delegation at depth {0}")]
    FirebreakHalt(u32),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("outbound url rejected by ssrf guard: {0}")]
    SsrfBlocked(String),
    #[error("request timed out after {0}ms")]
    Timeout(u64),
    #[error("peer responded with non-success status {0}")]
    PeerRejected(u16),
    #[error(transparent)]
    Journal(#[from] fulcrum_journal::JournalError),
    #[error(transparent)]
    Permission(#[from] fulcrum_permission::PermissionError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<&SwarmError> for fulcrum_common::ErrorKind {
    fn from(err: &SwarmError) -> Self {
        match err {
            SwarmError::NoPeers => fulcrum_common::ErrorKind::SwarmNoPeers,
            SwarmError::ContractViolated(..) => fulcrum_common::ErrorKind::SwarmContractViolated,
            SwarmError::AttestationInvalid(_) => fulcrum_common::ErrorKind::SwarmAttestationInvalid,
            SwarmError::RedelegationExhausted(..) => fulcrum_common::ErrorKind::SwarmRedelegationExhausted,
            SwarmError::Timeout(_) => fulcrum_common::ErrorKind::Timeout,
            _ => fulcrum_common::ErrorKind::ExecutionError,
        }
    }
}
