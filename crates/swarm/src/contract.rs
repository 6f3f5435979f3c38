//! Delegation contracts and attestation chains (spec.md §4.11). The
//! originator signs the contract with the session's HMAC secret; every hop
//! after that (renegotiation, re-delegation) appends an Ed25519-signed
//! attestation so a third party can verify the whole chain without sharing
//! that secret, reusing `fulcrum_common::crypto`'s helpers exactly as the
//! DCT module does (`crates/permission/src/dct.rs`).

use chrono::{DateTime, Utc};
use fulcrum_common::{
    canonical_sha256, hmac_sha256_hex, sha256_hex, to_canonical_bytes, verify_ed25519,
    verify_hmac_sha256_hex, ContractId, PeerId, SessionId, SigningIdentity, TaskId,
};
use serde::Serialize;

use crate::error::SwarmError;
use crate::types::{
    AttestationHop, ContractStatus, DelegationContract, MonitoringPolicy, RenegotiationRecord,
    ServiceLevelObjective,
};

#[derive(Serialize)]
struct ContractPayload<'a> {
    contract_id: ContractId,
    task_id: TaskId,
    originator_session_id: SessionId,
    peer_node_id: PeerId,
    permission_boundary: &'a [String],
}

/// The originator's initial HMAC signature over the contract body,
/// returned alongside the contract for attachment to the task request.
pub fn create(
    session_secret: &[u8],
    task_id: TaskId,
    originator_session_id: SessionId,
    peer_node_id: PeerId,
    permission_boundary: Vec<String>,
    slo: ServiceLevelObjective,
    monitoring: MonitoringPolicy,
    now: DateTime<Utc>,
) -> Result<(DelegationContract, String), SwarmError> {
    let contract_id = ContractId::new();
    let payload = ContractPayload {
        contract_id,
        task_id,
        originator_session_id,
        peer_node_id,
        permission_boundary: &permission_boundary,
    };
    let bytes = to_canonical_bytes(&payload).map_err(|e| SwarmError::AttestationInvalid(e.to_string()))?;
    let signature = hmac_sha256_hex(session_secret, &bytes)
        .map_err(|_| SwarmError::AttestationInvalid("signing failed".to_string()))?;

    let contract = DelegationContract {
        contract_id,
        task_id,
        originator_session_id,
        peer_node_id,
        permission_boundary,
        slo,
        monitoring,
        status: ContractStatus::Pending,
        created_at: now,
        renegotiation_history: Vec::new(),
        attestation_chain: Vec::new(),
    };
    Ok((contract, signature))
}

pub fn verify_originator_signature(
    session_secret: &[u8],
    contract: &DelegationContract,
    signature: &str,
) -> Result<(), SwarmError> {
    let payload = ContractPayload {
        contract_id: contract.contract_id,
        task_id: contract.task_id,
        originator_session_id: contract.originator_session_id,
        peer_node_id: contract.peer_node_id,
        permission_boundary: &contract.permission_boundary,
    };
    let bytes = to_canonical_bytes(&payload).map_err(|e| SwarmError::AttestationInvalid(e.to_string()))?;
    verify_hmac_sha256_hex(session_secret, &bytes, signature)
        .map_err(|_| SwarmError::AttestationInvalid("originator signature invalid".to_string()))
}

/// Append a new attestation hop, signing the contract's current state
/// (including the hop count so reordering is detectable).
pub fn append_hop(
    contract: &mut DelegationContract,
    identity: &SigningIdentity,
    signer_node_id: PeerId,
    now: DateTime<Utc>,
) -> Result<(), SwarmError> {
    let payload_hash =
        canonical_sha256(&(contract.contract_id, contract.attestation_chain.len()))
            .map_err(|e| SwarmError::AttestationInvalid(e.to_string()))?;
    let signature = identity.sign(payload_hash.as_bytes());
    contract.attestation_chain.push(AttestationHop {
        signer_node_id,
        public_key: identity.public_key_bytes(),
        signature,
        payload_hash,
        signed_at: now,
    });
    Ok(())
}

/// Re-derive and verify every hop's payload hash and signature in order.
/// A single broken hop invalidates the whole chain (spec.md §4.11: "every
/// hop's signature verifies").
pub fn verify_attestation_chain(contract: &DelegationContract) -> Result<(), SwarmError> {
    for (index, hop) in contract.attestation_chain.iter().enumerate() {
        let expected_hash = canonical_sha256(&(contract.contract_id, index))
            .map_err(|e| SwarmError::AttestationInvalid(e.to_string()))?;
        if expected_hash != hop.payload_hash {
            return Err(SwarmError::AttestationInvalid(format!(
                "hop {index} payload hash mismatch"
            )));
        }
        verify_ed25519(&hop.public_key, hop.payload_hash.as_bytes(), &hop.signature)
            .map_err(|_| SwarmError::AttestationInvalid(format!("hop {index} signature invalid")))?;
    }
    Ok(())
}

/// Apply a status transition, recording a renegotiation entry when resolving
/// out of `renegotiating`. Rejects transitions `DelegationContract` forbids
/// once terminal.
pub fn transition(
    contract: &mut DelegationContract,
    next: ContractStatus,
    reason: impl Into<String>,
    accepted: bool,
    now: DateTime<Utc>,
) -> Result<(), SwarmError> {
    if !contract.can_transition_to(next) {
        return Err(SwarmError::ContractViolated(
            contract.contract_id,
            format!("illegal transition {:?} -> {:?}", contract.status, next),
        ));
    }
    if matches!(contract.status, ContractStatus::Renegotiating) {
        contract.renegotiation_history.push(RenegotiationRecord {
            at: now,
            reason: reason.into(),
            accepted,
        });
    }
    contract.status = next;
    Ok(())
}

/// Begins renegotiation of an active contract (spec.md §3): moves it to
/// `renegotiating` pending the accept/reject decision. No history entry is
/// recorded yet, since nothing has been decided.
pub fn request_renegotiation(contract: &mut DelegationContract) -> Result<(), SwarmError> {
    if !contract.can_transition_to(ContractStatus::Renegotiating) {
        return Err(SwarmError::ContractViolated(
            contract.contract_id,
            format!("illegal transition {:?} -> Renegotiating", contract.status),
        ));
    }
    contract.status = ContractStatus::Renegotiating;
    Ok(())
}

/// Resolves a contract already in `renegotiating`: accepting applies the new
/// terms, rejecting leaves the contract active with no effect. Either way
/// the contract returns to `active` and a single history entry is recorded
/// (spec.md §3's "returns to active on accept or stays active with no
/// effect on reject").
pub fn resolve_renegotiation(
    contract: &mut DelegationContract,
    reason: impl Into<String>,
    accepted: bool,
    now: DateTime<Utc>,
) -> Result<(), SwarmError> {
    transition(contract, ContractStatus::Active, reason, accepted, now)
}

pub fn content_hash(contract: &DelegationContract) -> String {
    canonical_sha256(contract).unwrap_or_else(|_| sha256_hex(b""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn originator_signature_round_trips() {
        let secret = b"session-secret";
        let (contract, signature) = create(
            secret,
            TaskId::new(),
            SessionId::new(),
            PeerId::new(),
            vec!["fs:read:/tmp".to_string()],
            ServiceLevelObjective::default(),
            MonitoringPolicy { checkpoint_interval_ms: 5_000, max_missed: 3 },
            Utc::now(),
        )
        .unwrap();
        assert!(verify_originator_signature(secret, &contract, &signature).is_ok());
        assert!(verify_originator_signature(b"wrong-secret", &contract, &signature).is_err());
    }

    #[test]
    fn attestation_chain_detects_tampering() {
        let (mut contract, _) = create(
            b"secret",
            TaskId::new(),
            SessionId::new(),
            PeerId::new(),
            vec![],
            ServiceLevelObjective::default(),
            MonitoringPolicy { checkpoint_interval_ms: 5_000, max_missed: 3 },
            Utc::now(),
        )
        .unwrap();

        let mut rng = rand::rngs::OsRng;
        let identity = SigningIdentity::generate(&mut rng);
        append_hop(&mut contract, &identity, PeerId::new(), Utc::now()).unwrap();
        assert!(verify_attestation_chain(&contract).is_ok());

        contract.attestation_chain[0].payload_hash = "tampered".to_string();
        assert!(verify_attestation_chain(&contract).is_err());
    }

    #[test]
    fn terminal_contract_rejects_further_transitions() {
        let (mut contract, _) = create(
            b"secret",
            TaskId::new(),
            SessionId::new(),
            PeerId::new(),
            vec![],
            ServiceLevelObjective::default(),
            MonitoringPolicy { checkpoint_interval_ms: 5_000, max_missed: 3 },
            Utc::now(),
        )
        .unwrap();
        transition(&mut contract, ContractStatus::Active, "accepted", true, Utc::now()).unwrap();
        transition(&mut contract, ContractStatus::Completed, "done", true, Utc::now()).unwrap();
        assert!(transition(&mut contract, ContractStatus::Active, "re-open", true, Utc::now()).is_err());
    }

    fn active_contract() -> DelegationContract {
        let (mut contract, _) = create(
            b"secret",
            TaskId::new(),
            SessionId::new(),
            PeerId::new(),
            vec![],
            ServiceLevelObjective::default(),
            MonitoringPolicy { checkpoint_interval_ms: 5_000, max_missed: 3 },
            Utc::now(),
        )
        .unwrap();
        transition(&mut contract, ContractStatus::Active, "accepted", true, Utc::now()).unwrap();
        contract
    }

    #[test]
    fn rejected_renegotiation_leaves_contract_active_with_no_effect() {
        let mut contract = active_contract();
        request_renegotiation(&mut contract).unwrap();
        resolve_renegotiation(&mut contract, "budget too low", false, Utc::now()).unwrap();

        assert_eq!(contract.status, ContractStatus::Active);
        assert_eq!(contract.renegotiation_history.len(), 1);
        assert!(!contract.renegotiation_history[0].accepted);
    }

    #[test]
    fn accepted_renegotiation_returns_to_active() {
        let mut contract = active_contract();
        request_renegotiation(&mut contract).unwrap();
        resolve_renegotiation(&mut contract, "new terms agreed", true, Utc::now()).unwrap();

        assert_eq!(contract.status, ContractStatus::Active);
        assert_eq!(contract.renegotiation_history.len(), 1);
        assert!(contract.renegotiation_history[0].accepted);
    }

    #[test]
    fn renegotiation_on_pending_contract_is_rejected() {
        let (mut contract, _) = create(
            b"secret",
            TaskId::new(),
            SessionId::new(),
            PeerId::new(),
            vec![],
            ServiceLevelObjective::default(),
            MonitoringPolicy { checkpoint_interval_ms: 5_000, max_missed: 3 },
            Utc::now(),
        )
        .unwrap();
        assert!(request_renegotiation(&mut contract).is_err());
    }
}
