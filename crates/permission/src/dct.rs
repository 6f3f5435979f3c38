//! Delegation Capability Tokens (spec.md §3, §4.4): signed, attenuated scope
//! grants handed from a parent session to a child session, most commonly a
//! swarm delegation. Signing reuses the HMAC helpers in `fulcrum_common`
//! that the approval relay also uses for webhook signatures.

use chrono::{DateTime, Duration, Utc};
use fulcrum_common::{hmac_sha256_hex, to_canonical_bytes, verify_hmac_sha256_hex, DctId, SessionId};
use serde::{Deserialize, Serialize};

use crate::error::PermissionError;
use crate::scope::{scope_matches_grant, Scope};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationCapabilityToken {
    pub dct_id: DctId,
    pub parent_session_id: SessionId,
    pub child_session_id: SessionId,
    pub allowed_scopes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub signature: String,
}

#[derive(Serialize)]
struct SignedPayload<'a> {
    dct_id: DctId,
    child_id: SessionId,
    scopes: &'a [String],
}

fn signature_for(secret: &[u8], dct_id: DctId, child_id: SessionId, scopes: &[String]) -> String {
    let payload = SignedPayload {
        dct_id,
        child_id,
        scopes,
    };
    // `to_canonical_bytes` only fails if serialization itself fails, which
    // can't happen for this payload shape; fall back to an empty signature
    // rather than panic.
    to_canonical_bytes(&payload)
        .ok()
        .and_then(|bytes| hmac_sha256_hex(secret, &bytes).ok())
        .unwrap_or_default()
}

/// Issue a fresh DCT for `child_session_id`, attenuated against
/// `parent_allowed_scopes` — the resulting `allowed_scopes` is always a
/// subset of what the parent itself holds.
pub fn issue(
    secret: &[u8],
    parent_session_id: SessionId,
    child_session_id: SessionId,
    parent_allowed_scopes: &[String],
    requested_scopes: &[String],
    ttl: Duration,
) -> Result<DelegationCapabilityToken, PermissionError> {
    let attenuated = attenuate(parent_allowed_scopes, requested_scopes)?;
    let dct_id = DctId::new();
    let created_at = Utc::now();
    let signature = signature_for(secret, dct_id, child_session_id, &attenuated);

    Ok(DelegationCapabilityToken {
        dct_id,
        parent_session_id,
        child_session_id,
        allowed_scopes: attenuated,
        created_at,
        expires_at: created_at + ttl,
        signature,
    })
}

/// Ensure every scope in `requested` is covered by at least one scope in
/// `parent_allowed` under [`scope_matches_grant`]. Monotonic attenuation:
/// a derived token's scopes may only narrow, never widen, the parent's.
pub fn attenuate(parent_allowed: &[String], requested: &[String]) -> Result<Vec<String>, PermissionError> {
    let parent_scopes: Vec<Scope> = parent_allowed
        .iter()
        .map(|s| Scope::parse_grant(s))
        .collect::<Result<_, _>>()?;

    let mut attenuated = Vec::with_capacity(requested.len());
    for raw in requested {
        let requested_scope = Scope::parse(raw)?;
        let covered = parent_scopes
            .iter()
            .any(|parent| scope_matches_grant(parent, &requested_scope));
        if !covered {
            return Err(PermissionError::AttenuationViolation(raw.clone()));
        }
        attenuated.push(raw.clone());
    }
    Ok(attenuated)
}

pub fn verify(secret: &[u8], token: &DelegationCapabilityToken) -> Result<(), PermissionError> {
    if Utc::now() > token.expires_at {
        return Err(PermissionError::DctExpired(token.expires_at));
    }
    let payload = SignedPayload {
        dct_id: token.dct_id,
        child_id: token.child_session_id,
        scopes: &token.allowed_scopes,
    };
    let bytes = to_canonical_bytes(&payload).map_err(|_| PermissionError::InvalidDctSignature)?;
    verify_hmac_sha256_hex(secret, &bytes, &token.signature)
        .map_err(|_| PermissionError::InvalidDctSignature)
}

/// `true` iff `requested_scope` falls inside the token's allowed set.
pub fn covers(token: &DelegationCapabilityToken, requested_scope: &str) -> bool {
    let Ok(requested) = Scope::parse(requested_scope) else {
        return false;
    };
    token.allowed_scopes.iter().any(|raw| {
        Scope::parse_grant(raw)
            .map(|grant| scope_matches_grant(&grant, &requested))
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attenuation_rejects_scope_outside_parent() {
        let parent = vec!["fs:read:/tmp".to_string()];
        let requested = vec!["fs:write:/tmp".to_string()];
        let err = attenuate(&parent, &requested).unwrap_err();
        assert!(matches!(err, PermissionError::AttenuationViolation(_)));
    }

    #[test]
    fn issued_token_round_trips_through_verify() {
        let secret = b"test-secret";
        let parent_scopes = vec!["fs:*:*".to_string()];
        let token = issue(
            secret,
            SessionId::new(),
            SessionId::new(),
            &parent_scopes,
            &["fs:read:/tmp".to_string()],
            Duration::minutes(5),
        )
        .unwrap();

        verify(secret, &token).unwrap();
        assert!(covers(&token, "fs:read:/tmp"));
        assert!(!covers(&token, "net:connect:example.com"));
    }

    #[test]
    fn tampered_scopes_fail_verification() {
        let secret = b"test-secret";
        let mut token = issue(
            secret,
            SessionId::new(),
            SessionId::new(),
            &["fs:*:*".to_string()],
            &["fs:read:/tmp".to_string()],
            Duration::minutes(5),
        )
        .unwrap();
        token.allowed_scopes.push("fs:write:/etc/shadow".to_string());
        let err = verify(secret, &token).unwrap_err();
        assert!(matches!(err, PermissionError::InvalidDctSignature));
    }
}
