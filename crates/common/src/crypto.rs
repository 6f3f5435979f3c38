//! HMAC-SHA256 and Ed25519 signing helpers.
//!
//! Grounded on the teacher's `ed25519-dalek`/`aes-gcm` dependency set at the
//! workspace root and on `crates/approval-relay`'s `hmac`/`sha2`/`subtle`
//! dependencies (a relay that verifies inbound webhook signatures needs
//! constant-time comparison). DCT signatures (spec.md §3) and delegation
//! contract / attestation-chain signatures (§4.11) both build on this
//! module: DCTs use HMAC with a process-configured secret, attestation hops
//! use Ed25519 keypairs so a third party can verify without sharing a
//! secret.

use ed25519_dalek::{Keypair, PublicKey, Signature, Signer, Verifier};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid HMAC key length")]
    InvalidKeyLength,
    #[error("signature verification failed")]
    VerificationFailed,
    #[error("malformed signature encoding: {0}")]
    Malformed(String),
}

/// Compute HMAC-SHA256 over `message` using `secret`, hex-encoded.
///
/// Used for DCT signatures (`HMAC-SHA256 over canonical {dct_id, child_id,
/// scopes}`, spec.md §3) and delegation contract signatures (§4.11).
pub fn hmac_sha256_hex(secret: &[u8], message: &[u8]) -> Result<String, CryptoError> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| CryptoError::InvalidKeyLength)?;
    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify an HMAC-SHA256 signature in constant time.
pub fn verify_hmac_sha256_hex(
    secret: &[u8],
    message: &[u8],
    expected_hex: &str,
) -> Result<(), CryptoError> {
    let computed = hmac_sha256_hex(secret, message)?;
    let computed_bytes = computed.as_bytes();
    let expected_bytes = expected_hex.as_bytes();
    if computed_bytes.len() != expected_bytes.len()
        || computed_bytes.ct_eq(expected_bytes).unwrap_u8() != 1
    {
        return Err(CryptoError::VerificationFailed);
    }
    Ok(())
}

/// An Ed25519 signing identity for one hop of an attestation chain.
pub struct SigningIdentity {
    keypair: Keypair,
}

impl SigningIdentity {
    pub fn generate<R: rand::RngCore + rand::CryptoRng>(rng: &mut R) -> Self {
        Self {
            keypair: Keypair::generate(rng),
        }
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.keypair.public.to_bytes()
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.keypair.sign(message).to_bytes()
    }
}

/// Verify a detached Ed25519 signature against a raw public key.
pub fn verify_ed25519(
    public_key_bytes: &[u8; 32],
    message: &[u8],
    signature_bytes: &[u8],
) -> Result<(), CryptoError> {
    let public_key =
        PublicKey::from_bytes(public_key_bytes).map_err(|e| CryptoError::Malformed(e.to_string()))?;
    let signature =
        Signature::from_bytes(signature_bytes).map_err(|e| CryptoError::Malformed(e.to_string()))?;
    public_key
        .verify(message, &signature)
        .map_err(|_| CryptoError::VerificationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_round_trips() {
        let secret = b"process-secret";
        let sig = hmac_sha256_hex(secret, b"payload").unwrap();
        assert!(verify_hmac_sha256_hex(secret, b"payload", &sig).is_ok());
        assert!(verify_hmac_sha256_hex(secret, b"tampered", &sig).is_err());
    }

    #[test]
    fn ed25519_round_trips() {
        let mut rng = rand::rngs::OsRng;
        let identity = SigningIdentity::generate(&mut rng);
        let sig = identity.sign(b"hop-1");
        let pub_bytes = identity.public_key_bytes();
        assert!(verify_ed25519(&pub_bytes, b"hop-1", &sig).is_ok());
        assert!(verify_ed25519(&pub_bytes, b"hop-2", &sig).is_err());
    }
}
