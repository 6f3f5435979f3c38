//! HMAC-SHA256 request signing/verification, the same `v0=` scheme
//! `channel-adapter`'s Slack and Mattermost adapters use to authenticate
//! inbound webhooks — reused here in both directions: outbound prompt
//! deliveries are signed so the relay's peer can trust them, and inbound
//! decision callbacks are verified the same way before a pending prompt is
//! ever resolved.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::RelayError;

type HmacSha256 = Hmac<Sha256>;

const MAX_TIMESTAMP_AGE_SECS: i64 = 300;

pub fn sign(secret: &str, timestamp: i64, body: &[u8]) -> String {
    let basestring = format!("v0:{timestamp}:{}", String::from_utf8_lossy(body));
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(basestring.as_bytes());
    format!("v0={}", hex::encode(mac.finalize().into_bytes()))
}

pub fn verify(secret: &str, timestamp: i64, body: &[u8], signature: &str) -> Result<(), RelayError> {
    let now = chrono::Utc::now().timestamp();
    if (now - timestamp).abs() > MAX_TIMESTAMP_AGE_SECS {
        return Err(RelayError::SignatureInvalid);
    }
    let expected = sign(secret, timestamp, body);
    if expected.as_bytes().len() != signature.as_bytes().len()
        || expected.as_bytes().ct_eq(signature.as_bytes()).unwrap_u8() != 1
    {
        return Err(RelayError::SignatureInvalid);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let now = chrono::Utc::now().timestamp();
        let sig = sign("secret", now, b"payload");
        assert!(verify("secret", now, b"payload", &sig).is_ok());
    }

    #[test]
    fn stale_timestamp_rejected() {
        let old = chrono::Utc::now().timestamp() - 10_000;
        let sig = sign("secret", old, b"payload");
        assert!(verify("secret", old, b"payload", &sig).is_err());
    }

    #[test]
    fn tampered_body_rejected() {
        let now = chrono::Utc::now().timestamp();
        let sig = sign("secret", now, b"payload");
        assert!(verify("secret", now, b"tampered", &sig).is_err());
    }
}
