//! Shared primitives for the fulcrum workspace: opaque IDs, canonical JSON,
//! hashing, signing, a stable error taxonomy, timestamp formatting, and the
//! invisible-Unicode sanitizer used by the journal and the approval relay.

pub mod canonical;
pub mod crypto;
pub mod error;
pub mod hashing;
pub mod ids;
pub mod sanitize;
pub mod time;

pub use canonical::{to_canonical_bytes, to_canonical_string, CanonicalError};
pub use crypto::{hmac_sha256_hex, verify_ed25519, verify_hmac_sha256_hex, CryptoError, SigningIdentity};
pub use error::{ErrorKind, RuntimeError};
pub use hashing::{canonical_sha256, sha256_hex, ZERO_HASH};
pub use ids::{
    ConsensusRoundId, ContractId, DctId, EventId, PeerId, PlanId, RequestId, ScheduleId, SessionId,
    StepId, TaskId, ToolCallId,
};
pub use sanitize::{contains_invisible, strip_invisible};
pub use time::{now_ms, to_rfc3339_ms};
