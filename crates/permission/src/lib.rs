//! Permission & Policy Engine (spec.md §4.4, §4.5): per-session scope
//! grants with wildcard matching, rate-limit and time-bound constraints,
//! delegation capability tokens, a session-serialized approval prompt
//! lock, and the tool-side path/command/URL allow-list checks.

pub mod cache;
pub mod dct;
pub mod engine;
pub mod error;
pub mod grant;
pub mod policy;
pub mod scope;

pub use dct::{attenuate, covers, issue as issue_dct, verify as verify_dct, DelegationCapabilityToken};
pub use engine::{
    ApprovalChannel, ApprovalPromptRequest, DefaultPermissionEngine, PermissionCheckRequest,
    PermissionCheckResult, RequiredPermission,
};
pub use error::{PermissionError, PolicyError};
pub use grant::{
    Alternative, ApprovalDecision, Constraints, GrantEffect, LegacyDecision, PermissionGrant,
    RateBucket, StructuredDecision, TimeBound, Ttl,
};
pub use policy::{PolicyEnforcer, PolicyProfile};
pub use scope::{scope_matches_grant, Scope};
