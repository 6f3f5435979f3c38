//! Stable error kinds shared across subsystems (spec.md §7). Names are
//! stable identifiers, not tied to any language's exception hierarchy;
//! every subsystem's own `thiserror` enum carries one of these in addition
//! to its domain-specific variants, so a host can dispatch on `kind()`
//! without matching every crate's error type.

use std::fmt;

/// Stable error kind, spec.md §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    // Validation
    InvalidInput,
    InvalidOutput,
    VaultSchemaInvalid,
    // Policy
    PolicyViolation,
    PermissionDenied,
    // Limits
    Timeout,
    DurationLimit,
    SessionLimitReached,
    CircuitBreakerOpen,
    // Infrastructure
    ToolNotFound,
    NoRuntime,
    ExecutionError,
    PluginLoadFailed,
    PluginTimeout,
    PluginHookFailed,
    PluginHookBlocked,
    ScheduleNotFound,
    ScheduleInvalid,
    SchedulerNotRunning,
    // Swarm
    SwarmNoPeers,
    SwarmContractViolated,
    SwarmAttestationInvalid,
    SwarmRedelegationExhausted,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::InvalidOutput => "INVALID_OUTPUT",
            ErrorKind::VaultSchemaInvalid => "VAULT_SCHEMA_INVALID",
            ErrorKind::PolicyViolation => "POLICY_VIOLATION",
            ErrorKind::PermissionDenied => "PERMISSION_DENIED",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::DurationLimit => "DURATION_LIMIT",
            ErrorKind::SessionLimitReached => "SESSION_LIMIT_REACHED",
            ErrorKind::CircuitBreakerOpen => "CIRCUIT_BREAKER_OPEN",
            ErrorKind::ToolNotFound => "TOOL_NOT_FOUND",
            ErrorKind::NoRuntime => "NO_RUNTIME",
            ErrorKind::ExecutionError => "EXECUTION_ERROR",
            ErrorKind::PluginLoadFailed => "PLUGIN_LOAD_FAILED",
            ErrorKind::PluginTimeout => "PLUGIN_TIMEOUT",
            ErrorKind::PluginHookFailed => "PLUGIN_HOOK_FAILED",
            ErrorKind::PluginHookBlocked => "PLUGIN_HOOK_BLOCKED",
            ErrorKind::ScheduleNotFound => "SCHEDULE_NOT_FOUND",
            ErrorKind::ScheduleInvalid => "SCHEDULE_INVALID",
            ErrorKind::SchedulerNotRunning => "SCHEDULER_NOT_RUNNING",
            ErrorKind::SwarmNoPeers => "SWARM_NO_PEERS",
            ErrorKind::SwarmContractViolated => "SWARM_CONTRACT_VIOLATED",
            ErrorKind::SwarmAttestationInvalid => "SWARM_ATTESTATION_INVALID",
            ErrorKind::SwarmRedelegationExhausted => "SWARM_REDELEGATION_EXHAUSTED",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A structured error carrying a stable [`ErrorKind`], a human-readable
/// message, and optional structured data — mirrors the
/// `StepResult.error {code, message, data}` shape in spec.md §3.
#[derive(Debug, Clone, thiserror::Error, serde::Serialize, serde::Deserialize)]
#[error("{kind}: {message}")]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RuntimeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}
