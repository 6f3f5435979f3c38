//! Grant records, the constraints attached to them, and the decision shapes
//! an approval callback may return (spec.md §4.4).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How long a grant survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ttl {
    Step,
    Session,
    /// Survives step boundaries within the session; still cleared on
    /// `clear_session` (see spec.md §4.4's open question on `global`).
    Global,
}

impl Ttl {
    /// `once → step`, `session → session`, `always → global`.
    pub fn from_legacy(name: &str) -> Option<Self> {
        match name {
            "allow_once" => Some(Ttl::Step),
            "allow_session" => Some(Ttl::Session),
            "allow_always" => Some(Ttl::Global),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Constraints {
    pub readonly_paths: Option<Vec<String>>,
    pub writable_paths: Option<Vec<String>>,
    pub max_duration_ms: Option<u64>,
    pub input_overrides: Option<Value>,
    pub output_redact_fields: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alternative {
    pub tool_name: String,
    pub suggested_input: Option<Value>,
}

/// What a grant actually permits, beyond the bare scope match.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GrantEffect {
    Allow,
    AllowConstrained { constraints: Constraints },
    AllowObserved { telemetry_level: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub scope: String,
    pub effect: GrantEffect,
    pub granted_by: String,
    pub granted_at: DateTime<Utc>,
    pub ttl: Ttl,
}

/// The legacy, bare-string decision shapes an approval callback may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegacyDecision {
    AllowOnce,
    AllowSession,
    AllowAlways,
    Deny,
}

impl LegacyDecision {
    fn as_str(&self) -> &'static str {
        match self {
            LegacyDecision::AllowOnce => "allow_once",
            LegacyDecision::AllowSession => "allow_session",
            LegacyDecision::AllowAlways => "allow_always",
            LegacyDecision::Deny => "deny",
        }
    }
}

/// The structured decision shapes (spec.md §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StructuredDecision {
    AllowConstrained {
        scope: String,
        constraints: Constraints,
    },
    AllowObserved {
        scope: String,
        telemetry_level: String,
    },
    AllowRateLimited {
        scope: String,
        max_calls_per_window: u32,
        window_ms: u64,
    },
    AllowTimeBounded {
        scope: String,
        cron_expression: String,
        window_duration_ms: u64,
        timezone: Option<String>,
    },
    DenyWithAlternative {
        reason: String,
        alternative: Alternative,
    },
}

/// Either shape an approval callback may hand back. `serde(untagged)` tries
/// the bare-string legacy form first, then the tagged structured form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApprovalDecision {
    Legacy(LegacyDecision),
    Structured(StructuredDecision),
}

impl ApprovalDecision {
    pub fn granted_scope(&self, fallback: &str) -> String {
        match self {
            ApprovalDecision::Legacy(_) => fallback.to_string(),
            ApprovalDecision::Structured(StructuredDecision::AllowConstrained { scope, .. })
            | ApprovalDecision::Structured(StructuredDecision::AllowObserved { scope, .. })
            | ApprovalDecision::Structured(StructuredDecision::AllowRateLimited { scope, .. })
            | ApprovalDecision::Structured(StructuredDecision::AllowTimeBounded { scope, .. }) => {
                scope.clone()
            }
            ApprovalDecision::Structured(StructuredDecision::DenyWithAlternative { .. }) => {
                fallback.to_string()
            }
        }
    }

    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            ApprovalDecision::Legacy(LegacyDecision::Deny)
                | ApprovalDecision::Structured(StructuredDecision::DenyWithAlternative { .. })
        )
    }

    pub fn decision_type_name(&self) -> &str {
        match self {
            ApprovalDecision::Legacy(d) => d.as_str(),
            ApprovalDecision::Structured(StructuredDecision::AllowConstrained { .. }) => {
                "allow_constrained"
            }
            ApprovalDecision::Structured(StructuredDecision::AllowObserved { .. }) => {
                "allow_observed"
            }
            ApprovalDecision::Structured(StructuredDecision::AllowRateLimited { .. }) => {
                "allow_rate_limited"
            }
            ApprovalDecision::Structured(StructuredDecision::AllowTimeBounded { .. }) => {
                "allow_time_bounded"
            }
            ApprovalDecision::Structured(StructuredDecision::DenyWithAlternative { .. }) => {
                "deny_with_alternative"
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateBucket {
    pub tokens: u32,
    pub window_start: DateTime<Utc>,
    pub max_calls: u32,
    pub window_ms: u64,
}

impl RateBucket {
    pub fn new(max_calls: u32, window_ms: u64, now: DateTime<Utc>) -> Self {
        Self {
            tokens: max_calls,
            window_start: now,
            max_calls,
            window_ms,
        }
    }

    /// Refill if the window has rolled over, then try to consume one token.
    pub fn try_consume(&mut self, now: DateTime<Utc>) -> bool {
        let elapsed = (now - self.window_start).num_milliseconds().max(0) as u64;
        if elapsed >= self.window_ms {
            self.tokens = self.max_calls;
            self.window_start = now;
        }
        if self.tokens == 0 {
            return false;
        }
        self.tokens -= 1;
        true
    }
}

#[derive(Debug, Clone)]
pub struct TimeBound {
    pub cron_expression: String,
    pub window_duration_ms: u64,
    pub timezone: Option<String>,
    pub prev_cron_fire: Option<DateTime<Utc>>,
}
