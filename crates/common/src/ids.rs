//! Opaque identifier newtypes shared across the workspace.
//!
//! Every identifier in the data model (spec.md §3) is an opaque UUID encoded
//! as a lower-case string. Mirrors the `AgentId(pub Uuid)` pattern in the
//! teacher's `runtime/src/types/mod.rs`, generalized with a macro so every
//! subsystem gets the same `new`/`Display`/`FromStr`/serde behavior.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn nil() -> Self {
                Self(Uuid::nil())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0.hyphenated())
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }

        impl From<Uuid> for $name {
            fn from(u: Uuid) -> Self {
                Self(u)
            }
        }
    };
}

opaque_id!(
    /// Identifies a session from creation through a terminal state.
    SessionId
);
opaque_id!(
    /// Identifies one plan produced by the planner for a session.
    PlanId
);
opaque_id!(
    /// Identifies one step within a plan.
    StepId
);
opaque_id!(
    /// Identifies a single tool invocation request/response pair.
    ToolCallId
);
opaque_id!(
    /// Identifies a journal event.
    EventId
);
opaque_id!(
    /// Identifies a delegation capability token.
    DctId
);
opaque_id!(
    /// Identifies a peer node in the swarm mesh.
    PeerId
);
opaque_id!(
    /// Identifies a delegation contract between an originator and a peer.
    ContractId
);
opaque_id!(
    /// Identifies a swarm task (the unit of delegated work).
    TaskId
);
opaque_id!(
    /// Identifies a consensus verification round.
    ConsensusRoundId
);
opaque_id!(
    /// Identifies a scheduled job in the scheduler store.
    ScheduleId
);
opaque_id!(
    /// Identifies a request, for correlating logs/journals/traces.
    RequestId
);
