//! Schedule records and their trigger/job vocabulary (spec.md §4.8).

use chrono::{DateTime, Utc};
use fulcrum_common::{ScheduleId, SessionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// When a schedule fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduleTrigger {
    /// One-shot at a specific instant.
    At { at: DateTime<Utc> },
    /// Fires every `interval_ms`, anchored at `start_at` (defaults to
    /// creation time if absent).
    Every {
        interval_ms: u64,
        start_at: Option<DateTime<Utc>>,
    },
    /// Standard 5-field cron expression, evaluated in `timezone` (defaults
    /// to UTC).
    Cron {
        expression: String,
        timezone: Option<String>,
    },
}

impl ScheduleTrigger {
    /// Whether this trigger fires only once and retires after firing.
    pub fn is_one_shot(&self) -> bool {
        matches!(self, ScheduleTrigger::At { .. })
    }
}

/// The work a schedule performs when it fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobKind {
    CreateSession {
        task_text: String,
        mode: Option<String>,
        constraints: Option<Value>,
        agentic: Option<bool>,
    },
    EmitEvent {
        event_type: String,
        payload: Value,
        session_id: Option<SessionId>,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MissedFirePolicy {
    Skip,
    CatchupOne,
    CatchupAll,
}

impl Default for MissedFirePolicy {
    fn default() -> Self {
        MissedFirePolicy::Skip
    }
}

/// Hard cap on how many missed slots `catchup_all` will fire in one tick.
pub const MAX_CATCHUP_FIRES: u32 = 100;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Active,
    /// `at` triggers retire here after their single fire.
    Completed,
    /// `consecutive_failures` reached `max_failures`.
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub schedule_id: ScheduleId,
    pub trigger: ScheduleTrigger,
    pub job: JobKind,
    pub missed_fire_policy: MissedFirePolicy,
    pub next_run_at: DateTime<Utc>,
    pub consecutive_failures: u32,
    pub max_failures: u32,
    pub status: ScheduleStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Schedule {
    pub fn new(trigger: ScheduleTrigger, job: JobKind, missed_fire_policy: MissedFirePolicy, max_failures: u32) -> Self {
        let now = Utc::now();
        let next_run_at = match &trigger {
            ScheduleTrigger::At { at } => *at,
            ScheduleTrigger::Every { start_at, .. } => start_at.unwrap_or(now),
            ScheduleTrigger::Cron { .. } => now,
        };
        Self {
            schedule_id: ScheduleId::new(),
            trigger,
            job,
            missed_fire_policy,
            next_run_at,
            consecutive_failures: 0,
            max_failures,
            status: ScheduleStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }
}
