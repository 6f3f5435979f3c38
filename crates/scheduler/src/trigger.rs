//! Next-fire computation for each trigger kind, and the missed-fire policy
//! that turns "next_run_at is in the past" into a fire count (spec.md
//! §4.8). Kept free of `Schedule`/store concerns so it can be unit tested
//! in isolation.

use chrono::{DateTime, Utc};
use cron::Schedule as CronSchedule;
use std::str::FromStr;

use crate::error::SchedulerError;
use crate::types::{MissedFirePolicy, ScheduleTrigger, MAX_CATCHUP_FIRES};

/// Advance `next_run_at` past `now`, returning the new `next_run_at` and how
/// many times the trigger should fire on this tick.
///
/// A single elapsed slot (the ordinary on-time case) always fires once,
/// regardless of policy. The missed-fire policy only decides what happens
/// when MORE than one slot has elapsed since the last tick (a clock jump or
/// a process outage): `skip` drops the backlog and fires 0 times, merely
/// resyncing `next_run_at`; `catchup_one` collapses the whole backlog into a
/// single fire; `catchup_all` fires once per missed slot, capped at
/// [`MAX_CATCHUP_FIRES`].
pub fn advance(trigger: &ScheduleTrigger, next_run_at: DateTime<Utc>, now: DateTime<Utc>, policy: MissedFirePolicy) -> Result<(DateTime<Utc>, u32), SchedulerError> {
    if next_run_at > now {
        return Ok((next_run_at, 0));
    }

    let mut elapsed_slots = 0u32;
    let mut cursor = next_run_at;
    loop {
        if cursor > now || elapsed_slots >= MAX_CATCHUP_FIRES {
            break;
        }
        elapsed_slots += 1;
        cursor = next_fire_after(trigger, cursor)?;
        if matches!(trigger, ScheduleTrigger::At { .. }) {
            break;
        }
    }

    let fires = if elapsed_slots <= 1 {
        elapsed_slots
    } else {
        match policy {
            MissedFirePolicy::Skip => 0,
            MissedFirePolicy::CatchupOne => 1,
            MissedFirePolicy::CatchupAll => elapsed_slots,
        }
    };

    let new_next_run_at = if matches!(trigger, ScheduleTrigger::At { .. }) {
        cursor
    } else if elapsed_slots <= 1 {
        cursor
    } else {
        match policy {
            MissedFirePolicy::CatchupAll => cursor,
            MissedFirePolicy::Skip | MissedFirePolicy::CatchupOne => next_fire_strictly_after(trigger, now)?,
        }
    };

    Ok((new_next_run_at, fires))
}

fn next_fire_after(trigger: &ScheduleTrigger, from: DateTime<Utc>) -> Result<DateTime<Utc>, SchedulerError> {
    match trigger {
        ScheduleTrigger::At { at } => Ok(*at + chrono::Duration::milliseconds(1)),
        ScheduleTrigger::Every { interval_ms, .. } => Ok(from + chrono::Duration::milliseconds(*interval_ms as i64)),
        ScheduleTrigger::Cron { expression, .. } => {
            let schedule = parse_cron(expression)?;
            schedule
                .after(&from)
                .next()
                .ok_or_else(|| SchedulerError::InvalidCron(expression.clone()))
        }
    }
}

/// The first fire strictly after `now`, used to retarget `skip`/`catchup_one`
/// schedules so a long outage doesn't leave a pile of missed slots behind.
fn next_fire_strictly_after(trigger: &ScheduleTrigger, now: DateTime<Utc>) -> Result<DateTime<Utc>, SchedulerError> {
    match trigger {
        ScheduleTrigger::At { at } => Ok(*at),
        ScheduleTrigger::Every { interval_ms, .. } => {
            let interval = (*interval_ms).max(1) as i64;
            let delta = chrono::Duration::milliseconds(interval);
            let mut next = now;
            // single jump plus one interval keeps this O(1) instead of
            // stepping through every missed slot.
            next += delta;
            Ok(next)
        }
        ScheduleTrigger::Cron { expression, .. } => {
            let schedule = parse_cron(expression)?;
            schedule
                .after(&now)
                .next()
                .ok_or_else(|| SchedulerError::InvalidCron(expression.clone()))
        }
    }
}

fn parse_cron(expression: &str) -> Result<CronSchedule, SchedulerError> {
    CronSchedule::from_str(expression).map_err(|e| SchedulerError::InvalidCron(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn every_trigger_fires_once_on_time() {
        let trigger = ScheduleTrigger::Every { interval_ms: 1000, start_at: None };
        let now = Utc::now();
        let next_run_at = now - Duration::milliseconds(10);
        let (new_next, fires) = advance(&trigger, next_run_at, now, MissedFirePolicy::Skip).unwrap();
        assert_eq!(fires, 1);
        assert!(new_next > now);
    }

    #[test]
    fn catchup_all_fires_every_missed_slot() {
        let trigger = ScheduleTrigger::Every { interval_ms: 1000, start_at: None };
        let now = Utc::now();
        let next_run_at = now - Duration::milliseconds(5500);
        let (_new_next, fires) = advance(&trigger, next_run_at, now, MissedFirePolicy::CatchupAll).unwrap();
        assert_eq!(fires, 6);
    }

    #[test]
    fn catchup_one_fires_exactly_once_regardless_of_backlog() {
        let trigger = ScheduleTrigger::Every { interval_ms: 1000, start_at: None };
        let now = Utc::now();
        let next_run_at = now - Duration::milliseconds(9000);
        let (_new_next, fires) = advance(&trigger, next_run_at, now, MissedFirePolicy::CatchupOne).unwrap();
        assert_eq!(fires, 1);
    }

    #[test]
    fn at_trigger_fires_once_then_never_again() {
        let trigger = ScheduleTrigger::At { at: Utc::now() - Duration::seconds(5) };
        let now = Utc::now();
        let (_new_next, fires) = advance(&trigger, trigger_at(&trigger), now, MissedFirePolicy::CatchupAll).unwrap();
        assert_eq!(fires, 1);
    }

    fn trigger_at(trigger: &ScheduleTrigger) -> DateTime<Utc> {
        match trigger {
            ScheduleTrigger::At { at } => *at,
            _ => unreachable!(),
        }
    }

    #[test]
    fn catchup_capped_at_max_fires() {
        let trigger = ScheduleTrigger::Every { interval_ms: 1, start_at: None };
        let now = Utc::now();
        let next_run_at = now - Duration::milliseconds(10_000);
        let (_new_next, fires) = advance(&trigger, next_run_at, now, MissedFirePolicy::CatchupAll).unwrap();
        assert_eq!(fires, MAX_CATCHUP_FIRES);
    }
}
