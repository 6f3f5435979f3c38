//! `fulcrum schedule` — manage the durable schedule store (spec.md §4.8)
//! that a running `fulcrum up` ticks against. Edits the JSON-lines file
//! directly rather than going through a running process's in-memory
//! `SchedulerEngine`, the way `fulcrum journal` reads the log straight off
//! disk; a running `up` picks up additions on its next save/reload cycle.

use clap::ArgMatches;
use fulcrum_scheduler::{JobKind, MissedFirePolicy, Schedule, ScheduleStore, ScheduleTrigger};

fn store(matches: &ArgMatches) -> ScheduleStore {
    let data_dir = matches.get_one::<String>("data-dir").expect("has default");
    ScheduleStore::new(std::path::PathBuf::from(data_dir).join("schedules.ndjson"))
}

pub async fn run_list(matches: &ArgMatches) {
    let store = store(matches);
    match store.load() {
        Ok(schedules) if schedules.is_empty() => println!("(no schedules)"),
        Ok(schedules) => {
            for schedule in schedules {
                println!(
                    "{}  next_run_at={}  status={:?}  failures={}/{}",
                    schedule.schedule_id,
                    schedule.next_run_at.to_rfc3339(),
                    schedule.status,
                    schedule.consecutive_failures,
                    schedule.max_failures
                );
            }
        }
        Err(err) => {
            eprintln!("failed to load schedule store: {err}");
            std::process::exit(1);
        }
    }
}

pub async fn run_create(matches: &ArgMatches) {
    let store = store(matches);
    let mut schedules = match store.load() {
        Ok(s) => s,
        Err(err) => {
            eprintln!("failed to load schedule store: {err}");
            std::process::exit(1);
        }
    };

    let task_text = matches.get_one::<String>("task").expect("required").clone();
    let missed_fire_policy = match matches.get_one::<String>("missed-fire").map(String::as_str) {
        Some("catchup_one") => MissedFirePolicy::CatchupOne,
        Some("catchup_all") => MissedFirePolicy::CatchupAll,
        _ => MissedFirePolicy::Skip,
    };

    let trigger = if let Some(expression) = matches.get_one::<String>("cron") {
        ScheduleTrigger::Cron { expression: expression.clone(), timezone: matches.get_one::<String>("timezone").cloned() }
    } else if let Some(interval) = matches.get_one::<String>("every-ms") {
        let interval_ms: u64 = match interval.parse() {
            Ok(v) => v,
            Err(_) => {
                eprintln!("--every-ms must be an integer number of milliseconds");
                std::process::exit(1);
            }
        };
        ScheduleTrigger::Every { interval_ms, start_at: None }
    } else if let Some(at) = matches.get_one::<String>("at") {
        let at = match chrono::DateTime::parse_from_rfc3339(at) {
            Ok(dt) => dt.with_timezone(&chrono::Utc),
            Err(err) => {
                eprintln!("--at must be RFC 3339: {err}");
                std::process::exit(1);
            }
        };
        ScheduleTrigger::At { at }
    } else {
        eprintln!("one of --cron, --every-ms, or --at is required");
        std::process::exit(1);
    };

    let job = JobKind::CreateSession { task_text, mode: None, constraints: None, agentic: None };
    let max_failures: u32 = matches.get_one::<String>("max-failures").and_then(|s| s.parse().ok()).unwrap_or(3);
    let schedule = Schedule::new(trigger, job, missed_fire_policy, max_failures);
    let schedule_id = schedule.schedule_id;
    schedules.push(schedule);

    if let Err(err) = store.save(&schedules) {
        eprintln!("failed to save schedule store: {err}");
        std::process::exit(1);
    }
    println!("schedule {schedule_id} created");
}

pub async fn run_remove(matches: &ArgMatches) {
    let store = store(matches);
    let schedule_id_str = matches.get_one::<String>("schedule-id").expect("required");
    let schedule_id = match schedule_id_str.parse::<fulcrum_common::ScheduleId>() {
        Ok(id) => id,
        Err(err) => {
            eprintln!("invalid schedule id `{schedule_id_str}`: {err}");
            std::process::exit(1);
        }
    };

    let schedules = match store.load() {
        Ok(s) => s,
        Err(err) => {
            eprintln!("failed to load schedule store: {err}");
            std::process::exit(1);
        }
    };
    let before = schedules.len();
    let remaining: Vec<_> = schedules.into_iter().filter(|s| s.schedule_id != schedule_id).collect();
    if remaining.len() == before {
        eprintln!("schedule {schedule_id} not found");
        std::process::exit(1);
    }
    if let Err(err) = store.save(&remaining) {
        eprintln!("failed to save schedule store: {err}");
        std::process::exit(1);
    }
    println!("schedule {schedule_id} removed");
}
