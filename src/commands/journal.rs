//! `fulcrum journal` — read the hash-chained event log directly off disk
//! (spec.md §4.1), without needing a running `fulcrum up` instance. Mirrors
//! the teacher's `src/commands/logs.rs` "tail a local file" shape but reads
//! the structured journal instead of free-text log lines.

use clap::ArgMatches;
use fulcrum_journal::{FileJournal, Journal};
use futures::StreamExt;
use std::str::FromStr;

fn journal_path(matches: &ArgMatches) -> std::path::PathBuf {
    let data_dir = matches.get_one::<String>("data-dir").expect("has default");
    std::path::PathBuf::from(data_dir).join("journal.ndjson")
}

pub async fn run_verify(matches: &ArgMatches) {
    let path = journal_path(matches);
    let journal = match FileJournal::open(&path) {
        Ok(j) => j,
        Err(err) => {
            eprintln!("failed to open journal at {}: {err}", path.display());
            std::process::exit(1);
        }
    };
    match journal.verify_integrity().await {
        Ok(report) if report.valid => {
            println!("journal is valid ({} events checked)", report.events_checked);
        }
        Ok(report) => {
            println!(
                "journal hash chain is BROKEN at seq {} ({} events checked)",
                report.first_broken_seq.unwrap_or(0),
                report.events_checked
            );
            std::process::exit(1);
        }
        Err(err) => {
            eprintln!("failed to verify journal: {err}");
            std::process::exit(1);
        }
    }
}

pub async fn run_tail(matches: &ArgMatches) {
    let path = journal_path(matches);
    let session_id = match matches.get_one::<String>("session-id") {
        Some(s) => match fulcrum_common::SessionId::from_str(s) {
            Ok(id) => id,
            Err(err) => {
                eprintln!("invalid session id `{s}`: {err}");
                std::process::exit(1);
            }
        },
        None => {
            eprintln!("--session-id is required");
            std::process::exit(1);
        }
    };

    let journal = match FileJournal::open(&path) {
        Ok(j) => j,
        Err(err) => {
            eprintln!("failed to open journal at {}: {err}", path.display());
            std::process::exit(1);
        }
    };

    match journal.read_session(session_id, None).await {
        Ok(mut events) => {
            while let Some(event) = events.next().await {
                match event {
                    Ok(event) => println!(
                        "[{:>5}] {} {} {}",
                        event.seq,
                        event.timestamp.to_rfc3339(),
                        event.event_type,
                        event.payload
                    ),
                    Err(err) => {
                        eprintln!("failed to read session: {err}");
                        std::process::exit(1);
                    }
                }
            }
        }
        Err(err) => {
            eprintln!("failed to read session: {err}");
            std::process::exit(1);
        }
    }
}
