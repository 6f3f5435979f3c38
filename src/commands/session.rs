//! `fulcrum session` — drive the session kernel in-process for a one-shot
//! local run, or ask a running `fulcrum up` instance for status/abort over
//! its HTTP API. Mirrors the teacher's split between a locally-executing
//! subcommand (`up`) and thin HTTP-client subcommands (`status`) in
//! `src/commands/status.rs`.

use std::sync::Arc;

use clap::ArgMatches;
use fulcrum_common::SessionId;
use fulcrum_journal::{FileJournal, Journal};
use futures::StreamExt;
use fulcrum_kernel::{Kernel, KernelConfig, Limits, SessionMode};
use fulcrum_permission::{DefaultPermissionEngine, PolicyProfile};
use fulcrum_tools::{ToolRegistry, ToolRuntime};

use crate::demo;

pub async fn run_create(matches: &ArgMatches) {
    let task = matches.get_one::<String>("task").expect("required").clone();
    let mode = match matches.get_one::<String>("mode").map(String::as_str) {
        Some("dry_run") => SessionMode::DryRun,
        Some("mock") => SessionMode::Mock,
        _ => SessionMode::Real,
    };
    let data_dir = matches.get_one::<String>("data-dir").expect("has default").clone();

    println!("Running task through the built-in echo planner in `{}` mode...\n", mode_label(mode));

    let data_dir = std::path::PathBuf::from(data_dir);
    if let Err(err) = std::fs::create_dir_all(&data_dir) {
        eprintln!("could not create data dir {}: {err}", data_dir.display());
        std::process::exit(1);
    }

    let journal: Arc<dyn Journal> = match FileJournal::open(data_dir.join("journal.ndjson")) {
        Ok(j) => Arc::new(j),
        Err(err) => {
            eprintln!("failed to open journal: {err}");
            std::process::exit(1);
        }
    };

    let permission = Arc::new(DefaultPermissionEngine::new(
        journal.clone(),
        Arc::new(demo::AutoApproveChannel),
        b"fulcrum-dev-signing-secret".to_vec(),
    ));

    let registry = Arc::new(ToolRegistry::new());
    for handler in demo::builtin_tool_handlers() {
        registry.register(handler);
    }
    let tools = Arc::new(ToolRuntime::new(registry, journal.clone(), Default::default()));

    let kernel = Arc::new(Kernel::new(
        journal.clone(),
        permission,
        tools,
        Arc::new(demo::EchoPlanner),
        fulcrum_kernel::default_critics(),
        KernelConfig::default(),
    ));

    let session_id = match kernel
        .create_session(task, mode, Limits::default(), PolicyProfile::default())
        .await
    {
        Ok(id) => id,
        Err(err) => {
            eprintln!("failed to create session: {err}");
            std::process::exit(1);
        }
    };

    println!("session {session_id} created");

    match kernel.run(session_id).await {
        Ok(status) => println!("session {session_id} finished: {status:?}"),
        Err(err) => {
            eprintln!("session {session_id} errored: {err}");
            std::process::exit(1);
        }
    }

    print_journal_tail(journal.as_ref(), session_id).await;
}

async fn print_journal_tail(journal: &dyn Journal, session_id: SessionId) {
    match journal.read_session(session_id, None).await {
        Ok(mut events) => {
            println!("\njournal:");
            while let Some(event) = events.next().await {
                match event {
                    Ok(event) => println!("  [{:>3}] {}", event.seq, event.event_type),
                    Err(err) => eprintln!("could not read journal: {err}"),
                }
            }
        }
        Err(err) => eprintln!("could not read journal: {err}"),
    }
}

fn mode_label(mode: SessionMode) -> &'static str {
    match mode {
        SessionMode::Real => "real",
        SessionMode::DryRun => "dry_run",
        SessionMode::Mock => "mock",
    }
}

pub async fn run_status(matches: &ArgMatches) {
    let session_id = matches.get_one::<String>("session-id").expect("required");
    let api_base = matches.get_one::<String>("api").expect("has default");
    let url = format!("{api_base}/sessions/{session_id}");
    match reqwest::get(&url).await {
        Ok(resp) if resp.status().is_success() => match resp.text().await {
            Ok(body) => println!("{body}"),
            Err(err) => eprintln!("failed to read response body: {err}"),
        },
        Ok(resp) => eprintln!("runtime returned {}: is `fulcrum up` running at {api_base}?", resp.status()),
        Err(err) => eprintln!("could not reach runtime at {api_base}: {err}"),
    }
}

pub async fn run_abort(matches: &ArgMatches) {
    let session_id = matches.get_one::<String>("session-id").expect("required");
    let api_base = matches.get_one::<String>("api").expect("has default");
    let url = format!("{api_base}/sessions/{session_id}/abort");
    let client = reqwest::Client::new();
    match client.post(&url).send().await {
        Ok(resp) if resp.status().is_success() => println!("session {session_id} aborted"),
        Ok(resp) => eprintln!("runtime returned {}", resp.status()),
        Err(err) => eprintln!("could not reach runtime at {api_base}: {err}"),
    }
}
