//! `fulcrum` — command-line entry point for the agentic task runtime
//! (spec.md §1). Subcommand tree grounded on the teacher's `src/main.rs`
//! `clap::Command` shape (`up`, `doctor`, `logs`, ...), rewired from the
//! Symbiont DSL/agent CLI to this runtime's own session/schedule/swarm/
//! journal surfaces.

use clap::{Arg, ArgAction, Command};

mod commands;
mod demo;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn data_dir_arg() -> Arg {
    Arg::new("data-dir")
        .long("data-dir")
        .value_name("DIR")
        .help("Directory holding the journal, schedule store and escrow ledger")
        .default_value("./data")
}

fn api_arg() -> Arg {
    Arg::new("api")
        .long("api")
        .value_name("URL")
        .help("Base URL of a running `fulcrum up` instance")
        .default_value("http://127.0.0.1:8080")
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let matches = Command::new("fulcrum")
        .version(VERSION)
        .about("Agentic task runtime: session kernel, permission engine, journal, swarm delegation")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("up")
                .about("Start the runtime: kernel, scheduler, HTTP API, and optional swarm mesh")
                .arg(Arg::new("port").short('p').long("port").value_name("PORT").default_value("8080"))
                .arg(data_dir_arg())
                .arg(Arg::new("swarm").long("swarm").action(ArgAction::SetTrue).help("Enable the swarm delegation core")),
        )
        .subcommand(Command::new("doctor").about("Check the local environment before running `fulcrum up`").arg(data_dir_arg()))
        .subcommand(
            Command::new("session")
                .about("Create and inspect sessions")
                .subcommand_required(true)
                .subcommand(
                    Command::new("create")
                        .about("Run a task through the built-in echo planner to completion, in-process")
                        .arg(Arg::new("task").required(true).help("Free-form task text"))
                        .arg(Arg::new("mode").long("mode").value_name("real|dry_run|mock").default_value("real"))
                        .arg(data_dir_arg()),
                )
                .subcommand(
                    Command::new("status")
                        .about("Query a session's status from a running `fulcrum up` instance")
                        .arg(Arg::new("session-id").required(true))
                        .arg(api_arg()),
                )
                .subcommand(
                    Command::new("abort")
                        .about("Abort a running session")
                        .arg(Arg::new("session-id").required(true))
                        .arg(api_arg()),
                ),
        )
        .subcommand(
            Command::new("schedule")
                .about("Manage the durable schedule store (spec.md §4.8)")
                .subcommand_required(true)
                .subcommand(Command::new("list").about("List schedules").arg(data_dir_arg()))
                .subcommand(
                    Command::new("create")
                        .about("Add a schedule that creates a session when it fires")
                        .arg(Arg::new("task").long("task").value_name("TEXT").required(true))
                        .arg(Arg::new("cron").long("cron").value_name("EXPR").help("5-field cron expression"))
                        .arg(Arg::new("timezone").long("timezone").value_name("TZ"))
                        .arg(Arg::new("every-ms").long("every-ms").value_name("MS"))
                        .arg(Arg::new("at").long("at").value_name("RFC3339"))
                        .arg(Arg::new("missed-fire").long("missed-fire").value_name("skip|catchup_one|catchup_all").default_value("skip"))
                        .arg(Arg::new("max-failures").long("max-failures").value_name("N").default_value("3"))
                        .arg(data_dir_arg()),
                )
                .subcommand(
                    Command::new("remove")
                        .about("Remove a schedule")
                        .arg(Arg::new("schedule-id").required(true))
                        .arg(data_dir_arg()),
                ),
        )
        .subcommand(
            Command::new("journal")
                .about("Inspect the append-only hash-chained event log (spec.md §4.1)")
                .subcommand_required(true)
                .subcommand(Command::new("verify").about("Recompute the hash chain and report the first break, if any").arg(data_dir_arg()))
                .subcommand(
                    Command::new("tail")
                        .about("Print every event for a session")
                        .arg(Arg::new("session-id").long("session-id").value_name("ID").required(true))
                        .arg(data_dir_arg()),
                ),
        )
        .subcommand(
            Command::new("swarm")
                .about("Inspect and poke a running node's swarm mesh (spec.md §4.9-§4.16, §6)")
                .subcommand_required(true)
                .subcommand(Command::new("identity").about("Show this node's identity").arg(api_arg()))
                .subcommand(
                    Command::new("peers")
                        .about("List known peers")
                        .arg(Arg::new("status").long("status").value_name("active|suspected|unreachable|left"))
                        .arg(api_arg()),
                )
                .subcommand(
                    Command::new("join")
                        .about("Announce a peer to the mesh")
                        .arg(Arg::new("node-id").long("node-id").required(true))
                        .arg(Arg::new("display-name").long("display-name").required(true))
                        .arg(Arg::new("api-url").long("api-url").required(true))
                        .arg(api_arg()),
                )
                .subcommand(
                    Command::new("escrow-deposit")
                        .about("Deposit funds into a peer's escrow account")
                        .arg(Arg::new("node-id").long("node-id").required(true))
                        .arg(Arg::new("amount").long("amount").required(true))
                        .arg(api_arg()),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("up", sub)) => commands::up::run(sub).await,
        Some(("doctor", sub)) => commands::doctor::run(sub).await,
        Some(("session", sub)) => match sub.subcommand() {
            Some(("create", sub)) => commands::session::run_create(sub).await,
            Some(("status", sub)) => commands::session::run_status(sub).await,
            Some(("abort", sub)) => commands::session::run_abort(sub).await,
            _ => unreachable!("clap enforces subcommand_required"),
        },
        Some(("schedule", sub)) => match sub.subcommand() {
            Some(("list", sub)) => commands::schedule::run_list(sub).await,
            Some(("create", sub)) => commands::schedule::run_create(sub).await,
            Some(("remove", sub)) => commands::schedule::run_remove(sub).await,
            _ => unreachable!("clap enforces subcommand_required"),
        },
        Some(("journal", sub)) => match sub.subcommand() {
            Some(("verify", sub)) => commands::journal::run_verify(sub).await,
            Some(("tail", sub)) => commands::journal::run_tail(sub).await,
            _ => unreachable!("clap enforces subcommand_required"),
        },
        Some(("swarm", sub)) => match sub.subcommand() {
            Some(("identity", sub)) => commands::swarm::run_identity(sub).await,
            Some(("peers", sub)) => commands::swarm::run_peers(sub).await,
            Some(("join", sub)) => commands::swarm::run_join(sub).await,
            Some(("escrow-deposit", sub)) => commands::swarm::run_escrow_deposit(sub).await,
            _ => unreachable!("clap enforces subcommand_required"),
        },
        _ => unreachable!("clap enforces subcommand_required"),
    }
}
