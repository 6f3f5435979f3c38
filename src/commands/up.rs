//! `fulcrum up` — start the full runtime: journal, permission engine, tool
//! runtime, kernel, scheduler, optional swarm, and the HTTP surface over all
//! of them. Mirrors the teacher's `src/commands/up.rs` "auto-configure and
//! serve" shape, rewired to `fulcrum_runtime::TaskRuntime` instead of the
//! `AgentRuntime`/webhook/Qdrant stack.

use std::sync::Arc;

use clap::ArgMatches;
use fulcrum_permission::ApprovalChannel;
use fulcrum_runtime::{RuntimeConfig, TaskRuntime};

use crate::demo;

pub async fn run(matches: &ArgMatches) {
    let port: u16 = matches.get_one::<String>("port").expect("has default").parse().unwrap_or_else(|_| {
        eprintln!("--port must be a number");
        std::process::exit(1);
    });
    let data_dir = matches.get_one::<String>("data-dir").expect("has default").clone();
    let swarm_enabled = matches.get_flag("swarm");

    let mut config = RuntimeConfig::default();
    config.api.port = port;
    config.storage.data_dir = std::path::PathBuf::from(data_dir);
    config.swarm.enabled = swarm_enabled;

    println!("Starting fulcrum runtime on 127.0.0.1:{port}");
    println!("  data dir: {}", config.storage.data_dir.display());
    println!("  swarm: {}", if swarm_enabled { "enabled" } else { "disabled" });

    let approval: Arc<dyn ApprovalChannel> = Arc::new(demo::AutoApproveChannel);

    let runtime = match TaskRuntime::new(
        config,
        Arc::new(demo::EchoPlanner),
        approval,
        demo::builtin_tool_handlers(),
        fulcrum_kernel::default_critics(),
        None,
    ) {
        Ok(runtime) => Arc::new(runtime),
        Err(err) => {
            eprintln!("failed to start runtime: {err}");
            std::process::exit(1);
        }
    };

    let _scheduler_handle = runtime.spawn_scheduler();

    let listener = match tokio::net::TcpListener::bind(("127.0.0.1", port)).await {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("failed to bind 127.0.0.1:{port}: {err}");
            std::process::exit(1);
        }
    };

    println!("Listening on http://127.0.0.1:{port} (Ctrl+C to stop)");
    let router = fulcrum_runtime::api::router(runtime);
    if let Err(err) = axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await {
        eprintln!("server error: {err}");
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    println!("\nshutting down...");
}
