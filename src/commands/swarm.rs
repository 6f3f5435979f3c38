//! `fulcrum swarm` — thin HTTP client against a running node's swarm wire
//! protocol (spec.md §6), in the same request/print style as
//! `fulcrum session status`. The mesh, distributor, contracts, escrow and
//! consensus all live inside `fulcrum up`'s process; this subcommand only
//! inspects and pokes them from the outside.

use clap::ArgMatches;

pub async fn run_identity(matches: &ArgMatches) {
    get(matches, "/plugins/swarm/identity").await;
}

pub async fn run_peers(matches: &ArgMatches) {
    let status = matches.get_one::<String>("status");
    let path = match status {
        Some(status) => format!("/plugins/swarm/peers?status={status}"),
        None => "/plugins/swarm/peers".to_string(),
    };
    get(matches, &path).await;
}

pub async fn run_join(matches: &ArgMatches) {
    let node_id = matches.get_one::<String>("node-id").expect("required");
    let display_name = matches.get_one::<String>("display-name").expect("required");
    let api_url = matches.get_one::<String>("api-url").expect("required");
    let body = serde_json::json!({
        "identity": {
            "node_id": node_id,
            "display_name": display_name,
            "api_url": api_url,
            "capabilities": [],
            "version": env!("CARGO_PKG_VERSION"),
        }
    });
    post(matches, "/plugins/swarm/join", body).await;
}

pub async fn run_escrow_deposit(matches: &ArgMatches) {
    let node_id = matches.get_one::<String>("node-id").expect("required");
    let amount: f64 = matches
        .get_one::<String>("amount")
        .expect("required")
        .parse()
        .unwrap_or_else(|_| {
            eprintln!("--amount must be a number");
            std::process::exit(1);
        });
    let body = serde_json::json!({ "node_id": node_id, "amount": amount });
    post(matches, "/plugins/swarm/escrow/deposit", body).await;
}

fn api_base(matches: &ArgMatches) -> String {
    matches.get_one::<String>("api").expect("has default").clone()
}

async fn get(matches: &ArgMatches, path: &str) {
    let url = format!("{}{}", api_base(matches), path);
    match reqwest::get(&url).await {
        Ok(resp) => print_response(resp).await,
        Err(err) => eprintln!("could not reach {url}: {err}"),
    }
}

async fn post(matches: &ArgMatches, path: &str, body: serde_json::Value) {
    let url = format!("{}{}", api_base(matches), path);
    let client = reqwest::Client::new();
    match client.post(&url).json(&body).send().await {
        Ok(resp) => print_response(resp).await,
        Err(err) => eprintln!("could not reach {url}: {err}"),
    }
}

async fn print_response(resp: reqwest::Response) {
    let status = resp.status();
    match resp.text().await {
        Ok(body) => println!("{status}: {body}"),
        Err(err) => eprintln!("{status}: failed to read response body: {err}"),
    }
}
