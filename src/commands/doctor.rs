//! `fulcrum doctor` — local environment sanity check before `fulcrum up`.
//! Grounded on the teacher's `src/commands/doctor.rs` print-a-checklist
//! shape, narrowed from Docker/Qdrant checks to this runtime's own
//! dependencies: a writable data directory and a non-default signing
//! secret.

pub async fn run(matches: &clap::ArgMatches) {
    println!("Checking fulcrum environment...\n");

    let data_dir = matches.get_one::<String>("data-dir").expect("has default");
    let mut all_ok = true;

    print!("- data directory ({data_dir})... ");
    match std::fs::create_dir_all(data_dir) {
        Ok(()) => println!("ok"),
        Err(err) => {
            println!("failed: {err}");
            all_ok = false;
        }
    }

    print!("- signing secret... ");
    match std::env::var("FULCRUM_SIGNING_SECRET") {
        Ok(_) => println!("ok (FULCRUM_SIGNING_SECRET set)"),
        Err(_) => println!("using dev default; set FULCRUM_SIGNING_SECRET before a real deployment"),
    }

    print!("- port 8080 (runtime API)... ");
    if is_port_in_use(8080) {
        println!("in use (another `fulcrum up` running?)");
    } else {
        println!("available");
    }

    println!();
    if all_ok {
        println!("All checks passed. Start the runtime with: fulcrum up");
    } else {
        println!("Some checks failed; fix the issues above before running fulcrum up");
        std::process::exit(1);
    }
}

fn is_port_in_use(port: u16) -> bool {
    std::net::TcpListener::bind(("127.0.0.1", port)).is_err()
}
