use clitree::cli::{build_cli, get_verbosity, run_matches, Verbosity};
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    // a missing .env file is fine
    let _ = dotenvy::dotenv();

    let matches = build_cli().get_matches();
    init_tracing(get_verbosity(&matches));

    match run_matches(&matches) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    }
}

/// Log to stderr; RUST_LOG overrides the verbosity flags
fn init_tracing(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
