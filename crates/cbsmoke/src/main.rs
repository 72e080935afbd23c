//! cbsmoke - smoke test for a database cluster
//!
//! Connects with the given credentials, waits for the cluster and bucket,
//! then runs the fixed smoke sequence and prints a status line per step.

mod cli;
mod output;
mod smoke;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::Cli;

/// Exit status for failures before the suite could run
const SETUP_FAILURE_EXIT_CODE: i32 = 2;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize rustls crypto provider (required for rustls 0.23+)
    // This must be done before any TLS operations
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    match smoke::run(cli).await {
        Ok(0) => Ok(()),
        Ok(code) => std::process::exit(code),
        Err(e) => {
            output::error(&format!("{:#}", e));
            std::process::exit(SETUP_FAILURE_EXIT_CODE);
        }
    }
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // Logs share the terminal with the report, so keep them on stderr
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}
