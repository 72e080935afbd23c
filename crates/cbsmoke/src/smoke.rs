//! The smoke run: connect, wait for readiness, run the suite, report

use std::future::Future;
use std::io;

use anyhow::{Context, Result};
use cbsmoke_cluster::Cluster;
use cbsmoke_core::{ConnectionConfig, RuntimeConfig};
use cbsmoke_suite::{OutputFormat, ReportFormatter, SmokeSuite, SuiteOptions};
use tokio::sync::watch;
use tracing::debug;

use crate::cli::Cli;
use crate::output;

/// Run the smoke suite and return the process exit code
pub async fn run(cli: Cli) -> Result<i32> {
    let mut runtime = RuntimeConfig::load(cli.config.as_deref())
        .context("Failed to load runtime configuration")?;
    if cli.keep_artifacts {
        runtime.keep_artifacts = true;
    }

    let mut connection =
        ConnectionConfig::new(&cli.connection, &cli.username, &cli.password, &cli.bucket)
            .context("Invalid connection settings")?;
    if let Some(ca_file) = &cli.cafile {
        connection = connection.with_ca_file(ca_file.as_std_path());
    }
    debug!("Using {:?}", connection);

    let cancel = spawn_interrupt_handler();

    let mut cluster = Cluster::connect(&connection, &runtime)
        .context("Failed to open cluster session")?
        .with_cancellation(cancel.clone());

    cluster
        .wait_until_ready(runtime.cluster_ready_timeout())
        .await
        .context("Cluster did not become ready")?;
    cluster
        .bucket(connection.bucket.as_str())
        .wait_until_ready(runtime.bucket_ready_timeout())
        .await
        .with_context(|| format!("Bucket '{}' did not become ready", connection.bucket))?;

    let human = cli.format == OutputFormat::Human;
    if human && !cli.quiet {
        output::info(&format!("Running smoke suite on bucket {}", connection.bucket));
    }

    let options = SuiteOptions::from_runtime(&runtime).with_cancellation(cancel);
    let suite = SmokeSuite::new(&cluster, connection.bucket.clone(), options);
    let formatter = ReportFormatter::new(cli.verbose > 0);

    let report = suite
        .run(|record| {
            if human && !cli.quiet {
                println!("{}", formatter.format_step(record));
            }
        })
        .await;

    if human {
        if !cli.quiet {
            println!();
            print!("{}", formatter.format_summary(&report));
        }
        if let Some((step, error)) = report.failure() {
            output::error(&format!("{} failed: {}", step, error));
        } else if !cli.quiet {
            output::success("Smoke test passed");
        }
    } else {
        println!("{}", formatter.format(&report, cli.format));
    }

    Ok(report.exit_code())
}

/// Exit code after a second Ctrl-C, as for a shell killed by SIGINT
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Flip the returned channel to `true` on Ctrl-C. A second Ctrl-C exits
/// without waiting for in-flight requests.
fn spawn_interrupt_handler() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if relay_interrupts(tokio::signal::ctrl_c, tx).await {
            output::error("Interrupted again, exiting");
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    });
    rx
}

/// Forward the first interrupt to `tx`; resolves to `true` once a second
/// one arrives.
async fn relay_interrupts<F, Fut>(mut interrupted: F, tx: watch::Sender<bool>) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    if interrupted().await.is_err() {
        return false;
    }
    output::warning("Interrupted, stopping the smoke run (Ctrl-C again to exit now)");
    let _ = tx.send(true);
    interrupted().await.is_ok()
}
