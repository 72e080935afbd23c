//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use cbsmoke_suite::OutputFormat;
use clap::Parser;

/// cbsmoke - exercise every major service of a cluster once
#[derive(Parser, Debug)]
#[command(name = "cbsmoke")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Connection string, e.g. couchbase://10.0.0.1 or https://db.local:18091
    #[arg(long, env = "CB_CONNECTION")]
    pub connection: String,

    /// User to authenticate as
    #[arg(long, env = "CB_USERNAME")]
    pub username: String,

    /// Password for the user
    #[arg(long, env = "CB_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Bucket the smoke documents and indexes are created in
    #[arg(long, env = "CB_BUCKET")]
    pub bucket: String,

    /// CA certificate (PEM) to trust; enables TLS
    #[arg(long, env = "CB_CAFILE")]
    pub cafile: Option<Utf8PathBuf>,

    /// Path to a runtime configuration file (timeouts, poll policy)
    #[arg(short, long)]
    pub config: Option<Utf8PathBuf>,

    /// Output format: human, json or yaml
    #[arg(long, default_value = "human")]
    pub format: OutputFormat,

    /// Leave the generated search index and design document in place
    #[arg(long)]
    pub keep_artifacts: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long)]
    pub quiet: bool,
}
