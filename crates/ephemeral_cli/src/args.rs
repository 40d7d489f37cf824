//! Command-line surface and environment-backed configuration.

use clap::{Parser, Subcommand};
use ephemeral_core::db::DEFAULT_DB_FILE_NAME;
use ephemeral_core::ExpirationPolicy;
use std::path::PathBuf;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

#[derive(Parser, Debug)]
#[command(name = "ephemeral", bin_name = "ephemeral", version)]
#[command(about = "Share notes that destroy themselves after viewing", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// SQLite database file holding the notes
    #[arg(long, global = true, env = "EPHEMERAL_DB", default_value = DEFAULT_DB_FILE_NAME)]
    pub db: PathBuf,

    /// Absolute directory for rolling log files; logging is off when unset
    #[arg(long, global = true, env = "EPHEMERAL_LOG_DIR")]
    pub log_dir: Option<String>,

    /// trace|debug|info|warn|error
    #[arg(long, global = true, env = "EPHEMERAL_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Prefix for printed share links
    #[arg(long, global = true, env = "EPHEMERAL_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Store a note and print its share link
    Create {
        /// 1_view|5_views|10_views|10_minutes|1_hour|24_hours
        #[arg(short, long, value_parser = parse_policy, default_value = "1_view")]
        policy: ExpirationPolicy,

        /// Note text; read from stdin when omitted
        content: Option<String>,
    },
    /// Open a note, consuming one view
    View {
        /// Note id or full share link
        id: String,
    },
    /// Delete every note that has already expired
    Purge,
}

fn parse_policy(value: &str) -> Result<ExpirationPolicy, String> {
    value.parse().map_err(|err| format!("{err}"))
}

/// Accepts either a bare id or a link ending in `/note/<id>`.
pub fn id_from_input(input: &str) -> &str {
    let trimmed = input.trim().trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}
