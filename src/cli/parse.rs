//! CLI parse: clap types for docket. No behavior; definitions only.

use crate::types::QueueKind;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Docket CLI - review queues for support tickets and account deletion requests
#[derive(Parser, Debug)]
#[command(name = "docket")]
#[command(about = "Review and moderate support tickets and account deletion requests")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory (for config/config.toml)
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, default_value = "false", conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Act as this reviewer instead of the configured one
    #[arg(long)]
    pub reviewer_id: Option<String>,

    /// Reviewer role (admin, scoped)
    #[arg(long)]
    pub role: Option<String>,

    /// Queue or tab key the reviewer may access; repeatable
    #[arg(long = "scope")]
    pub scopes: Vec<String>,

    /// Serve queues from a JSON fixture file instead of the HTTP store
    #[arg(long)]
    pub seed: Option<PathBuf>,

    /// Print JSON instead of tables
    #[arg(long, default_value = "false")]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch a queue once and list the records visible to the reviewer
    List {
        /// Queue: support or account-deletion
        #[arg(value_parser = parse_queue)]
        queue: QueueKind,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Poll a queue and reprint it whenever it changes
    Watch {
        #[arg(value_parser = parse_queue)]
        queue: QueueKind,
        #[command(flatten)]
        filters: FilterArgs,
        /// Polling interval (defaults to refresh.interval_secs)
        #[arg(long)]
        interval_secs: Option<u64>,
        /// Stop after printing this many snapshots
        #[arg(long)]
        cycles: Option<usize>,
    },
    /// Show one record with its audit trail
    Show {
        #[arg(value_parser = parse_queue)]
        queue: QueueKind,
        id: String,
    },
    /// Move a record to another status
    Transition {
        #[arg(value_parser = parse_queue)]
        queue: QueueKind,
        id: String,
        /// Target status, e.g. IN_PROGRESS
        to: String,
    },
    /// Append a reviewer answer to a support ticket
    Answer {
        #[arg(value_parser = parse_queue)]
        queue: QueueKind,
        id: String,
        text: String,
    },
    /// Decide a pending account deletion request
    Review {
        #[arg(value_parser = parse_queue)]
        queue: QueueKind,
        id: String,
        /// approved or rejected
        outcome: String,
        /// Optional note recorded with the decision
        #[arg(long)]
        note: Option<String>,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Case-insensitive text search
    #[arg(long)]
    pub search: Option<String>,

    /// Only records in this status
    #[arg(long)]
    pub status: Option<String>,

    /// Sort key: newest, oldest, title, subject
    #[arg(long, default_value = "newest")]
    pub sort: String,
}

fn parse_queue(value: &str) -> Result<QueueKind, String> {
    QueueKind::parse(value).ok_or_else(|| {
        format!(
            "unknown queue '{}' (expected one of: {})",
            value,
            QueueKind::ALL
                .iter()
                .map(|kind| kind.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    })
}
