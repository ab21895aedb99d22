//! CLI command definitions.

use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Write a starter .drover.yml
    Init,

    /// Validate pipeline definitions
    Validate {
        /// Path to the definition file
        #[arg(default_value = ".drover.yml")]
        path: PathBuf,
    },

    /// Show which pipelines an event would start
    Plan {
        /// Path to the definition file
        #[arg(default_value = ".drover.yml")]
        path: PathBuf,

        #[command(flatten)]
        event: EventArgs,
    },

    /// Dispatch an event and run the pipelines it reaches
    Run {
        /// Path to the definition file
        #[arg(default_value = ".drover.yml")]
        path: PathBuf,

        #[command(flatten)]
        event: EventArgs,

        /// Run steps in the host shell instead of Docker
        #[arg(long)]
        local: bool,

        /// JSON or YAML file of secret values
        #[arg(long, env = "DROVER_SECRETS_FILE")]
        secrets_file: Option<PathBuf>,

        /// Base URL of an HTTP secret service
        #[arg(long, env = "DROVER_SECRETS_URL")]
        secrets_url: Option<String>,

        /// Prefix for secrets read from environment variables
        #[arg(long)]
        secret_prefix: Option<String>,

        /// Directory where build statuses are persisted
        #[arg(long)]
        state_dir: Option<PathBuf>,

        /// Maximum number of pipelines running at once
        #[arg(long)]
        max_parallel: Option<usize>,

        /// Per-step timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Flags describing the event to dispatch.
#[derive(Args, Debug, Clone)]
pub struct EventArgs {
    /// Event kind (push, pull_request, tag, promote, rollback, cron, custom)
    #[arg(short, long, default_value = "push")]
    pub event: String,

    /// Branch the event happened on
    #[arg(short, long)]
    pub branch: Option<String>,

    /// Full git ref (defaults to refs/heads/<branch> or refs/tags/<tag>)
    #[arg(long = "ref")]
    pub git_ref: Option<String>,

    /// Tag name, for tag events
    #[arg(long)]
    pub tag: Option<String>,

    /// Commit SHA
    #[arg(long)]
    pub commit: Option<String>,

    /// Commit author
    #[arg(long)]
    pub author: Option<String>,

    /// Build number (defaults to the current unix time)
    #[arg(long)]
    pub build: Option<u64>,

    /// Repository to clone (defaults to the current directory)
    #[arg(long)]
    pub remote: Option<String>,

    /// Read the whole event from a JSON file instead
    #[arg(long, conflicts_with_all = ["branch", "git_ref", "tag", "commit", "author"])]
    pub event_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Set configuration value
    Set {
        /// Key
        key: String,

        /// Value
        value: String,
    },
}
