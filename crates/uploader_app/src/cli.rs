use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "uploader", version, about = "Upload archives and track their processing jobs")]
pub struct Cli {
    /// Configuration file (RON).
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Settings that take precedence over the configuration file.
#[derive(Debug, Clone, Default, Args)]
pub struct Overrides {
    /// Archive server base URL.
    #[arg(long, env = "UPLOADER_SERVER_URL", global = true)]
    pub server: Option<String>,

    /// API key for the archive server.
    #[arg(long, env = "UPLOADER_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Category new archives are added to.
    #[arg(long, global = true)]
    pub category: Option<String>,

    /// Delay between two job status checks, in milliseconds.
    #[arg(long, global = true)]
    pub poll_interval_ms: Option<u64>,

    /// Pending status checks tolerated before a job is reported as timed out.
    #[arg(long, global = true)]
    pub max_poll_cycles: Option<u32>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Upload local files.
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Queue downloads, one job per URL.
    Download {
        urls: Vec<String>,
        /// Read additional URLs from a file, one per line.
        #[arg(long)]
        from_file: Option<PathBuf>,
    },
    /// Save an archive's title and tags.
    SaveMetadata(MetadataArgs),
    /// Save metadata, then run a metadata plugin against the archive.
    RunPlugin {
        #[command(flatten)]
        metadata: MetadataArgs,
        /// Plugin namespace.
        #[arg(long)]
        plugin: String,
        /// One-shot argument passed to the plugin.
        #[arg(long)]
        arg: Option<String>,
        /// Save the title and tags returned by the plugin.
        #[arg(long)]
        save: bool,
    },
    /// List tag completion suggestions.
    Suggestions {
        #[arg(long, default_value_t = uploader_core::edit::DEFAULT_SUGGESTION_MIN_WEIGHT)]
        min_weight: u32,
    },
    /// Delete an archive.
    Delete {
        #[arg(long)]
        id: String,
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Debug, Clone, Args)]
pub struct MetadataArgs {
    /// Archive id.
    #[arg(long)]
    pub id: String,
    #[arg(long, default_value = "")]
    pub title: String,
    /// Comma-separated tags.
    #[arg(long, default_value = "")]
    pub tags: String,
}
