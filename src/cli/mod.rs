pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "freshet", about = "Syndication feed sync and integrity tool", version)]
pub struct Cli {
    /// Config file path (default: ~/.config/freshet/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Subscribe to a feed and run its first sync
    Add {
        /// Feed url
        url: String,
    },
    /// Unsubscribe from a feed, deleting its items
    Remove {
        /// Feed url
        url: String,
    },
    /// List subscribed feeds
    List {
        /// Also list each feed's items
        #[arg(long)]
        items: bool,
    },
    /// Sync one feed, or all feeds when no url is given
    Sync {
        /// Feed url (all feeds when omitted)
        url: Option<String>,
        /// Parallel workers for a full sync
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Scan feeds and items for duplicates
    Audit,
    /// Rewrite stored feed urls that carry a trailing slash
    TrimUrls,
    /// Background sync daemon
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum DaemonAction {
    /// Start the daemon in the foreground
    Start {
        /// Sync interval like "1h", "30m", "1d" (default: 1h)
        #[arg(long, default_value = "1h")]
        interval: String,
        /// Append daemon output to this file instead of stdout
        #[arg(long, value_name = "FILE")]
        log_file: Option<PathBuf>,
        /// Do not sync immediately on start
        #[arg(long)]
        no_initial_sync: bool,
    },
    /// Stop a running daemon
    Stop,
    /// Show daemon status
    Status,
}
