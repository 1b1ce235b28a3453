//! Command-line flags, applied on top of the file and environment layers.

use std::path::PathBuf;

use clap::Parser;
use warden_core::{Config, LogFormat};

/// Runtime-security response engine.
#[derive(Parser, Debug)]
#[command(name = "warden", version, about)]
pub struct Cli {
    /// YAML configuration file.
    #[arg(short, long, env = "WARDEN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Rules file; repeat for several. Replaces the configured list.
    #[arg(short, long = "rules")]
    pub rules: Vec<PathBuf>,

    #[arg(long)]
    pub listen_address: Option<String>,

    #[arg(long)]
    pub listen_port: Option<u16>,

    /// Log format: "text" or "json".
    #[arg(long)]
    pub log_format: Option<LogFormat>,

    /// Disable rule file watching.
    #[arg(long)]
    pub no_watch_rules: bool,

    /// Deduplication window in seconds.
    #[arg(long)]
    pub dedup_window: Option<u64>,

    /// Follow the leader lease for publish routing.
    #[arg(long)]
    pub leader_election: bool,

    /// Identity compared against the lease holder (defaults to the local IP).
    #[arg(long)]
    pub self_identity: Option<String>,

    /// Seconds to wait for in-flight work at shutdown.
    #[arg(long, default_value_t = 5)]
    pub shutdown_grace: u64,
}

impl Cli {
    /// Override `config` with every flag that was given.
    pub fn apply(&self, config: &mut Config) {
        if !self.rules.is_empty() {
            config.rules_files = self.rules.clone();
        }
        if let Some(address) = &self.listen_address {
            config.listen_address = address.clone();
        }
        if let Some(port) = self.listen_port {
            config.listen_port = port;
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        if self.no_watch_rules {
            config.watch_rules = false;
        }
        if let Some(window) = self.dedup_window {
            config.deduplication.time_window_seconds = window;
        }
        if self.leader_election {
            config.deduplication.leader_election = true;
        }
        if let Some(identity) = &self.self_identity {
            config.self_identity = Some(identity.clone());
        }
    }
}
