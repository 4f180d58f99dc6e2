pub mod config;
pub mod run;
pub mod stats;

use clap::{Parser, Subcommand};

use at_domain::config::TrackerConfig;

/// at-tracker: live stat polling from a device-control server.
#[derive(Debug, Parser)]
#[command(name = "at-tracker", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to the TOML config file.
    #[arg(long, global = true, default_value = "tracker.toml")]
    pub config: String,

    /// Server host (overrides `connection.host`).
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Server port (overrides `connection.port`).
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Optional stat to poll; repeat for several (replaces `stats.selected`).
    #[arg(long = "stat", global = true)]
    pub stats: Vec<String>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Connect and poll until Ctrl-C (default when no subcommand is given).
    Run,
    /// List every known stat with its address.
    Stats {
        /// Print the catalog as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any issues.
    Validate,
    /// Dump the resolved configuration (with defaults and CLI overrides) as TOML.
    Show,
}

impl Cli {
    /// Config for running a session: the file when it loads, defaults
    /// otherwise, with command-line overrides on top.
    pub fn resolve_config(&self) -> TrackerConfig {
        let mut config = TrackerConfig::load_or_default(&self.config);
        self.apply_overrides(&mut config);
        config
    }

    /// Config for `config validate`: the file must exist and parse.
    pub fn load_config_strict(&self) -> anyhow::Result<TrackerConfig> {
        let mut config = TrackerConfig::load(&self.config)
            .map_err(|e| anyhow::anyhow!("loading {}: {e}", self.config))?;
        self.apply_overrides(&mut config);
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut TrackerConfig) {
        if let Some(host) = &self.host {
            config.connection.host = host.clone();
        }
        if let Some(port) = self.port {
            config.connection.port = port;
        }
        if !self.stats.is_empty() {
            config.stats.selected = self.stats.clone();
        }
    }
}
