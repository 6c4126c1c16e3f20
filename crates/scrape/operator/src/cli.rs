//! Command line interface

use crate::config::OperatorConfig;
use clap::Parser;
use std::path::PathBuf;

/// Syncs ServiceMonitors with grafana-agent
///
/// Watches ServiceMonitors and syncs them with a grafana agent cluster in
/// scraping service mode. Each ServiceMonitor endpoint becomes its own agent
/// config so the agents can shard them.
#[derive(Debug, Parser)]
#[command(name = "scrape-operator")]
#[command(version)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "SCRAPE_OPERATOR_CONFIG")]
    pub config: Option<String>,

    /// Verbosity to log at [panic, fatal, error, warning, info, debug, trace]
    #[arg(long, env = "SCRAPE_OPERATOR_VERBOSITY")]
    pub verbosity: Option<String>,

    /// Use the in-cluster token to talk to kubernetes
    #[arg(long)]
    pub in_cluster: bool,

    /// The API endpoint to write instance configuration to
    #[arg(long, env = "SCRAPE_OPERATOR_AGENT_URL")]
    pub agent_url: Option<String>,

    /// The URL to use for remote-write
    #[arg(long, env = "SCRAPE_OPERATOR_REMOTE_WRITE_URL")]
    pub remote_write_url: Option<String>,

    /// The path to a file containing the remote_write config to use
    #[arg(long)]
    pub remote_write_config: Option<PathBuf>,

    /// Enable JSON logging
    #[arg(long, env = "SCRAPE_OPERATOR_LOG_JSON")]
    pub json: bool,
}

impl Cli {
    /// Override loaded configuration with the flags that were given.
    pub fn apply(&self, config: &mut OperatorConfig) {
        if let Some(verbosity) = &self.verbosity {
            config.logging.level = verbosity.clone();
        }
        if self.json {
            config.logging.json = true;
        }
        if self.in_cluster {
            config.kube.in_cluster = true;
        }
        if let Some(url) = &self.agent_url {
            config.agent.url = url.clone();
        }
        if let Some(url) = &self.remote_write_url {
            config.remote_write.url = url.clone();
        }
        if let Some(path) = &self.remote_write_config {
            config.remote_write.config_path = Some(path.clone());
        }
    }
}
