//! Configuration for scrape-operator

use crate::error::{OperatorError, OperatorResult};
use scrape_controller::{default_workers, BackoffPolicy, ControllerConfig};
use scrape_types::RemoteWriteConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default remote-write destination
pub const DEFAULT_REMOTE_WRITE_URL: &str =
    "http://cortex.monitoring.svc.cluster.local/api/prom/push";

/// Main operator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperatorConfig {
    /// Agent API configuration
    #[serde(default)]
    pub agent: AgentConfig,

    /// Remote-write destination attached to every job
    #[serde(default)]
    pub remote_write: RemoteWriteSettings,

    /// Controller tuning
    #[serde(default)]
    pub controller: ControllerSettings,

    /// Cluster access
    #[serde(default)]
    pub kube: ClusterConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Agent API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// API root of the agent; empty disables syncing
    #[serde(default)]
    pub url: String,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl AgentConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Remote-write settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteWriteSettings {
    /// Remote-write URL, used when no config file is given
    #[serde(default = "default_remote_write_url")]
    pub url: String,

    /// YAML file holding a full remote-write block
    #[serde(default)]
    pub config_path: Option<PathBuf>,
}

impl Default for RemoteWriteSettings {
    fn default() -> Self {
        Self {
            url: default_remote_write_url(),
            config_path: None,
        }
    }
}

impl RemoteWriteSettings {
    /// Resolve the destination, reading `config_path` when set.
    pub fn destination(&self) -> OperatorResult<RemoteWriteConfig> {
        match &self.config_path {
            Some(path) => load_remote_write(path),
            None => Ok(RemoteWriteConfig::with_url(self.url.as_str())),
        }
    }
}

fn load_remote_write(path: &Path) -> OperatorResult<RemoteWriteConfig> {
    let raw = std::fs::read_to_string(path)?;
    serde_yaml::from_str(&raw).map_err(|e| {
        OperatorError::Config(format!(
            "Invalid remote_write config {}: {}",
            path.display(),
            e
        ))
    })
}

/// Controller settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerSettings {
    /// Number of reconciliation workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Cache sync timeout in seconds
    #[serde(default = "default_cache_sync_timeout")]
    pub cache_sync_timeout_secs: u64,

    /// Retry backoff
    #[serde(default)]
    pub backoff: BackoffSettings,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            cache_sync_timeout_secs: default_cache_sync_timeout(),
            backoff: BackoffSettings::default(),
        }
    }
}

impl ControllerSettings {
    pub fn to_controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            workers: self.workers,
            cache_sync_timeout: Duration::from_secs(self.cache_sync_timeout_secs),
            backoff: self.backoff.to_policy(),
        }
    }
}

/// Retry backoff settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffSettings {
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay(),
            max_delay_secs: default_max_delay(),
            max_retries: default_max_retries(),
        }
    }
}

impl BackoffSettings {
    pub fn to_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_millis(self.base_delay_ms),
            Duration::from_secs(self.max_delay_secs),
            self.max_retries,
        )
    }
}

/// Cluster access configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Use the in-cluster service account
    #[serde(default)]
    pub in_cluster: bool,

    /// Explicit kubeconfig path
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_request_timeout() -> u64 {
    30
}

fn default_remote_write_url() -> String {
    DEFAULT_REMOTE_WRITE_URL.to_string()
}

fn default_cache_sync_timeout() -> u64 {
    60
}

fn default_base_delay() -> u64 {
    5
}

fn default_max_delay() -> u64 {
    1000
}

fn default_max_retries() -> u32 {
    15
}

fn default_log_level() -> String {
    "info".to_string()
}

impl OperatorConfig {
    /// Load configuration: defaults, then the optional file, then
    /// `SCRAPE_OPERATOR__<SECTION>__<KEY>` environment variables.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&OperatorConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("SCRAPE_OPERATOR")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
