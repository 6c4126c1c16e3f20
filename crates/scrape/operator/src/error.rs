//! Error types for scrape-operator

use scrape_agent_client::AgentClientError;
use scrape_controller::ControllerError;
use std::path::PathBuf;
use thiserror::Error;

/// Operator errors
#[derive(Debug, Error)]
pub enum OperatorError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Kubeconfig file does not exist
    #[error("Config file not found: {}", .0.display())]
    KubeconfigMissing(PathBuf),

    /// Cluster credentials could not be loaded
    #[error("Credentials error: {0}")]
    Credentials(String),

    /// Kubernetes client error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Agent client could not be built
    #[error("Agent client error: {0}")]
    Agent(#[from] AgentClientError),

    /// Controller stopped with an error
    #[error("Controller error: {0}")]
    Controller(#[from] ControllerError),

    /// A watched object could not be decoded
    #[error("Invalid object {object}: {reason}")]
    InvalidObject { object: String, reason: String },

    /// Background task failed
    #[error("Task error: {0}")]
    Task(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for OperatorError {
    fn from(err: config::ConfigError) -> Self {
        OperatorError::Config(err.to_string())
    }
}

/// Result type for operator operations
pub type OperatorResult<T> = Result<T, OperatorError>;
