//! Error types for scrape-agent-client

use std::fmt;
use thiserror::Error;

/// Agent API call that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ListScrapeConfigs,
    UpdateScrapeConfig,
    DeleteScrapeConfig,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::ListScrapeConfigs => "ListScrapeConfigs",
            Operation::UpdateScrapeConfig => "UpdateScrapeConfig",
            Operation::DeleteScrapeConfig => "DeleteScrapeConfig",
        };
        f.write_str(name)
    }
}

/// Errors talking to the agent
#[derive(Debug, Error)]
pub enum AgentClientError {
    /// The configured API root is not a usable base URL
    #[error("invalid agent URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The HTTP client could not be built
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Transport failure
    #[error("{operation}: request failed: {source}")]
    Http {
        operation: Operation,
        #[source]
        source: reqwest::Error,
    },

    /// The agent answered with a status the call does not accept
    #[error("{operation}: unexpected status code: {status}")]
    UnexpectedStatus {
        operation: Operation,
        status: reqwest::StatusCode,
    },

    /// A config could not be serialized for upload
    #[error("UpdateScrapeConfig: failed to marshal config: {0}")]
    Encode(#[from] serde_yaml::Error),

    /// The list response body was not understood
    #[error("ListScrapeConfigs: unmarshal response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl AgentClientError {
    pub(crate) fn http(operation: Operation) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| AgentClientError::Http { operation, source }
    }
}

/// Result type for agent client operations
pub type Result<T> = std::result::Result<T, AgentClientError>;
