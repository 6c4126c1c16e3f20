//! Error types for scrape-controller

use scrape_agent_client::AgentClientError;
use scrape_types::ObjectKey;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by the reconciliation controller
#[derive(Debug, Error)]
pub enum ControllerError {
    /// The descriptor cache did not report synced in time
    #[error("descriptor cache failed to sync within {0:?}")]
    CacheSyncTimeout(Duration),

    /// Remote configs could not be listed for drift repair
    #[error("failed to list existing configs: {0}")]
    ListRemote(#[source] AgentClientError),

    /// A scrape job could not be applied for a key
    #[error("error syncing or deleting {key}: {source}")]
    Apply {
        key: ObjectKey,
        #[source]
        source: AgentClientError,
    },
}

/// Result type for controller operations
pub type ControllerResult<T> = std::result::Result<T, ControllerError>;
