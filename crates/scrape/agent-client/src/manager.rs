//! Remote config store contract

use crate::error::Result;
use async_trait::async_trait;
use scrape_types::ScrapeJobConfig;
use std::collections::BTreeSet;

/// How an upsert landed on the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The config did not exist and was added
    Created,
    /// An existing config was replaced
    Updated,
}

/// How a delete landed on the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The agent did not know the name; treated as already gone
    Absent,
}

/// Store of named scrape job configs on the agent
///
/// Upserts and deletes are keyed by job name and must be safe to repeat.
#[async_trait]
pub trait AgentConfigManager: Send + Sync {
    /// Names of every config the agent currently holds
    async fn list_configs(&self) -> Result<BTreeSet<String>>;

    /// Create or replace a config
    async fn upsert_config(&self, config: &ScrapeJobConfig) -> Result<UpsertOutcome>;

    /// Remove a config by name
    async fn delete_config(&self, name: &str) -> Result<DeleteOutcome>;
}

/// Manager used when no agent is configured: nothing is listed and every
/// write succeeds without effect.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpConfigManager;

#[async_trait]
impl AgentConfigManager for NoOpConfigManager {
    async fn list_configs(&self) -> Result<BTreeSet<String>> {
        Ok(BTreeSet::new())
    }

    async fn upsert_config(&self, _config: &ScrapeJobConfig) -> Result<UpsertOutcome> {
        Ok(UpsertOutcome::Updated)
    }

    async fn delete_config(&self, _name: &str) -> Result<DeleteOutcome> {
        Ok(DeleteOutcome::Deleted)
    }
}
