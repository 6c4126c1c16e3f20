//! HTTP client for the agent's config management API

use crate::error::{AgentClientError, Operation, Result};
use crate::manager::{AgentConfigManager, DeleteOutcome, UpsertOutcome};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use scrape_types::ScrapeJobConfig;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, error, info};
use url::Url;

const API_PREFIX: [&str; 3] = ["agent", "api", "v1"];

/// Body of `GET /agent/api/v1/configs`
#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    status: String,
    data: ListData,
}

#[derive(Debug, Deserialize)]
struct ListData {
    #[serde(default)]
    configs: Vec<String>,
}

/// Talks to a grafana-agent's scraping service API
///
/// Routes are resolved against the configured API root, which may carry a
/// path prefix and a trailing slash.
#[derive(Debug, Clone)]
pub struct GrafanaAgentClient {
    client: Client,
    api_root: Url,
}

impl GrafanaAgentClient {
    /// Create a client for the agent at `api_root`
    pub fn new(api_root: &str, request_timeout: Duration) -> Result<Self> {
        let invalid = |reason: String| AgentClientError::InvalidUrl {
            url: api_root.to_string(),
            reason,
        };

        let parsed = Url::parse(api_root).map_err(|e| invalid(e.to_string()))?;
        if parsed.cannot_be_a_base() {
            return Err(invalid("URL cannot be used as a base".to_string()));
        }

        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(AgentClientError::Client)?;

        Ok(Self {
            client,
            api_root: parsed,
        })
    }

    /// API root requests are resolved against
    pub fn api_root(&self) -> &Url {
        &self.api_root
    }

    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.api_root.clone();
        // Base URLs are checked in `new`, so segments are always available
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(API_PREFIX).extend(segments);
        }
        url
    }

    /// URL of the named config; the name is escaped as a single path segment
    pub fn route(&self, name: &str) -> Url {
        self.endpoint(["config", name])
    }

    fn configs_url(&self) -> Url {
        self.endpoint(["configs"])
    }
}

#[async_trait]
impl AgentConfigManager for GrafanaAgentClient {
    async fn list_configs(&self) -> Result<BTreeSet<String>> {
        let operation = Operation::ListScrapeConfigs;
        let url = self.configs_url();

        debug!(route = %url, "Listing scrape configs");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(AgentClientError::http(operation))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(AgentClientError::UnexpectedStatus { operation, status });
        }

        let body = response
            .text()
            .await
            .map_err(AgentClientError::http(operation))?;
        let payload: ListResponse = serde_json::from_str(&body)?;
        debug!(
            status = %payload.status,
            count = payload.data.configs.len(),
            "Listed scrape configs"
        );

        Ok(payload.data.configs.into_iter().collect())
    }

    async fn upsert_config(&self, config: &ScrapeJobConfig) -> Result<UpsertOutcome> {
        let operation = Operation::UpdateScrapeConfig;
        let body = serde_yaml::to_string(config)?;
        let route = self.route(&config.name);

        debug!(config = %config.name, route = %route, "Updating scrape config");
        let response = self
            .client
            .post(route)
            .body(body)
            .send()
            .await
            .map_err(AgentClientError::http(operation))?;

        match response.status() {
            StatusCode::OK => {
                info!(config = %config.name, "Config updated");
                Ok(UpsertOutcome::Updated)
            }
            StatusCode::CREATED => {
                info!(config = %config.name, "Config added");
                Ok(UpsertOutcome::Created)
            }
            status => Err(AgentClientError::UnexpectedStatus { operation, status }),
        }
    }

    async fn delete_config(&self, name: &str) -> Result<DeleteOutcome> {
        let operation = Operation::DeleteScrapeConfig;
        let route = self.route(name);

        debug!(config = %name, route = %route, "Deleting scrape config");
        let response = self
            .client
            .delete(route)
            .send()
            .await
            .map_err(AgentClientError::http(operation))?;

        match response.status() {
            StatusCode::OK => {
                info!(config = %name, "Config deleted");
                Ok(DeleteOutcome::Deleted)
            }
            StatusCode::BAD_REQUEST => {
                error!(config = %name, "Unknown or invalid config name");
                Ok(DeleteOutcome::Absent)
            }
            status => Err(AgentClientError::UnexpectedStatus { operation, status }),
        }
    }
}
