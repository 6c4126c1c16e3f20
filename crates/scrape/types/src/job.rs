//! Agent-side scrape job configuration
//!
//! These types are the wire format posted to the agent's config API: one
//! agent instance config per descriptor endpoint, carrying a single
//! Prometheus scrape config and the shared remote-write destination.
//! Field names are the Prometheus YAML names; unset optionals are omitted.

use crate::duration::PromDuration;
use crate::relabel::RelabelRule;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One agent instance config, keyed by `name`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeJobConfig {
    /// `{namespace}/{name}/{endpoint index}`
    pub name: String,

    #[serde(default)]
    pub scrape_configs: Vec<ScrapeConfig>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remote_write: Vec<RemoteWriteConfig>,
}

/// Prometheus scrape config
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeConfig {
    pub job_name: String,

    #[serde(default)]
    pub honor_labels: bool,

    #[serde(default)]
    pub honor_timestamps: bool,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scrape_interval: Option<PromDuration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scrape_timeout: Option<PromDuration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub sample_limit: u64,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub target_limit: u64,

    #[serde(default)]
    pub kubernetes_sd_configs: Vec<KubernetesSdConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_config: Option<TlsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_token_file: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relabel_configs: Vec<RelabelRule>,
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

/// Kubernetes service discovery block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubernetesSdConfig {
    pub role: SdRole,

    /// Absent means every namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespaces: Option<NamespaceDiscovery>,
}

impl KubernetesSdConfig {
    /// Endpoint discovery restricted to `namespaces`, or cluster-wide if empty
    pub fn endpoints(namespaces: Vec<String>) -> Self {
        let namespaces = if namespaces.is_empty() {
            None
        } else {
            Some(NamespaceDiscovery { names: namespaces })
        };
        Self {
            role: SdRole::Endpoints,
            namespaces,
        }
    }
}

/// Discovery role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdRole {
    Endpoints,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceDiscovery {
    #[serde(default)]
    pub names: Vec<String>,
}

/// TLS client options of a scrape or remote-write target
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,

    #[serde(default)]
    pub insecure_skip_verify: bool,
}

/// Remote-write destination shared by every generated job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteWriteConfig {
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_timeout: Option<PromDuration>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_token_file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_config: Option<TlsConfig>,
}

impl RemoteWriteConfig {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}
