//! Monitoring-target descriptors as declared in the cluster
//!
//! Field names follow the `monitoring.coreos.com/v1` ServiceMonitor schema so
//! the spec block of a watched object deserializes directly into
//! [`MonitorSpec`]. Only the fields the operator consumes are modelled;
//! everything else is ignored on decode.

use crate::error::Result;
use crate::key::ObjectKey;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A monitoring-target descriptor with its identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorDescriptor {
    pub namespace: String,
    pub name: String,

    /// Opaque version stamp; equal versions mean an unchanged object
    #[serde(default)]
    pub resource_version: String,

    pub spec: MonitorSpec,
}

impl MonitorDescriptor {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, spec: MonitorSpec) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            resource_version: String::new(),
            spec,
        }
    }

    pub fn with_resource_version(mut self, version: impl Into<String>) -> Self {
        self.resource_version = version.into();
        self
    }

    /// Work-queue key of this descriptor
    pub fn key(&self) -> Result<ObjectKey> {
        ObjectKey::new(self.namespace.as_str(), self.name.as_str())
    }
}

/// What to scrape and how
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorSpec {
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,

    #[serde(default)]
    pub selector: LabelSelector,

    #[serde(default)]
    pub namespace_selector: NamespaceSelector,

    #[serde(default)]
    pub target_labels: Vec<String>,

    #[serde(default)]
    pub pod_target_labels: Vec<String>,

    /// Service label whose value overrides the `job` label
    #[serde(default)]
    pub job_label: String,

    /// Per-scrape sample limit; 0 is unbounded
    #[serde(default, deserialize_with = "non_negative_limit")]
    pub sample_limit: u64,

    /// Per-job target limit; 0 is unbounded
    #[serde(default, deserialize_with = "non_negative_limit")]
    pub target_limit: u64,
}

/// Limits are signed in the schema; negative values mean unbounded.
fn non_negative_limit<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let limit = i64::deserialize(deserializer)?;
    Ok(u64::try_from(limit).unwrap_or(0))
}

/// Label selector over service labels
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(default)]
    pub match_labels: BTreeMap<String, String>,

    #[serde(default)]
    pub match_expressions: Vec<LabelSelectorRequirement>,
}

/// One set-based selector requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSelectorRequirement {
    pub key: String,
    pub operator: SelectorOperator,
    #[serde(default)]
    pub values: Vec<String>,
}

/// Set-based selector operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectorOperator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
    /// Any operator name not listed above; produces no rule
    #[serde(other)]
    Unknown,
}

impl fmt::Display for SelectorOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SelectorOperator::In => "In",
            SelectorOperator::NotIn => "NotIn",
            SelectorOperator::Exists => "Exists",
            SelectorOperator::DoesNotExist => "DoesNotExist",
            SelectorOperator::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Which namespaces discovery should cover
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceSelector {
    #[serde(default)]
    pub any: bool,

    #[serde(default)]
    pub match_names: Vec<String>,
}

impl NamespaceSelector {
    /// Namespaces to restrict discovery to; empty means all namespaces.
    ///
    /// `any` wins over explicit names; with neither set the descriptor's own
    /// namespace is used.
    pub fn effective_namespaces(&self, own_namespace: &str) -> Vec<String> {
        if self.any {
            Vec::new()
        } else if self.match_names.is_empty() {
            vec![own_namespace.to_string()]
        } else {
            self.match_names.clone()
        }
    }
}

/// Numeric or named target port
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetPort {
    Int(i32),
    Str(String),
}

impl fmt::Display for TargetPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetPort::Int(port) => write!(f, "{}", port),
            TargetPort::Str(name) => f.write_str(name),
        }
    }
}

/// TLS options honoured when scraping an endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointTlsConfig {
    #[serde(default)]
    pub insecure_skip_verify: bool,

    #[serde(default)]
    pub server_name: String,
}

/// Relabel rule as written on a descriptor endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelabelConfig {
    #[serde(default)]
    pub source_labels: Vec<String>,

    #[serde(default)]
    pub separator: String,

    #[serde(default)]
    pub target_label: String,

    #[serde(default)]
    pub regex: String,

    #[serde(default)]
    pub modulus: u64,

    #[serde(default)]
    pub replacement: String,

    #[serde(default)]
    pub action: String,
}

/// One scrapeable port of the selected services
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// Named service port; takes precedence over `target_port`
    #[serde(default)]
    pub port: String,

    #[serde(default)]
    pub target_port: Option<TargetPort>,

    #[serde(default)]
    pub path: String,

    #[serde(default)]
    pub scheme: String,

    #[serde(default)]
    pub params: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub interval: String,

    #[serde(default)]
    pub scrape_timeout: String,

    #[serde(default)]
    pub tls_config: Option<EndpointTlsConfig>,

    #[serde(default)]
    pub bearer_token_file: String,

    #[serde(default)]
    pub honor_labels: bool,

    #[serde(default)]
    pub honor_timestamps: Option<bool>,

    #[serde(default, rename = "proxyUrl", alias = "proxyURL")]
    pub proxy_url: Option<String>,

    #[serde(default, rename = "relabelings", alias = "relabelConfigs")]
    pub relabel_configs: Vec<RelabelConfig>,

    #[serde(default, rename = "metricRelabelings", alias = "metricRelabelConfigs")]
    pub metric_relabel_configs: Vec<RelabelConfig>,
}

impl Endpoint {
    /// Endpoint selecting a named service port
    pub fn named_port(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Default::default()
        }
    }

    /// Endpoint selecting a target port
    pub fn target_port(port: TargetPort) -> Self {
        Self {
            target_port: Some(port),
            ..Default::default()
        }
    }
}
