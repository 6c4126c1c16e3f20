//! Scrape Types - Core types for the scrape-config operator
//!
//! The operator watches monitoring-target descriptors in the cluster and keeps
//! a scraping agent's configuration store in step with them. This crate holds
//! the vocabulary shared by every other crate in the workspace.
//!
//! ## Key Concepts
//!
//! - **MonitorDescriptor**: what to scrape and how, as declared in the cluster
//! - **ScrapeJobConfig**: one agent instance config derived from one descriptor endpoint
//! - **RelabelRule**: a single step of the ordered label-rewrite pipeline
//! - **ObjectKey**: the `namespace/name` identity used by the work queue
//! - **PromDuration**: Prometheus-style duration (`1m30s`)

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod descriptor;
pub mod duration;
pub mod error;
pub mod job;
pub mod key;
pub mod labels;
pub mod relabel;

// Re-export main types
pub use descriptor::{
    Endpoint, EndpointTlsConfig, LabelSelector, LabelSelectorRequirement, MonitorDescriptor,
    MonitorSpec, NamespaceSelector, RelabelConfig, SelectorOperator, TargetPort,
};
pub use duration::PromDuration;
pub use error::{Result, TypesError};
pub use job::{
    KubernetesSdConfig, NamespaceDiscovery, RemoteWriteConfig, ScrapeConfig, ScrapeJobConfig,
    SdRole, TlsConfig,
};
pub use key::{ObjectKey, ResourceKind};
pub use labels::sanitize_label_name;
pub use relabel::{RelabelAction, RelabelRegex, RelabelRule};
