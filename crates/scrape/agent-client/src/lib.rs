//! Scrape Agent Client - keeps scrape jobs on the agent's config store
//!
//! The agent exposes a small REST API for named instance configs:
//!
//! | Call | Route | Accepted statuses |
//! |---|---|---|
//! | list | `GET /agent/api/v1/configs` | 200 |
//! | upsert | `POST /agent/api/v1/config/<name>` | 200 updated, 201 created |
//! | delete | `DELETE /agent/api/v1/config/<name>` | 200 deleted, 400 unknown name |
//!
//! [`GrafanaAgentClient`] implements this over HTTP; [`NoOpConfigManager`]
//! stands in when no agent is configured.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod client;
pub mod error;
pub mod manager;

pub use client::GrafanaAgentClient;
pub use error::{AgentClientError, Operation, Result};
pub use manager::{AgentConfigManager, DeleteOutcome, NoOpConfigManager, UpsertOutcome};
