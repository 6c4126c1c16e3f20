//! Scrape Operator - ServiceMonitor to grafana-agent sync
//!
//! This crate wires the operator together:
//! - Layered configuration and command line flags
//! - Logging bootstrap
//! - Cluster credential resolution
//! - The list+watch reflector feeding the controller
//! - Signal handling and lifecycle

#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod reflector;
pub mod server;

pub use cli::Cli;
pub use config::OperatorConfig;
pub use error::{OperatorError, OperatorResult};
pub use server::Operator;
