//! Error types for scrape-types

use thiserror::Error;

/// Errors raised while parsing or validating core types
#[derive(Debug, Error)]
pub enum TypesError {
    /// A `namespace/name` key could not be parsed or built
    #[error("invalid resource key '{0}'")]
    InvalidKey(String),

    /// A duration did not follow the Prometheus duration grammar
    #[error("not a valid duration string: {0:?}")]
    InvalidDuration(String),

    /// A relabel regex failed to compile
    #[error("invalid relabel regex {regex:?}: {source}")]
    InvalidRegex {
        regex: String,
        #[source]
        source: regex::Error,
    },
}

/// Result type for core type operations
pub type Result<T> = std::result::Result<T, TypesError>;
