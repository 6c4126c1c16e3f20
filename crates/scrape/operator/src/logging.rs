//! Logging bootstrap

use crate::config::LoggingConfig;
use crate::error::{OperatorError, OperatorResult};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Map a verbosity name onto a tracing level directive.
///
/// Accepts `panic`, `fatal`, `error`, `warning`, `warn`, `info`, `debug`
/// and `trace`, case-insensitively.
pub fn level_directive(verbosity: &str) -> OperatorResult<&'static str> {
    match verbosity.to_ascii_lowercase().as_str() {
        "panic" | "fatal" | "error" => Ok("error"),
        "warning" | "warn" => Ok("warn"),
        "info" => Ok("info"),
        "debug" => Ok("debug"),
        "trace" => Ok("trace"),
        other => Err(OperatorError::Config(format!(
            "not a valid verbosity: {:?}",
            other
        ))),
    }
}

/// Install the global subscriber. `RUST_LOG` takes precedence over the
/// configured level.
pub fn init(config: &LoggingConfig) -> OperatorResult<()> {
    let level = level_directive(&config.level)?;
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into());

    if config.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    Ok(())
}
