//! Scrape Operator
//!
//! Watches ServiceMonitors and keeps a grafana-agent scraping service's
//! instance configs in step with them.

use clap::Parser;
use scrape_operator::{logging, Cli, Operator, OperatorConfig, OperatorError, OperatorResult};

#[tokio::main]
async fn main() -> OperatorResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = OperatorConfig::load(cli.config.as_deref())
        .map_err(|e| OperatorError::Config(e.to_string()))?;

    // Override with CLI args
    cli.apply(&mut config);

    logging::init(&config.logging)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        in_cluster = config.kube.in_cluster,
        "Starting scrape-operator"
    );

    Operator::new(config).run().await
}
