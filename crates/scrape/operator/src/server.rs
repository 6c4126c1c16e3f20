//! Operator wiring and lifecycle management

use crate::config::{AgentConfig, OperatorConfig};
use crate::credentials;
use crate::error::{OperatorError, OperatorResult};
use crate::reflector::{api_resource, Reflector};
use kube::api::DynamicObject;
use kube::Api;
use scrape_agent_client::{AgentConfigManager, GrafanaAgentClient, NoOpConfigManager};
use scrape_controller::{Controller, DescriptorStore, TracingEventSink};
use scrape_translate::ConfigWriter;
use scrape_types::ResourceKind;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

/// Pick the agent config manager for `config`.
///
/// An empty URL yields the no-op manager.
pub fn agent_manager(config: &AgentConfig) -> OperatorResult<Arc<dyn AgentConfigManager>> {
    if config.url.is_empty() {
        warn!("--agent-url not specified, cannot sync with grafana-agent");
        return Ok(Arc::new(NoOpConfigManager));
    }

    let client = GrafanaAgentClient::new(&config.url, config.request_timeout())?;
    info!(agent_url = %client.api_root(), "Syncing with grafana-agent");
    Ok(Arc::new(client))
}

/// The running operator
pub struct Operator {
    config: OperatorConfig,
}

impl Operator {
    pub fn new(config: OperatorConfig) -> Self {
        Self { config }
    }

    /// Run until a shutdown signal arrives or the controller fails.
    pub async fn run(self) -> OperatorResult<()> {
        let client = credentials::client(&self.config.kube).await?;
        let manager = agent_manager(&self.config.agent)?;
        let writer = ConfigWriter::new(self.config.remote_write.destination()?);
        info!(remote_write_url = %writer.remote_write().url, "Using remote-write destination");

        let kind = ResourceKind::ServiceMonitor;
        let store = Arc::new(DescriptorStore::new());
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let controller = Arc::new(Controller::new(
            store.clone(),
            manager,
            writer,
            Arc::new(TracingEventSink),
            self.config.controller.to_controller_config(),
        ));

        let api: Api<DynamicObject> = Api::all_with(client, &api_resource(kind));
        let reflector = Reflector::new(kind, store, event_tx);
        let watch_task = tokio::spawn(reflector.run(api, shutdown_rx.clone()));

        let mut controller_task = tokio::spawn(controller.run(event_rx, shutdown_rx));

        let joined = tokio::select! {
            _ = shutdown_signal() => {
                shutdown_tx.send_replace(true);
                controller_task.await
            }
            joined = &mut controller_task => joined,
        };

        info!("Shutting down");
        shutdown_tx.send_replace(true);
        if let Err(e) = watch_task.await {
            warn!(error = %e, "Watch task failed");
        }

        joined.map_err(|e| OperatorError::Task(e.to_string()))??;
        Ok(())
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
