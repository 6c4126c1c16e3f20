//! Shared fixtures for controller tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use scrape_agent_client::{
    AgentClientError, AgentConfigManager, DeleteOutcome, Operation, Result, UpsertOutcome,
};
use scrape_controller::{
    BackoffPolicy, BroadcastEventSink, Controller, ControllerConfig, DescriptorStore, WatchEvent,
    WorkQueue,
};
use scrape_translate::ConfigWriter;
use scrape_types::{Endpoint, MonitorDescriptor, MonitorSpec, RemoteWriteConfig, ScrapeJobConfig};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// A call observed by [`FakeAgent`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List,
    Upsert(String),
    Delete(String),
}

/// In-memory agent config store with scriptable failures
#[derive(Debug, Default)]
pub struct FakeAgent {
    configs: Mutex<BTreeSet<String>>,
    calls: Mutex<Vec<Call>>,
    /// Remaining forced failures per config name
    failures: Mutex<HashMap<String, u32>>,
    fail_list: Mutex<bool>,
    /// Raised after the first delete call
    shutdown_on_delete: Mutex<Option<watch::Sender<bool>>>,
    /// Shut down after the first successful upsert
    stop_queue_on_upsert: Mutex<Option<Arc<WorkQueue>>>,
}

impl FakeAgent {
    pub fn with_configs<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let agent = Self::default();
        agent
            .configs
            .lock()
            .extend(names.into_iter().map(Into::into));
        agent
    }

    /// Fail the next `times` calls touching `name`.
    pub fn fail(&self, name: &str, times: u32) {
        self.failures.lock().insert(name.to_string(), times);
    }

    pub fn fail_list(&self) {
        *self.fail_list.lock() = true;
    }

    /// Raise `shutdown` once a delete has been issued.
    pub fn shutdown_on_delete(&self, shutdown: watch::Sender<bool>) {
        *self.shutdown_on_delete.lock() = Some(shutdown);
    }

    /// Shut `queue` down once an upsert has succeeded.
    pub fn stop_queue_on_upsert(&self, queue: Arc<WorkQueue>) {
        *self.stop_queue_on_upsert.lock() = Some(queue);
    }

    pub fn configs(&self) -> BTreeSet<String> {
        self.configs.lock().clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn upserts(&self, name: &str) -> usize {
        self.count(&Call::Upsert(name.to_string()))
    }

    pub fn deletes(&self, name: &str) -> usize {
        self.count(&Call::Delete(name.to_string()))
    }

    fn count(&self, call: &Call) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    fn take_failure(&self, operation: Operation, name: &str) -> Result<()> {
        let mut failures = self.failures.lock();
        match failures.get_mut(name) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(AgentClientError::UnexpectedStatus {
                    operation,
                    status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                })
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl AgentConfigManager for FakeAgent {
    async fn list_configs(&self) -> Result<BTreeSet<String>> {
        self.calls.lock().push(Call::List);
        if *self.fail_list.lock() {
            return Err(AgentClientError::UnexpectedStatus {
                operation: Operation::ListScrapeConfigs,
                status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            });
        }
        Ok(self.configs())
    }

    async fn upsert_config(&self, config: &ScrapeJobConfig) -> Result<UpsertOutcome> {
        self.calls.lock().push(Call::Upsert(config.name.clone()));
        self.take_failure(Operation::UpdateScrapeConfig, &config.name)?;
        if let Some(queue) = self.stop_queue_on_upsert.lock().take() {
            queue.shutdown();
        }

        if self.configs.lock().insert(config.name.clone()) {
            Ok(UpsertOutcome::Created)
        } else {
            Ok(UpsertOutcome::Updated)
        }
    }

    async fn delete_config(&self, name: &str) -> Result<DeleteOutcome> {
        self.calls.lock().push(Call::Delete(name.to_string()));
        if let Some(shutdown) = self.shutdown_on_delete.lock().take() {
            shutdown.send_replace(true);
        }
        self.take_failure(Operation::DeleteScrapeConfig, name)?;

        if self.configs.lock().remove(name) {
            Ok(DeleteOutcome::Deleted)
        } else {
            Ok(DeleteOutcome::Absent)
        }
    }
}

/// Descriptor in `myapp` with `endpoints` named-port endpoints
pub fn descriptor(name: &str, endpoints: usize, version: &str) -> Arc<MonitorDescriptor> {
    let spec = MonitorSpec {
        endpoints: (0..endpoints)
            .map(|i| Endpoint::named_port(format!("http-{}", i)))
            .collect(),
        ..Default::default()
    };
    Arc::new(MonitorDescriptor::new("myapp", name, spec).with_resource_version(version))
}

pub fn fast_config() -> ControllerConfig {
    ControllerConfig {
        workers: 4,
        cache_sync_timeout: Duration::from_secs(5),
        backoff: BackoffPolicy::new(Duration::from_millis(1), Duration::from_millis(20), 15),
    }
}

/// A controller wired to in-memory collaborators
pub struct Harness {
    pub store: Arc<DescriptorStore>,
    pub agent: Arc<FakeAgent>,
    pub sink: BroadcastEventSink,
    pub controller: Arc<Controller>,
}

impl Harness {
    pub fn new(agent: FakeAgent, config: ControllerConfig) -> Self {
        let store = Arc::new(DescriptorStore::new());
        let agent = Arc::new(agent);
        let sink = BroadcastEventSink::default();
        let controller = Arc::new(Controller::new(
            store.clone(),
            agent.clone(),
            ConfigWriter::new(RemoteWriteConfig::with_url("http://cortex/api/prom/push")),
            Arc::new(sink.clone()),
            config,
        ));

        Self {
            store,
            agent,
            sink,
            controller,
        }
    }

    /// Put a descriptor in the cache, the way the watch side does before
    /// announcing it
    pub fn insert(&self, descriptor: &Arc<MonitorDescriptor>) {
        self.store
            .upsert(descriptor.key().unwrap(), Arc::clone(descriptor));
    }

    pub fn remove(&self, descriptor: &Arc<MonitorDescriptor>) {
        self.store.remove(&descriptor.key().unwrap());
    }

    /// Start the controller and return its event and shutdown handles.
    pub fn start(&self) -> Running {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(Arc::clone(&self.controller).run(events_rx, shutdown_rx));

        Running {
            events,
            shutdown,
            task,
        }
    }
}

pub struct Running {
    pub events: mpsc::UnboundedSender<WatchEvent>,
    pub shutdown: watch::Sender<bool>,
    pub task: JoinHandle<scrape_controller::ControllerResult<()>>,
}

impl Running {
    pub fn send(&self, event: WatchEvent) {
        self.events.send(event).unwrap();
    }

    pub async fn stop(self) {
        self.shutdown.send_replace(true);
        tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("controller did not stop")
            .unwrap()
            .unwrap();
    }
}

/// Poll `condition` until it holds or five seconds pass.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
