//! Reconciliation controller
//!
//! Watch notifications update the tombstone store and enqueue keys; a fixed
//! pool of workers drains the queue, translates each descriptor and applies
//! the resulting jobs to the agent. Before any worker starts, a one-off drift
//! repair removes agent configs that no live descriptor accounts for.

use crate::backoff::BackoffPolicy;
use crate::error::{ControllerError, ControllerResult};
use crate::notification::{Change, WatchEvent};
use crate::queue::{WorkItem, WorkKind, WorkQueue};
use crate::recorder::{synced_message, EventSink, EventType, REASON_FAILED_SYNC, REASON_SYNCED};
use crate::store::DescriptorCache;
use crate::tombstone::TombstoneStore;
use scrape_agent_client::AgentConfigManager;
use scrape_translate::ConfigWriter;
use scrape_types::{MonitorDescriptor, ObjectKey};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, trace, warn};

/// Controller tuning
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Number of reconciliation workers
    pub workers: usize,

    /// How long to wait for the descriptor cache before giving up
    pub cache_sync_timeout: Duration,

    /// Retry policy for failed items
    pub backoff: BackoffPolicy,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            cache_sync_timeout: Duration::from_secs(60),
            backoff: BackoffPolicy::default(),
        }
    }
}

/// One worker per available CPU
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Keeps the agent's scrape jobs in step with the descriptor cache
pub struct Controller {
    cache: Arc<dyn DescriptorCache>,
    tombstones: TombstoneStore,
    queue: Arc<WorkQueue>,
    writer: ConfigWriter,
    manager: Arc<dyn AgentConfigManager>,
    events: Arc<dyn EventSink>,
    config: ControllerConfig,
}

impl Controller {
    pub fn new(
        cache: Arc<dyn DescriptorCache>,
        manager: Arc<dyn AgentConfigManager>,
        writer: ConfigWriter,
        events: Arc<dyn EventSink>,
        config: ControllerConfig,
    ) -> Self {
        let queue = Arc::new(WorkQueue::new(config.backoff));
        Self {
            cache,
            tombstones: TombstoneStore::new(),
            queue,
            writer,
            manager,
            events,
            config,
        }
    }

    pub fn queue(&self) -> &Arc<WorkQueue> {
        &self.queue
    }

    pub fn tombstones(&self) -> &TombstoneStore {
        &self.tombstones
    }

    /// Run until `shutdown` flips to `true` or the event stream ends.
    ///
    /// Waits for the cache to sync, repairs drift, then starts the workers
    /// and feeds them from `events`. Events that arrive before the workers
    /// start stay buffered in the channel.
    pub async fn run(
        self: Arc<Self>,
        mut events: mpsc::UnboundedReceiver<WatchEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> ControllerResult<()> {
        info!("Starting controller");

        info!("Warming up the cache");
        let sync_timeout = self.config.cache_sync_timeout;
        tokio::select! {
            biased;
            _ = shutdown_requested(&mut shutdown) => {
                info!("Shutdown requested before the cache synced");
                self.queue.shutdown();
                return Ok(());
            }
            synced = tokio::time::timeout(sync_timeout, self.cache.wait_synced()) => {
                if synced.is_err() {
                    self.queue.shutdown();
                    return Err(ControllerError::CacheSyncTimeout(sync_timeout));
                }
            }
        }

        if let Err(e) = self.repair_drift(&shutdown).await {
            self.queue.shutdown();
            return Err(e);
        }

        if *shutdown.borrow() {
            info!("Shutdown requested during drift repair");
            self.queue.shutdown();
            return Ok(());
        }

        let workers = self.spawn_workers();

        loop {
            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        info!("Watch stream closed");
                        break;
                    }
                },
            }
        }

        info!("Shutting down");
        self.queue.shutdown();
        for worker in workers {
            if let Err(e) = worker.await {
                error!(error = %e, "Worker task failed");
            }
        }
        info!("Controller stopped");

        Ok(())
    }

    fn spawn_workers(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        let count = self.config.workers.max(1);
        info!(workers = count, "Starting workers");

        (0..count)
            .map(|id| tokio::spawn(Arc::clone(self).run_worker(id)))
            .collect()
    }

    async fn run_worker(self: Arc<Self>, id: usize) {
        debug!(worker = id, "Worker started");
        while self.process_next().await {}
        debug!(worker = id, "Worker stopped");
    }

    /// Route one watch notification to the queue.
    pub fn handle_event(&self, event: WatchEvent) {
        trace!(kind = %event.kind, "Watch event");
        match event.change {
            Change::Added(descriptor) => {
                self.enqueue(&descriptor);
            }
            Change::Updated { old, new } => {
                if old.resource_version == new.resource_version {
                    debug!(
                        namespace = %new.namespace,
                        name = %new.name,
                        "Ignoring already-synced descriptor"
                    );
                    return;
                }
                self.enqueue(&new);
            }
            Change::Deleted(descriptor) => {
                self.enqueue_delete(descriptor);
            }
        }
    }

    /// Enqueue a sync, discarding any tombstone held for the key.
    pub fn enqueue(&self, descriptor: &MonitorDescriptor) -> bool {
        let Some(key) = key_of(descriptor) else {
            return false;
        };

        self.tombstones.evict(&key);
        trace!(key = %key, "Enqueuing sync");
        self.queue.add(key, WorkKind::Sync)
    }

    /// Record a tombstone for the key, then enqueue a delete.
    pub fn enqueue_delete(&self, descriptor: Arc<MonitorDescriptor>) -> bool {
        let Some(key) = key_of(&descriptor) else {
            return false;
        };

        self.tombstones.record_if_absent(key.clone(), descriptor);
        trace!(key = %key, "Enqueuing delete");
        self.queue.add(key, WorkKind::Delete)
    }

    /// Take one item off the queue and reconcile it.
    ///
    /// Returns `false` once the queue has shut down.
    pub async fn process_next(self: &Arc<Self>) -> bool {
        let Some(item) = self.queue.get().await else {
            return false;
        };

        let tombstone = match item.kind() {
            WorkKind::Delete => self.tombstones.get(item.key()),
            WorkKind::Sync => None,
        };

        match self.process_item(&item).await {
            Ok(Outcome::Completed) => {
                self.queue.forget(item.key());
                info!(key = %item.key(), kind = %item.kind(), "Sync complete");
            }
            Ok(Outcome::Interrupted) => {
                debug!(key = %item.key(), kind = %item.kind(), "Sync interrupted by shutdown");
            }
            Err(e) => self.handle_failure(&item, tombstone, e),
        }

        self.queue.done(&item);
        true
    }

    fn handle_failure(
        self: &Arc<Self>,
        item: &WorkItem,
        tombstone: Option<Arc<MonitorDescriptor>>,
        err: ControllerError,
    ) {
        let requeues = self.queue.num_requeues(item.key());

        if self.queue.policy().should_retry(requeues) {
            let attempt = self.queue.add_rate_limited(item.clone());
            warn!(
                key = %item.key(),
                kind = %item.kind(),
                attempt,
                error = %err,
                "Reconciliation failed, will retry"
            );
            return;
        }

        self.queue.forget(item.key());
        // Release the tombstone unless a newer notification is queued
        if let Some(tombstone) = tombstone {
            if !self.queue.is_pending(item.key()) {
                self.tombstones.remove_if_same(item.key(), &tombstone);
            }
        }
        error!(
            key = %item.key(),
            kind = %item.kind(),
            retries = requeues,
            error = %err,
            "Dropping item after exhausting retries"
        );
        self.events.emit(
            item.key(),
            EventType::Warning,
            REASON_FAILED_SYNC,
            &format!("giving up after {} retries: {}", requeues, err),
        );
    }

    #[instrument(skip(self, item), fields(key = %item.key(), kind = %item.kind()))]
    async fn process_item(&self, item: &WorkItem) -> ControllerResult<Outcome> {
        match item.kind() {
            WorkKind::Sync => self.sync_key(item.key()).await,
            WorkKind::Delete => self.delete_key(item.key()).await,
        }
    }

    async fn sync_key(&self, key: &ObjectKey) -> ControllerResult<Outcome> {
        let Some(descriptor) = self.cache.get(key) else {
            debug!("Descriptor no longer exists");
            return Ok(Outcome::Completed);
        };

        debug!("Creating or updating scrape configs");
        for job in self.writer.scrape_configs_for(&descriptor) {
            if self.queue.is_shutting_down() {
                debug!("Shutdown in progress, not applying remaining configs");
                return Ok(Outcome::Interrupted);
            }

            if let Err(e) = self.manager.upsert_config(&job).await {
                error!(config = %job.name, error = %e, "Failed to sync config");
                self.events
                    .emit(key, EventType::Warning, REASON_FAILED_SYNC, &e.to_string());
                return Err(ControllerError::Apply {
                    key: key.clone(),
                    source: e,
                });
            }

            self.events.emit(
                key,
                EventType::Normal,
                REASON_SYNCED,
                &synced_message(&job.name),
            );
        }

        Ok(Outcome::Completed)
    }

    async fn delete_key(&self, key: &ObjectKey) -> ControllerResult<Outcome> {
        let tombstone = self.tombstones.get(key);
        let Some(descriptor) = tombstone.clone().or_else(|| self.cache.get(key)) else {
            debug!("Descriptor no longer exists");
            return Ok(Outcome::Completed);
        };

        debug!("Calculating scrape configs to delete");
        for name in self.writer.job_names_for(&descriptor) {
            if self.queue.is_shutting_down() {
                debug!("Shutdown in progress, not deleting remaining configs");
                return Ok(Outcome::Interrupted);
            }

            if let Err(e) = self.manager.delete_config(&name).await {
                error!(config = %name, error = %e, "Failed to delete config");
                return Err(ControllerError::Apply {
                    key: key.clone(),
                    source: e,
                });
            }
        }

        if let Some(consumed) = tombstone {
            self.tombstones.remove_if_same(key, &consumed);
        }

        Ok(Outcome::Completed)
    }

    /// Delete agent configs no live descriptor would produce.
    ///
    /// Individual delete failures are logged and skipped. Stops early once
    /// `shutdown` is raised. Returns the names that were removed.
    pub async fn repair_drift(
        &self,
        shutdown: &watch::Receiver<bool>,
    ) -> ControllerResult<BTreeSet<String>> {
        info!("Fetching existing configs");
        let mut stale = self
            .manager
            .list_configs()
            .await
            .map_err(ControllerError::ListRemote)?;

        for descriptor in self.cache.list() {
            for name in self.writer.job_names_for(&descriptor) {
                stale.remove(&name);
            }
        }

        info!(
            count = stale.len(),
            "Cleaning up scrape configs removed while the operator was down"
        );

        let mut removed = BTreeSet::new();
        for name in stale {
            if *shutdown.borrow() {
                info!(removed = removed.len(), "Shutdown requested, stopping drift repair");
                break;
            }

            debug!(config = %name, "Cleaning up removed scrape config");
            match self.manager.delete_config(&name).await {
                Ok(_) => {
                    removed.insert(name);
                }
                Err(e) => {
                    error!(config = %name, error = %e, "Failed to clean up stale scrape config, ignoring");
                }
            }
        }

        Ok(removed)
    }
}

/// How far a work item got
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Completed,
    /// Shutdown began before every job was applied
    Interrupted,
}

fn key_of(descriptor: &MonitorDescriptor) -> Option<ObjectKey> {
    match descriptor.key() {
        Ok(key) => Some(key),
        Err(e) => {
            error!(
                namespace = %descriptor.namespace,
                name = %descriptor.name,
                error = %e,
                "Dropping notification with an unusable key"
            );
            None
        }
    }
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    // A dropped sender also means shutdown
    let _ = shutdown.wait_for(|stop| *stop).await;
}
