//! Cluster watch feeding the descriptor store
//!
//! A list+watch stream of ServiceMonitor objects is applied to the
//! [`DescriptorStore`] and forwarded to the controller as [`WatchEvent`]s.
//! The store is always updated before the matching event is sent, so a
//! worker that picks up the key finds the body that triggered it. Once the
//! first full listing has been applied the store is marked synced.

use crate::error::{OperatorError, OperatorResult};
use futures::StreamExt;
use kube::api::{ApiResource, DynamicObject};
use kube::runtime::{watcher, WatchStreamExt};
use kube::Api;
use scrape_controller::{DescriptorCache, DescriptorStore, WatchEvent};
use scrape_types::{MonitorDescriptor, MonitorSpec, ObjectKey, ResourceKind};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// API resource descriptor for a watched kind
pub fn api_resource(kind: ResourceKind) -> ApiResource {
    ApiResource {
        group: kind.group().to_string(),
        version: kind.version().to_string(),
        api_version: format!("{}/{}", kind.group(), kind.version()),
        kind: kind.kind().to_string(),
        plural: kind.plural().to_string(),
    }
}

/// Decode a watched object into a descriptor.
pub fn decode(kind: ResourceKind, object: &DynamicObject) -> OperatorResult<MonitorDescriptor> {
    let metadata = &object.metadata;
    let namespace = metadata.namespace.clone().unwrap_or_default();
    let name = metadata.name.clone().unwrap_or_default();
    let invalid = |reason: String| OperatorError::InvalidObject {
        object: format!("{}/{}", namespace, name),
        reason,
    };

    if let Some(types) = &object.types {
        if ResourceKind::from_kind(&types.kind) != Some(kind) {
            return Err(invalid(format!("unexpected kind {:?}", types.kind)));
        }
    }

    let spec = match object.data.get("spec") {
        Some(spec) => serde_json::from_value::<MonitorSpec>(spec.clone())
            .map_err(|e| invalid(format!("invalid spec: {}", e)))?,
        None => MonitorSpec::default(),
    };

    let descriptor = MonitorDescriptor::new(namespace.as_str(), name.as_str(), spec)
        .with_resource_version(metadata.resource_version.clone().unwrap_or_default());
    descriptor.key().map_err(|e| invalid(e.to_string()))?;

    Ok(descriptor)
}

/// Applies watch events to the store and forwards them to the controller
pub struct Reflector {
    kind: ResourceKind,
    store: Arc<DescriptorStore>,
    events: mpsc::UnboundedSender<WatchEvent>,
    /// Keys seen during an in-progress relist
    relisting: Option<HashSet<ObjectKey>>,
}

impl Reflector {
    pub fn new(
        kind: ResourceKind,
        store: Arc<DescriptorStore>,
        events: mpsc::UnboundedSender<WatchEvent>,
    ) -> Self {
        Self {
            kind,
            store,
            events,
            relisting: None,
        }
    }

    /// Watch `api` until `shutdown` flips to `true`.
    pub async fn run(mut self, api: Api<DynamicObject>, mut shutdown: watch::Receiver<bool>) {
        info!(kind = self.kind.kind(), "Starting watch");
        let stream = watcher(api, watcher::Config::default()).default_backoff();
        let mut stream = std::pin::pin!(stream);

        loop {
            tokio::select! {
                _ = shutdown_requested(&mut shutdown) => break,
                next = stream.next() => match next {
                    Some(Ok(event)) => self.handle(event),
                    Some(Err(e)) => warn!(error = %e, "Watch error, retrying"),
                    None => break,
                },
            }
        }

        info!(kind = self.kind.kind(), "Watch stopped");
    }

    /// Apply one watch event.
    pub fn handle(&mut self, event: watcher::Event<DynamicObject>) {
        match event {
            watcher::Event::Init => {
                debug!("Relist started");
                self.relisting = Some(HashSet::new());
            }
            watcher::Event::InitApply(object) => {
                // Undecodable objects still exist; keep their cached body
                let key = self.apply(&object).or_else(|| object_key(&object));
                if let (Some(key), Some(seen)) = (key, self.relisting.as_mut()) {
                    seen.insert(key);
                }
            }
            watcher::Event::InitDone => {
                let seen = self.relisting.take().unwrap_or_default();
                for key in self.store.keys() {
                    if !seen.contains(&key) {
                        if let Some(gone) = self.store.remove(&key) {
                            debug!(key = %key, "Object vanished during relist");
                            self.send(WatchEvent::deleted(gone));
                        }
                    }
                }

                if !self.store.has_synced() {
                    info!(count = self.store.len(), "Cache synced");
                    self.store.mark_synced();
                }
            }
            watcher::Event::Apply(object) => {
                self.apply(&object);
            }
            watcher::Event::Delete(object) => self.delete(&object),
        }
    }

    fn apply(&self, object: &DynamicObject) -> Option<ObjectKey> {
        let descriptor = match decode(self.kind, object) {
            Ok(descriptor) => Arc::new(descriptor),
            Err(e) => {
                warn!(error = %e, "Skipping object");
                return None;
            }
        };
        let key = descriptor.key().ok()?;

        let event = match self.store.upsert(key.clone(), Arc::clone(&descriptor)) {
            Some(old) => WatchEvent::updated(old, descriptor),
            None => WatchEvent::added(descriptor),
        };
        self.send(event);

        Some(key)
    }

    fn delete(&self, object: &DynamicObject) {
        let decoded = decode(self.kind, object).map(Arc::new);
        let key = match &decoded {
            Ok(descriptor) => descriptor.key().ok(),
            Err(_) => object_key(object),
        };
        let Some(key) = key else {
            warn!("Skipping delete of object without a usable key");
            return;
        };

        let cached = self.store.remove(&key);
        let last_known = match (decoded, cached) {
            (Ok(descriptor), _) => descriptor,
            (Err(_), Some(cached)) => cached,
            (Err(e), None) => {
                warn!(error = %e, "Skipping delete of unknown object");
                return;
            }
        };

        self.send(WatchEvent::deleted(last_known));
    }

    fn send(&self, event: WatchEvent) {
        if self.events.send(event).is_err() {
            debug!("Controller has stopped, dropping watch event");
        }
    }
}

fn object_key(object: &DynamicObject) -> Option<ObjectKey> {
    let namespace = object.metadata.namespace.clone().unwrap_or_default();
    let name = object.metadata.name.clone()?;
    ObjectKey::new(namespace, name).ok()
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
