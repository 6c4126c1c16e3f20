//! Local cache of live descriptors
//!
//! The watch side fills a [`DescriptorStore`] and marks it synced once the
//! initial listing has been applied. The controller only reads it, through
//! the [`DescriptorCache`] trait.

use async_trait::async_trait;
use dashmap::DashMap;
use scrape_types::{MonitorDescriptor, ObjectKey};
use std::sync::Arc;
use tokio::sync::watch;

/// Read side of the descriptor cache
#[async_trait]
pub trait DescriptorCache: Send + Sync {
    fn get(&self, key: &ObjectKey) -> Option<Arc<MonitorDescriptor>>;

    /// Every live descriptor, in no particular order
    fn list(&self) -> Vec<Arc<MonitorDescriptor>>;

    fn has_synced(&self) -> bool;

    /// Resolve once the initial listing has been applied.
    async fn wait_synced(&self);
}

/// In-memory descriptor cache keyed by object key
#[derive(Debug)]
pub struct DescriptorStore {
    entries: DashMap<ObjectKey, Arc<MonitorDescriptor>>,
    synced: watch::Sender<bool>,
}

impl Default for DescriptorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DescriptorStore {
    pub fn new() -> Self {
        let (synced, _) = watch::channel(false);
        Self {
            entries: DashMap::new(),
            synced,
        }
    }

    /// Insert or replace a descriptor, returning the previous body.
    pub fn upsert(
        &self,
        key: ObjectKey,
        descriptor: Arc<MonitorDescriptor>,
    ) -> Option<Arc<MonitorDescriptor>> {
        self.entries.insert(key, descriptor)
    }

    pub fn remove(&self, key: &ObjectKey) -> Option<Arc<MonitorDescriptor>> {
        self.entries.remove(key).map(|(_, descriptor)| descriptor)
    }

    pub fn keys(&self) -> Vec<ObjectKey> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mark the initial listing as applied and release waiters.
    pub fn mark_synced(&self) {
        self.synced.send_replace(true);
    }
}

#[async_trait]
impl DescriptorCache for DescriptorStore {
    fn get(&self, key: &ObjectKey) -> Option<Arc<MonitorDescriptor>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    fn list(&self) -> Vec<Arc<MonitorDescriptor>> {
        self.entries
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    fn has_synced(&self) -> bool {
        *self.synced.borrow()
    }

    async fn wait_synced(&self) {
        let mut rx = self.synced.subscribe();
        // The sender lives as long as the store, so this only ends on sync
        let _ = rx.wait_for(|synced| *synced).await;
    }
}
