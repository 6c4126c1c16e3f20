//! Snapshots of deleted descriptors
//!
//! A delete notification may be processed after the descriptor has left the
//! live cache. The last known body is kept here so the delete can still be
//! translated into the job names that the sync produced.

use dashmap::DashMap;
use scrape_types::{MonitorDescriptor, ObjectKey};
use std::sync::Arc;

/// Last known descriptor bodies keyed by object key
#[derive(Debug, Default)]
pub struct TombstoneStore {
    entries: DashMap<ObjectKey, Arc<MonitorDescriptor>>,
}

impl TombstoneStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a tombstone unless one is already held for `key`.
    ///
    /// Returns `true` if the snapshot was stored.
    pub fn record_if_absent(&self, key: ObjectKey, descriptor: Arc<MonitorDescriptor>) -> bool {
        let mut inserted = false;
        self.entries.entry(key).or_insert_with(|| {
            inserted = true;
            descriptor
        });
        inserted
    }

    /// Drop the tombstone for `key`, typically because the object came back.
    pub fn evict(&self, key: &ObjectKey) -> Option<Arc<MonitorDescriptor>> {
        self.entries.remove(key).map(|(_, descriptor)| descriptor)
    }

    pub fn get(&self, key: &ObjectKey) -> Option<Arc<MonitorDescriptor>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove the tombstone only if it is still the snapshot `consumed`.
    ///
    /// A delete that completes after a newer delete recorded a fresh snapshot
    /// leaves the fresh one in place.
    pub fn remove_if_same(&self, key: &ObjectKey, consumed: &Arc<MonitorDescriptor>) -> bool {
        self.entries
            .remove_if(key, |_, held| Arc::ptr_eq(held, consumed))
            .is_some()
    }

    pub fn contains(&self, key: &ObjectKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
