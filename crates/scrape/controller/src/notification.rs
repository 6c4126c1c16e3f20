//! Change notifications delivered by the resource watch

use scrape_types::{MonitorDescriptor, ResourceKind};
use std::sync::Arc;

/// What happened to a watched object
#[derive(Debug, Clone)]
pub enum Change {
    Added(Arc<MonitorDescriptor>),
    Updated {
        old: Arc<MonitorDescriptor>,
        new: Arc<MonitorDescriptor>,
    },
    /// Carries the last known body of the removed object
    Deleted(Arc<MonitorDescriptor>),
}

/// A change to an object of a known resource kind
#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub kind: ResourceKind,
    pub change: Change,
}

impl WatchEvent {
    pub fn added(descriptor: Arc<MonitorDescriptor>) -> Self {
        Self {
            kind: ResourceKind::ServiceMonitor,
            change: Change::Added(descriptor),
        }
    }

    pub fn updated(old: Arc<MonitorDescriptor>, new: Arc<MonitorDescriptor>) -> Self {
        Self {
            kind: ResourceKind::ServiceMonitor,
            change: Change::Updated { old, new },
        }
    }

    pub fn deleted(descriptor: Arc<MonitorDescriptor>) -> Self {
        Self {
            kind: ResourceKind::ServiceMonitor,
            change: Change::Deleted(descriptor),
        }
    }
}
