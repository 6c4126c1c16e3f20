//! Scrape Controller - reconciliation loop for monitor descriptors
//!
//! Watch notifications arrive as [`WatchEvent`]s. The [`Controller`] keeps a
//! [`TombstoneStore`] of deleted bodies, feeds keys into a deduplicating
//! [`WorkQueue`], and runs a pool of workers that translate descriptors and
//! apply the resulting jobs through an
//! [`AgentConfigManager`](scrape_agent_client::AgentConfigManager).
//!
//! ## Guarantees
//!
//! - At most one worker handles a given key at a time
//! - A newer notification for a key always wins over a pending or retrying one
//! - A delete still resolves the right job names after the descriptor has
//!   left the cache
//! - Failed keys retry with per-key exponential backoff, and one key's
//!   failures never block another key
//! - Agent configs left behind while the operator was down are removed once
//!   on startup, before any worker runs

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod backoff;
pub mod controller;
pub mod error;
pub mod notification;
pub mod queue;
pub mod recorder;
pub mod store;
pub mod tombstone;

// Re-export main types
pub use backoff::BackoffPolicy;
pub use controller::{default_workers, Controller, ControllerConfig};
pub use error::{ControllerError, ControllerResult};
pub use notification::{Change, WatchEvent};
pub use queue::{WorkItem, WorkKind, WorkQueue};
pub use recorder::{
    synced_message, BroadcastEventSink, EventSink, EventType, RecordedEvent, TracingEventSink,
    REASON_FAILED_SYNC, REASON_SYNCED,
};
pub use store::{DescriptorCache, DescriptorStore};
pub use tombstone::TombstoneStore;
