//! Deduplicating, rate-limited work queue
//!
//! Holds at most one pending item per key. A newer enqueue for a key that is
//! already pending replaces the pending kind, so a sync cancels a pending
//! delete and vice versa. A key handed to a worker is not handed out again
//! until that worker calls [`WorkQueue::done`]; if it was re-enqueued in the
//! meantime it becomes ready at that point.
//!
//! Every direct enqueue stamps the key with a new generation. Delayed retries
//! carry the generation of the item that failed and are discarded if the key
//! has been enqueued again since, so a stale retry can never overtake a newer
//! notification.

use crate::backoff::BackoffPolicy;
use parking_lot::Mutex;
use scrape_types::ObjectKey;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::trace;

/// What a worker should do with a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkKind {
    /// Create or update the key's scrape jobs
    Sync,
    /// Remove the key's scrape jobs
    Delete,
}

impl fmt::Display for WorkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkKind::Sync => f.write_str("sync"),
            WorkKind::Delete => f.write_str("delete"),
        }
    }
}

/// A dequeued unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    key: ObjectKey,
    kind: WorkKind,
    generation: u64,
}

impl WorkItem {
    pub fn key(&self) -> &ObjectKey {
        &self.key
    }

    pub fn kind(&self) -> WorkKind {
        self.kind
    }

    pub fn is_delete(&self) -> bool {
        self.kind == WorkKind::Delete
    }
}

#[derive(Debug, Default)]
struct QueueState {
    /// Keys ready to hand out, oldest first
    ready: VecDeque<ObjectKey>,
    /// Latest pending kind and generation per key
    pending: HashMap<ObjectKey, (WorkKind, u64)>,
    /// Keys currently held by a worker
    processing: HashSet<ObjectKey>,
    /// Generation of the most recent direct enqueue per key
    generations: HashMap<ObjectKey, u64>,
    /// Consecutive failures per key
    failures: HashMap<ObjectKey, u32>,
    next_generation: u64,
    shutting_down: bool,
}

/// Work queue shared by the event path and the worker pool
#[derive(Debug)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    policy: BackoffPolicy,
}

impl WorkQueue {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            policy,
        }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Enqueue `key` for `kind`.
    ///
    /// Returns `false` once the queue is shutting down.
    pub fn add(&self, key: ObjectKey, kind: WorkKind) -> bool {
        let mut state = self.state.lock();
        if state.shutting_down {
            return false;
        }

        state.next_generation += 1;
        let generation = state.next_generation;
        state.generations.insert(key.clone(), generation);

        trace!(key = %key, kind = %kind, generation, "Enqueued");
        self.push(&mut state, key, kind, generation);
        true
    }

    fn push(&self, state: &mut QueueState, key: ObjectKey, kind: WorkKind, generation: u64) {
        let already_pending = state
            .pending
            .insert(key.clone(), (kind, generation))
            .is_some();

        if already_pending || state.processing.contains(&key) {
            return;
        }

        state.ready.push_back(key);
        self.notify.notify_one();
    }

    /// Wait for the next item; `None` once the queue is shutting down.
    pub async fn get(&self) -> Option<WorkItem> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock();
                if state.shutting_down {
                    return None;
                }
                while let Some(key) = state.ready.pop_front() {
                    if let Some((kind, generation)) = state.pending.remove(&key) {
                        state.processing.insert(key.clone());
                        return Some(WorkItem {
                            key,
                            kind,
                            generation,
                        });
                    }
                }
            }

            notified.await;
        }
    }

    /// Release a key handed out by [`get`](Self::get).
    pub fn done(&self, item: &WorkItem) {
        let mut state = self.state.lock();
        state.processing.remove(&item.key);

        if state.pending.contains_key(&item.key) && !state.shutting_down {
            state.ready.push_back(item.key.clone());
            self.notify.notify_one();
        }
    }

    /// Requeue a failed item after its key's backoff delay.
    ///
    /// Returns the key's consecutive failure count.
    pub fn add_rate_limited(self: &Arc<Self>, item: WorkItem) -> u32 {
        let (failures, delay) = {
            let mut state = self.state.lock();
            let failures = state.failures.entry(item.key.clone()).or_insert(0);
            *failures += 1;
            (*failures, self.policy.delay_for(*failures))
        };

        trace!(key = %item.key, failures, delay_ms = delay.as_millis() as u64, "Requeue scheduled");
        self.requeue_after(item, delay);
        failures
    }

    fn requeue_after(self: &Arc<Self>, item: WorkItem, delay: Duration) {
        if delay.is_zero() {
            self.requeue(item);
            return;
        }

        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.requeue(item);
        });
    }

    fn requeue(&self, item: WorkItem) {
        let mut state = self.state.lock();
        if state.shutting_down {
            return;
        }
        if state.generations.get(&item.key) != Some(&item.generation) {
            trace!(key = %item.key, "Discarding superseded retry");
            return;
        }

        self.push(&mut state, item.key, item.kind, item.generation);
    }

    /// Number of times `key` has been requeued since it was last forgotten
    pub fn num_requeues(&self, key: &ObjectKey) -> u32 {
        self.state.lock().failures.get(key).copied().unwrap_or(0)
    }

    /// Clear retry state for `key`.
    pub fn forget(&self, key: &ObjectKey) {
        let mut state = self.state.lock();
        state.failures.remove(key);
        if !state.pending.contains_key(key) {
            state.generations.remove(key);
        }
    }

    /// Stop handing out work and wake every waiting worker.
    pub fn shutdown(&self) {
        self.state.lock().shutting_down = true;
        self.notify.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state.lock().shutting_down
    }

    /// Whether `key` has been enqueued and not yet handed out
    pub fn is_pending(&self, key: &ObjectKey) -> bool {
        self.state.lock().pending.contains_key(key)
    }

    /// Number of keys waiting to be processed
    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
