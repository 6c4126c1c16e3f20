//! Event recording side channel
//!
//! The controller reports per-object outcomes through an [`EventSink`]. It
//! does not depend on where they end up.

use scrape_types::ObjectKey;
use std::fmt;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Reason recorded when a job was applied
pub const REASON_SYNCED: &str = "Synced";

/// Reason recorded when applying a job failed
pub const REASON_FAILED_SYNC: &str = "FailedSync";

/// Message recorded for each applied job
pub fn synced_message(job_name: &str) -> String {
    format!("Scrape Configuration '{}' synced with agent", job_name)
}

/// Severity of a recorded event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Normal,
    Warning,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Normal => f.write_str("Normal"),
            EventType::Warning => f.write_str("Warning"),
        }
    }
}

/// One recorded event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub subject: ObjectKey,
    pub event_type: EventType,
    pub reason: String,
    pub message: String,
}

/// Destination for per-object events
pub trait EventSink: Send + Sync {
    fn emit(&self, subject: &ObjectKey, event_type: EventType, reason: &str, message: &str);
}

/// Writes events to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, subject: &ObjectKey, event_type: EventType, reason: &str, message: &str) {
        match event_type {
            EventType::Normal => info!(object = %subject, reason, "{}", message),
            EventType::Warning => warn!(object = %subject, reason, "{}", message),
        }
    }
}

/// Fans events out to any number of subscribers
#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
    tx: broadcast::Sender<RecordedEvent>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecordedEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastEventSink {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl EventSink for BroadcastEventSink {
    fn emit(&self, subject: &ObjectKey, event_type: EventType, reason: &str, message: &str) {
        // No subscribers is fine
        let _ = self.tx.send(RecordedEvent {
            subject: subject.clone(),
            event_type,
            reason: reason.to_string(),
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_sink_delivers() {
        let sink = BroadcastEventSink::default();
        let mut rx = sink.subscribe();
        let subject = ObjectKey::new("myapp", "dummy").unwrap();

        sink.emit(
            &subject,
            EventType::Normal,
            REASON_SYNCED,
            &synced_message("myapp/dummy/0"),
        );

        let event = rx.recv().await.unwrap();
        assert_eq!(event.subject, subject);
        assert_eq!(event.event_type, EventType::Normal);
        assert_eq!(event.reason, "Synced");
        assert_eq!(
            event.message,
            "Scrape Configuration 'myapp/dummy/0' synced with agent"
        );
    }

    #[test]
    fn test_broadcast_sink_without_subscribers() {
        let sink = BroadcastEventSink::new(4);
        let subject = ObjectKey::new("myapp", "dummy").unwrap();
        sink.emit(&subject, EventType::Warning, REASON_FAILED_SYNC, "boom");
    }
}
