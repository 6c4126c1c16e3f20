//! End-to-end reconciliation against an in-memory agent

mod common;

use common::{descriptor, eventually, fast_config, Call, FakeAgent, Harness, Running};
use scrape_controller::{
    BackoffPolicy, ControllerConfig, ControllerError, EventType, WatchEvent, REASON_FAILED_SYNC,
    REASON_SYNCED,
};
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::sync::watch;

// ============================================================================
// Sync
// ============================================================================

#[tokio::test]
async fn test_added_descriptor_syncs_every_endpoint() {
    let harness = Harness::new(FakeAgent::default(), fast_config());
    let mut events = harness.sink.subscribe();
    harness.store.mark_synced();
    let running = harness.start();

    let monitor = descriptor("web", 2, "1");
    harness.insert(&monitor);
    running.send(WatchEvent::added(monitor));

    let agent = harness.agent.clone();
    eventually(|| agent.configs().len() == 2).await;
    assert_eq!(
        harness.agent.configs(),
        BTreeSet::from(["myapp/web/0".to_string(), "myapp/web/1".to_string()])
    );

    let first = events.recv().await.unwrap();
    let second = events.recv().await.unwrap();
    assert_eq!(first.event_type, EventType::Normal);
    assert_eq!(first.reason, REASON_SYNCED);
    assert_eq!(
        first.message,
        "Scrape Configuration 'myapp/web/0' synced with agent"
    );
    assert_eq!(
        second.message,
        "Scrape Configuration 'myapp/web/1' synced with agent"
    );

    running.stop().await;
}

#[tokio::test]
async fn test_unchanged_update_is_not_applied() {
    let harness = Harness::new(FakeAgent::default(), fast_config());
    harness.store.mark_synced();
    let running = harness.start();

    let monitor = descriptor("web", 1, "5");
    harness.insert(&monitor);
    running.send(WatchEvent::updated(monitor.clone(), monitor.clone()));
    let marker = descriptor("marker", 1, "1");
    harness.insert(&marker);
    running.send(WatchEvent::added(marker));

    let agent = harness.agent.clone();
    eventually(|| agent.upserts("myapp/marker/0") == 1).await;
    assert_eq!(harness.agent.upserts("myapp/web/0"), 0);

    running.stop().await;
}

#[tokio::test]
async fn test_vanished_descriptor_is_dropped() {
    let harness = Harness::new(FakeAgent::default(), fast_config());
    harness.store.mark_synced();
    let running = harness.start();

    // Announced but already gone from the cache by the time a worker runs
    running.send(WatchEvent::added(descriptor("gone", 1, "1")));
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(harness
        .agent
        .calls()
        .iter()
        .all(|call| matches!(call, Call::List)));
    assert!(harness.controller.queue().is_empty());

    running.stop().await;
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test]
async fn test_delete_uses_tombstone_after_cache_removal() {
    let harness = Harness::new(FakeAgent::default(), fast_config());
    harness.store.mark_synced();
    let running = harness.start();

    let monitor = descriptor("web", 2, "1");
    harness.insert(&monitor);
    running.send(WatchEvent::added(monitor.clone()));
    let agent = harness.agent.clone();
    eventually(|| agent.configs().len() == 2).await;

    harness.remove(&monitor);
    running.send(WatchEvent::deleted(monitor.clone()));

    eventually(|| agent.configs().is_empty()).await;
    assert_eq!(harness.agent.deletes("myapp/web/0"), 1);
    assert_eq!(harness.agent.deletes("myapp/web/1"), 1);

    let tombstones = harness.controller.clone();
    eventually(|| tombstones.tombstones().is_empty()).await;

    running.stop().await;
}

#[tokio::test]
async fn test_abandoned_delete_releases_tombstone() {
    let agent = FakeAgent::with_configs(["myapp/web/0"]);
    agent.fail("myapp/web/0", u32::MAX);
    let config = ControllerConfig {
        backoff: BackoffPolicy::new(Duration::from_millis(1), Duration::from_millis(1), 1),
        ..fast_config()
    };
    let harness = Harness::new(agent, config);

    let monitor = descriptor("web", 1, "1");
    harness.controller.handle_event(WatchEvent::deleted(monitor.clone()));
    assert_eq!(harness.controller.tombstones().len(), 1);

    // First attempt plus one retry, then the key is dropped
    assert!(harness.controller.process_next().await);
    assert!(harness.controller.process_next().await);

    assert_eq!(harness.agent.deletes("myapp/web/0"), 2);
    assert!(harness.controller.tombstones().is_empty());
    assert!(harness.controller.queue().is_empty());
    assert_eq!(harness.controller.queue().num_requeues(&monitor.key().unwrap()), 0);
}

#[tokio::test]
async fn test_recreated_descriptor_is_synced_not_deleted() {
    let harness = Harness::new(FakeAgent::default(), fast_config());

    // Deleted then re-created before any worker runs
    let old = descriptor("web", 1, "1");
    let new = descriptor("web", 1, "2");
    harness.insert(&new);
    harness.controller.handle_event(WatchEvent::deleted(old));
    harness.controller.handle_event(WatchEvent::added(new));

    harness.store.mark_synced();
    let running = harness.start();

    let agent = harness.agent.clone();
    eventually(|| agent.upserts("myapp/web/0") == 1).await;
    assert_eq!(harness.agent.deletes("myapp/web/0"), 0);
    assert!(harness.controller.tombstones().is_empty());

    running.stop().await;
}

// ============================================================================
// Drift repair
// ============================================================================

#[tokio::test]
async fn test_drift_repair_deletes_only_orphans() {
    let agent = FakeAgent::with_configs(["myapp/a/0", "myapp/b/0", "myapp/c/0"]);
    let harness = Harness::new(agent, fast_config());
    for name in ["b", "c", "d"] {
        harness.insert(&descriptor(name, 1, "1"));
    }
    harness.store.mark_synced();
    let (_shutdown, shutdown_rx) = watch::channel(false);

    let removed = harness.controller.repair_drift(&shutdown_rx).await.unwrap();

    assert_eq!(removed, BTreeSet::from(["myapp/a/0".to_string()]));
    assert_eq!(
        harness.agent.calls(),
        vec![Call::List, Call::Delete("myapp/a/0".to_string())]
    );
}

#[tokio::test]
async fn test_drift_repair_ignores_delete_failures() {
    let agent = FakeAgent::with_configs(["myapp/a/0", "myapp/x/0"]);
    agent.fail("myapp/a/0", 1);
    let harness = Harness::new(agent, fast_config());
    let (_shutdown, shutdown_rx) = watch::channel(false);

    let removed = harness.controller.repair_drift(&shutdown_rx).await.unwrap();

    assert_eq!(removed, BTreeSet::from(["myapp/x/0".to_string()]));
    assert_eq!(harness.agent.deletes("myapp/a/0"), 1);
}

#[tokio::test]
async fn test_drift_repair_stops_on_shutdown() {
    let agent = FakeAgent::with_configs(["myapp/a/0", "myapp/b/0", "myapp/c/0"]);
    let harness = Harness::new(agent, fast_config());
    let (shutdown, shutdown_rx) = watch::channel(false);
    harness.agent.shutdown_on_delete(shutdown);

    let removed = harness.controller.repair_drift(&shutdown_rx).await.unwrap();

    assert_eq!(removed, BTreeSet::from(["myapp/a/0".to_string()]));
    assert_eq!(
        harness.agent.calls(),
        vec![Call::List, Call::Delete("myapp/a/0".to_string())]
    );
}

#[tokio::test]
async fn test_shutdown_during_drift_repair_starts_no_workers() {
    let agent = FakeAgent::with_configs(["myapp/a/0", "myapp/b/0"]);
    let harness = Harness::new(agent, fast_config());
    let monitor = descriptor("web", 1, "1");
    harness.insert(&monitor);
    harness.controller.handle_event(WatchEvent::added(monitor));
    harness.store.mark_synced();

    let Running {
        events: _events,
        shutdown,
        task,
    } = harness.start();
    harness.agent.shutdown_on_delete(shutdown);
    let result = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();

    assert!(result.is_ok());
    assert!(harness.controller.queue().is_shutting_down());
    assert_eq!(harness.agent.upserts("myapp/web/0"), 0);
    assert_eq!(harness.agent.deletes("myapp/b/0"), 0);
}

#[tokio::test]
async fn test_drift_repair_runs_before_workers() {
    let agent = FakeAgent::with_configs(["myapp/stale/0"]);
    let harness = Harness::new(agent, fast_config());
    let monitor = descriptor("web", 1, "1");
    harness.insert(&monitor);
    harness.controller.handle_event(WatchEvent::added(monitor));
    harness.store.mark_synced();

    let running = harness.start();
    let agent = harness.agent.clone();
    eventually(|| agent.upserts("myapp/web/0") == 1).await;

    assert_eq!(
        harness.agent.calls(),
        vec![
            Call::List,
            Call::Delete("myapp/stale/0".to_string()),
            Call::Upsert("myapp/web/0".to_string()),
        ]
    );

    running.stop().await;
}

#[tokio::test]
async fn test_list_failure_is_fatal() {
    let agent = FakeAgent::default();
    agent.fail_list();
    let harness = Harness::new(agent, fast_config());
    harness.store.mark_synced();

    let running = harness.start();
    let result = tokio::time::timeout(Duration::from_secs(5), running.task)
        .await
        .unwrap()
        .unwrap();

    assert!(matches!(result, Err(ControllerError::ListRemote(_))));
}

// ============================================================================
// Retries
// ============================================================================

#[tokio::test]
async fn test_transient_failures_converge() {
    let agent = FakeAgent::default();
    agent.fail("myapp/web/0", 3);
    let harness = Harness::new(agent, fast_config());
    let mut events = harness.sink.subscribe();
    harness.store.mark_synced();
    let running = harness.start();

    let monitor = descriptor("web", 1, "1");
    harness.insert(&monitor);
    running.send(WatchEvent::added(monitor.clone()));

    let agent = harness.agent.clone();
    eventually(|| agent.configs().contains("myapp/web/0")).await;
    assert_eq!(harness.agent.upserts("myapp/web/0"), 4);

    let key = monitor.key().unwrap();
    let controller = harness.controller.clone();
    eventually(|| controller.queue().num_requeues(&key) == 0).await;

    let mut reasons = Vec::new();
    for _ in 0..4 {
        reasons.push(events.recv().await.unwrap().reason);
    }
    assert_eq!(
        reasons,
        vec![
            REASON_FAILED_SYNC,
            REASON_FAILED_SYNC,
            REASON_FAILED_SYNC,
            REASON_SYNCED
        ]
    );

    running.stop().await;
}

#[tokio::test]
async fn test_exhausted_retries_drop_the_key() {
    let agent = FakeAgent::default();
    agent.fail("myapp/web/0", u32::MAX);
    let config = ControllerConfig {
        backoff: BackoffPolicy::new(Duration::from_millis(1), Duration::from_millis(5), 2),
        ..fast_config()
    };
    let harness = Harness::new(agent, config);
    let mut events = harness.sink.subscribe();
    harness.store.mark_synced();
    let running = harness.start();

    let monitor = descriptor("web", 1, "1");
    harness.insert(&monitor);
    running.send(WatchEvent::added(monitor.clone()));

    let mut gave_up = None;
    while gave_up.is_none() {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        if event.message.starts_with("giving up") {
            gave_up = Some(event);
        }
    }

    let event = gave_up.unwrap();
    assert_eq!(event.event_type, EventType::Warning);
    assert_eq!(event.reason, REASON_FAILED_SYNC);
    assert_eq!(harness.agent.upserts("myapp/web/0"), 3);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.agent.upserts("myapp/web/0"), 3);
    assert_eq!(harness.controller.queue().num_requeues(&monitor.key().unwrap()), 0);

    running.stop().await;
}

#[tokio::test]
async fn test_failing_key_does_not_block_others() {
    let agent = FakeAgent::default();
    agent.fail("myapp/broken/0", u32::MAX);
    let harness = Harness::new(agent, fast_config());
    harness.store.mark_synced();
    let running = harness.start();

    let broken = descriptor("broken", 1, "1");
    let healthy = descriptor("healthy", 1, "1");
    harness.insert(&broken);
    harness.insert(&healthy);
    running.send(WatchEvent::added(broken));
    running.send(WatchEvent::added(healthy));

    let agent = harness.agent.clone();
    eventually(|| agent.configs().contains("myapp/healthy/0")).await;
    assert!(!harness.agent.configs().contains("myapp/broken/0"));

    running.stop().await;
}

#[tokio::test]
async fn test_sync_stops_at_first_failed_endpoint() {
    let agent = FakeAgent::default();
    agent.fail("myapp/web/0", u32::MAX);
    let config = ControllerConfig {
        backoff: BackoffPolicy::new(Duration::from_millis(1), Duration::from_millis(1), 0),
        ..fast_config()
    };
    let harness = Harness::new(agent, config);
    harness.store.mark_synced();
    let running = harness.start();

    let monitor = descriptor("web", 3, "1");
    harness.insert(&monitor);
    running.send(WatchEvent::added(monitor));

    let agent = harness.agent.clone();
    eventually(|| agent.upserts("myapp/web/0") == 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.agent.upserts("myapp/web/1"), 0);
    assert_eq!(harness.agent.upserts("myapp/web/2"), 0);

    running.stop().await;
}

#[tokio::test]
async fn test_interrupted_sync_keeps_retry_state() {
    let agent = FakeAgent::default();
    agent.fail("myapp/web/0", 1);
    let harness = Harness::new(agent, fast_config());
    harness
        .agent
        .stop_queue_on_upsert(harness.controller.queue().clone());

    let monitor = descriptor("web", 3, "1");
    let key = monitor.key().unwrap();
    harness.insert(&monitor);
    harness.controller.handle_event(WatchEvent::added(monitor));

    // Fails once, then the retry is cut short after the first endpoint
    assert!(harness.controller.process_next().await);
    assert_eq!(harness.controller.queue().num_requeues(&key), 1);
    assert!(harness.controller.process_next().await);

    assert_eq!(harness.agent.upserts("myapp/web/0"), 2);
    assert_eq!(harness.agent.upserts("myapp/web/1"), 0);
    assert!(harness.controller.queue().is_shutting_down());
    assert_eq!(harness.controller.queue().num_requeues(&key), 1);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_cache_sync_timeout() {
    let config = ControllerConfig {
        cache_sync_timeout: Duration::from_millis(20),
        ..fast_config()
    };
    let harness = Harness::new(FakeAgent::default(), config);

    let running = harness.start();
    let result = tokio::time::timeout(Duration::from_secs(5), running.task)
        .await
        .unwrap()
        .unwrap();

    assert!(matches!(result, Err(ControllerError::CacheSyncTimeout(_))));
    assert!(harness.agent.calls().is_empty());
}

#[tokio::test]
async fn test_shutdown_before_sync() {
    let harness = Harness::new(FakeAgent::default(), fast_config());
    let running = harness.start();

    running.stop().await;
    assert!(harness.agent.calls().is_empty());
    assert!(harness.controller.queue().is_shutting_down());
}

#[tokio::test]
async fn test_shutdown_stops_workers() {
    let harness = Harness::new(FakeAgent::default(), fast_config());
    harness.store.mark_synced();
    let running = harness.start();

    let agent = harness.agent.clone();
    eventually(|| agent.calls() == vec![Call::List]).await;
    running.stop().await;

    assert!(harness.controller.queue().is_shutting_down());
    assert!(!harness.controller.queue().add(
        descriptor("late", 1, "1").key().unwrap(),
        scrape_controller::WorkKind::Sync
    ));
}
