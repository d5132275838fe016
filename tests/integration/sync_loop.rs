//! Integration tests for the background breakpoint sync
//!
//! Runs on a paused clock so interval ticks are deterministic.

use std::time::Duration;

use snapline::{vars, MockControlPlane};

use super::common::{armed, harness};

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_fetches_immediately_then_every_interval() {
    let h = harness(MockControlPlane::new().with_breakpoints(vec![armed("bp-1", "pre-charge")]));
    assert!(h.agent.start());
    assert!(h.agent.is_running());

    settle().await;
    assert_eq!(h.control_plane.fetch_count(), 1);
    assert!(h.agent.cache().get_key("checkout:pre-charge").is_some());

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.control_plane.fetch_count(), 2);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.control_plane.fetch_count(), 3);
    assert_eq!(h.agent.stats().syncs, 3);
}

#[tokio::test(start_paused = true)]
async fn test_stop_halts_fetching_and_is_idempotent() {
    let h = harness(MockControlPlane::new());
    h.agent.start();
    settle().await;
    assert_eq!(h.control_plane.fetch_count(), 1);

    h.agent.stop();
    assert!(!h.agent.is_running());
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(h.control_plane.fetch_count(), 1);

    h.agent.stop();
    h.agent.stop();
    assert!(!h.agent.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_start_twice_runs_one_loop() {
    let h = harness(MockControlPlane::new());
    assert!(h.agent.start());
    assert!(h.agent.start());

    settle().await;
    assert_eq!(h.control_plane.fetch_count(), 1);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.control_plane.fetch_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stop_from_another_thread() {
    let h = harness(MockControlPlane::new());
    h.agent.start();
    settle().await;

    let agent = h.agent.clone();
    std::thread::spawn(move || agent.stop())
        .join()
        .expect("stop thread panicked");

    assert!(!h.agent.is_running());
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(h.control_plane.fetch_count(), 1);
}

/// A fetch still in flight when `stop` returns must not repopulate the cache
#[tokio::test(start_paused = true)]
async fn test_in_flight_fetch_does_not_land_after_stop() {
    let h = harness(
        MockControlPlane::new()
            .with_breakpoints(vec![armed("bp-1", "pre-charge")])
            .with_fetch_delay(Duration::from_secs(1)),
    );
    h.agent.start();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(h.control_plane.fetch_count(), 1);
    h.agent.stop();
    h.agent.cache().clear();

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(h.agent.cache().is_empty());
    assert_eq!(h.agent.stats().syncs, 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_sync_keeps_the_previous_cache() {
    let h = harness(MockControlPlane::new().with_breakpoints(vec![armed("bp-1", "pre-charge")]));
    h.agent.start();
    settle().await;
    assert!(!h.agent.cache().is_empty());

    h.control_plane.fail_fetches(true);
    h.control_plane.set_breakpoints(Vec::new());
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(h.control_plane.fetch_count(), 2);
    assert!(h.agent.cache().get_key("checkout:pre-charge").is_some());
    let stats = h.agent.stats();
    assert_eq!(stats.syncs, 1);
    assert_eq!(stats.sync_failures, 1);

    // Still armed: the stale entry keeps capturing.
    let outcome = h.agent.capture("pre-charge", vars! {}).outcome().await;
    assert!(outcome.is_captured());
}

#[tokio::test(start_paused = true)]
async fn test_synced_breakpoints_count_as_registered() {
    let h = harness(MockControlPlane::new().with_breakpoints(vec![armed("bp-1", "pre-charge")]));
    assert!(h.agent.sync_now().await);

    assert!(h.agent.registrar().is_known("checkout:pre-charge"));
    assert!(!h.agent.registrar().is_known("checkout:other"));
}

#[tokio::test(start_paused = true)]
async fn test_restart_after_stop() {
    let h = harness(MockControlPlane::new());
    h.agent.start();
    settle().await;
    h.agent.stop();

    assert!(h.agent.start());
    settle().await;
    assert_eq!(h.control_plane.fetch_count(), 2);
    h.agent.stop();
}

#[tokio::test(start_paused = true)]
async fn test_sync_now_works_after_stop() {
    let h = harness(MockControlPlane::new().with_breakpoints(vec![armed("bp-1", "pre-charge")]));
    h.agent.start();
    settle().await;
    h.agent.stop();
    h.agent.cache().clear();

    assert!(h.agent.sync_now().await);
    assert!(!h.agent.cache().is_empty());
}

#[test]
fn test_start_without_runtime_fails_quietly() {
    let h = harness(MockControlPlane::new());
    assert!(!h.agent.start());
    assert!(!h.agent.is_running());
}
