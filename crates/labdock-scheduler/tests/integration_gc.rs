//! Integration tests for boop, garbage collection, and the whitelist.

mod common;

use std::time::Duration;

use common::fixtures::bgp_basics;
use common::TestScheduler;
use labdock_core::{LessonScheduleRequest, LiveLessonStatus, OperationType};
use labdock_state::CatalogStore;

const BUDGET: Duration = Duration::from_secs(5);

#[tokio::test]
async fn boop_refreshes_the_idle_timer() {
    // threshold 500ms (fast_config)
    let ts = TestScheduler::new(vec![bgp_basics()]);
    let collector = ts.collector();

    let id = ts.create("bgp-basics", "s1", 0).await;
    ts.wait_for_status(&id, LiveLessonStatus::Ready, BUDGET).await;

    // Let most of the threshold pass, then poke.
    tokio::time::sleep(Duration::from_millis(350)).await;
    ts.queue.publish(LessonScheduleRequest::new(
        &id,
        "bgp-basics",
        "s1",
        OperationType::Boop,
        0,
    ));
    tokio::time::sleep(Duration::from_millis(300)).await;

    // Idle age counts from the boop, so the session survives this pass.
    let reaped = collector.tick().await.unwrap();
    assert!(reaped.is_empty());
    assert!(ts.store.get_live_lesson(&id).await.is_ok());

    // Without further activity the next pass reaps it.
    tokio::time::sleep(Duration::from_millis(400)).await;
    let reaped = collector.tick().await.unwrap();
    assert_eq!(reaped, vec![id.clone()]);
    ts.wait_deleted(&id, BUDGET).await;
}

#[tokio::test]
async fn gc_reaps_idle_session() {
    let ts = TestScheduler::new(vec![bgp_basics()]);
    let collector = ts.collector();

    let id = ts.create("bgp-basics", "s1", 0).await;
    ts.wait_for_status(&id, LiveLessonStatus::Ready, BUDGET).await;

    // Fresh session survives a pass.
    assert!(collector.tick().await.unwrap().is_empty());

    tokio::time::sleep(Duration::from_millis(700)).await;
    let reaped = collector.tick().await.unwrap();
    assert_eq!(reaped, vec![id.clone()]);

    // The DELETE went through the dispatcher like any user request.
    ts.wait_deleted(&id, BUDGET).await;
}

#[tokio::test]
async fn gc_respects_the_whitelist() {
    let ts = TestScheduler::new(vec![bgp_basics()]);
    let collector = ts.collector();

    let id = ts.create("bgp-basics", "s1", 0).await;
    ts.wait_for_status(&id, LiveLessonStatus::Ready, BUDGET).await;
    ts.whitelist.add("s1").unwrap();

    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(collector.tick().await.unwrap().is_empty());
    assert!(ts.store.get_live_lesson(&id).await.is_ok());

    // Deregistering makes the session collectable again.
    ts.whitelist.remove("s1").unwrap();
    let reaped = collector.tick().await.unwrap();
    assert_eq!(reaped, vec![id.clone()]);
    ts.wait_deleted(&id, BUDGET).await;
}

#[tokio::test]
async fn errored_sessions_use_the_shorter_threshold() {
    // Healthy sessions would live for 60s; only the failed-state
    // threshold can explain the reap below.
    let mut config = common::fast_config();
    config.gc.threshold = Duration::from_secs(60);
    config.gc.failed_threshold = Duration::from_millis(150);
    let ts = TestScheduler::with_config(vec![bgp_basics()], config);
    let collector = ts.collector();

    ts.prober.fail_all(true);
    let id = ts.create("bgp-basics", "s1", 0).await;
    ts.wait_for_status(&id, LiveLessonStatus::Error, BUDGET).await;

    tokio::time::sleep(Duration::from_millis(250)).await;
    let reaped = collector.tick().await.unwrap();
    assert_eq!(reaped, vec![id.clone()]);
}

#[tokio::test]
async fn nuke_from_orbit_reclaims_all_managed_namespaces() {
    let ts = TestScheduler::new(vec![bgp_basics()]);
    let collector = ts.collector();

    let a = ts.create("bgp-basics", "s1", 0).await;
    ts.wait_for_status(&a, LiveLessonStatus::Ready, BUDGET).await;

    let reclaimed = collector.nuke_from_orbit().await.unwrap();
    assert_eq!(reclaimed, 1);
    assert!(ts.cluster.namespace_names().is_empty());
}

#[tokio::test]
async fn whitelist_registry_errors() {
    let ts = TestScheduler::new(vec![]);

    ts.whitelist.add("s1").unwrap();
    assert!(ts.whitelist.add("s1").is_err());
    assert!(ts.whitelist.remove("s2").is_err());
    assert_eq!(ts.whitelist.list(), vec!["s1".to_string()]);
}
