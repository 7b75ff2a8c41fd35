//! Refresh controller: supersession, retry bound, periodic suppression, polling

use crate::integration::test_utils::{deletion_request, ticket, transient, ScriptedStore};
use docket::error::{ErrorKind, StoreError};
use docket::refresh::{RefreshConfig, RefreshController, RefreshOutcome, RefreshTrigger};
use docket::types::QueueKind;
use std::sync::Arc;
use std::time::Duration;

fn config() -> RefreshConfig {
    RefreshConfig {
        interval_secs: 30,
        max_retries: 3,
        base_delay_ms: 1000,
        refresh_after_dispatch: false,
    }
}

fn controller(store: &Arc<ScriptedStore>) -> Arc<RefreshController<ScriptedStore>> {
    Arc::new(RefreshController::new(
        QueueKind::Support,
        Arc::clone(store),
        config(),
    ))
}

fn ids(controller: &RefreshController<ScriptedStore>) -> Vec<String> {
    controller
        .snapshot()
        .records()
        .iter()
        .map(|record| record.id.clone())
        .collect()
}

#[tokio::test]
async fn test_older_fetch_resolving_last_never_overwrites_newer() {
    let store = Arc::new(ScriptedStore::new());
    let release_a = store.push_gated(Ok(vec![ticket("stale", "u-1")]));
    let release_b = store.push_gated(Ok(vec![ticket("fresh", "u-2")]));
    let controller = controller(&store);

    let fetch_a = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.refresh(RefreshTrigger::Manual).await }
    });
    let generation_a = store.wait_started().await;

    let fetch_b = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.refresh(RefreshTrigger::Manual).await }
    });
    let generation_b = store.wait_started().await;
    assert!(generation_b > generation_a);

    release_b.send(()).unwrap();
    let outcome_b = fetch_b.await.unwrap();
    assert!(matches!(outcome_b, RefreshOutcome::Refreshed { .. }));

    release_a.send(()).unwrap();
    let outcome_a = fetch_a.await.unwrap();
    assert_eq!(outcome_a, RefreshOutcome::Superseded);

    assert_eq!(ids(&controller), vec!["fresh"]);
    assert!(!controller.state().is_refreshing());
}

#[tokio::test]
async fn test_superseded_result_is_discarded_even_when_it_arrives_first() {
    let store = Arc::new(ScriptedStore::new());
    let release_a = store.push_gated(Ok(vec![ticket("stale", "u-1")]));
    let release_b = store.push_gated(Ok(vec![ticket("fresh", "u-2")]));
    let controller = controller(&store);

    let fetch_a = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.refresh(RefreshTrigger::Manual).await }
    });
    store.wait_started().await;
    let fetch_b = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.refresh(RefreshTrigger::Manual).await }
    });
    store.wait_started().await;

    release_a.send(()).unwrap();
    assert_eq!(fetch_a.await.unwrap(), RefreshOutcome::Superseded);
    assert!(controller.snapshot().is_empty());
    assert!(controller.state().last_refreshed_at.is_none());
    assert!(controller.is_refreshing());

    release_b.send(()).unwrap();
    fetch_b.await.unwrap();
    assert_eq!(ids(&controller), vec!["fresh"]);
}

#[tokio::test]
async fn test_superseded_failure_does_not_set_error() {
    let store = Arc::new(ScriptedStore::new());
    let release_a = store.push_gated(Err(StoreError::Rejected {
        status: 400,
        message: "bad filter".to_string(),
    }));
    let release_b = store.push_gated(Ok(vec![ticket("t-1", "u-1")]));
    let controller = controller(&store);

    let fetch_a = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.refresh(RefreshTrigger::Manual).await }
    });
    store.wait_started().await;
    let fetch_b = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.refresh(RefreshTrigger::Manual).await }
    });
    store.wait_started().await;

    release_a.send(()).unwrap();
    assert_eq!(fetch_a.await.unwrap(), RefreshOutcome::Superseded);
    assert_eq!(controller.state().error, None);

    release_b.send(()).unwrap();
    fetch_b.await.unwrap();
    assert_eq!(controller.state().error, None);
}

#[tokio::test]
async fn test_periodic_trigger_is_skipped_while_fetching() {
    let store = Arc::new(ScriptedStore::new());
    let release = store.push_gated(Ok(vec![ticket("t-1", "u-1")]));
    let controller = controller(&store);

    let manual = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.refresh(RefreshTrigger::Manual).await }
    });
    store.wait_started().await;
    assert!(controller.state().is_refreshing());

    let periodic = controller.refresh(RefreshTrigger::Periodic).await;
    assert_eq!(periodic, RefreshOutcome::Skipped);
    assert_eq!(store.list_calls(), 1);

    release.send(()).unwrap();
    assert!(matches!(
        manual.await.unwrap(),
        RefreshOutcome::Refreshed { .. }
    ));
    assert!(!controller.is_refreshing());
}

#[tokio::test(start_paused = true)]
async fn test_dropped_fetch_does_not_block_periodic_refresh() {
    let store = Arc::new(ScriptedStore::with_fallback(vec![ticket("t-1", "u-1")]));
    let _release = store.push_gated(Ok(vec![ticket("t-0", "u-0")]));
    let controller = controller(&store);

    let timed_out = tokio::time::timeout(
        Duration::from_millis(10),
        controller.refresh(RefreshTrigger::Manual),
    )
    .await;
    assert!(timed_out.is_err());
    assert!(!controller.is_refreshing());
    assert!(!controller.state().is_refreshing());

    let periodic = controller.refresh(RefreshTrigger::Periodic).await;
    assert!(matches!(periodic, RefreshOutcome::Refreshed { .. }));
    assert_eq!(ids(&controller), vec!["t-1"]);
    assert_eq!(store.list_calls(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_periodic_triggers_start_one_fetch() {
    let store = Arc::new(ScriptedStore::new());
    let release = store.push_gated(Ok(vec![ticket("t-1", "u-1")]));
    let controller = controller(&store);

    let triggers: Vec<_> = (0..8)
        .map(|_| {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.refresh(RefreshTrigger::Periodic).await })
        })
        .collect();
    store.wait_started().await;
    // Every trigger but the one holding the gated fetch settles before release
    while triggers.iter().filter(|t| t.is_finished()).count() < triggers.len() - 1 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    release.send(()).unwrap();

    let mut refreshed = 0;
    for trigger in triggers {
        match trigger.await.unwrap() {
            RefreshOutcome::Refreshed { .. } => refreshed += 1,
            RefreshOutcome::Skipped => {}
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    assert_eq!(refreshed, 1);
    assert_eq!(store.list_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stopping_polling_drops_fetch_in_flight() {
    let store = Arc::new(ScriptedStore::with_fallback(vec![ticket("t-1", "u-1")]));
    let _release = store.push_gated(Ok(vec![ticket("t-0", "u-0")]));
    let controller = controller(&store);

    let handle = controller.spawn_polling();
    store.wait_started().await;
    assert!(controller.is_refreshing());

    handle.stop();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!controller.is_refreshing());
    assert!(controller.snapshot().is_empty());
    assert_eq!(store.list_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_three_transient_failures_then_success_records_three_retries() {
    let store = Arc::new(ScriptedStore::new());
    for _ in 0..3 {
        store.push_failure(transient());
    }
    store.push_items(vec![ticket("t-1", "u-1")]);
    let controller = controller(&store);

    let started = tokio::time::Instant::now();
    let outcome = controller.refresh(RefreshTrigger::Manual).await;

    match outcome {
        RefreshOutcome::Refreshed { retries, diff } => {
            assert_eq!(retries, 3);
            assert_eq!(diff.added, vec!["t-1".to_string()]);
        }
        other => panic!("expected success, got {other:?}"),
    }
    let state = controller.state();
    assert_eq!(state.retry_attempts, 3);
    assert_eq!(state.error, None);
    assert_eq!(store.list_calls(), 4);

    // Linear backoff: 1s + 2s + 3s
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(6), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(7), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_retries_stop_after_bound_and_keep_last_snapshot() {
    let store = Arc::new(ScriptedStore::new());
    store.push_items(vec![ticket("t-1", "u-1")]);
    for _ in 0..4 {
        store.push_failure(transient());
    }
    store.push_items(vec![ticket("never-fetched", "u-9")]);
    let controller = controller(&store);

    controller.refresh(RefreshTrigger::Manual).await;
    let outcome = controller.refresh(RefreshTrigger::Manual).await;

    assert_eq!(
        outcome,
        RefreshOutcome::Failed {
            kind: ErrorKind::TransientNetwork,
            retries: 3
        }
    );
    assert_eq!(store.list_calls(), 5);
    let state = controller.state();
    assert_eq!(state.error, Some(ErrorKind::TransientNetwork));
    assert!(!state.is_refreshing());
    assert_eq!(ids(&controller), vec!["t-1"]);

    // The next trigger clears the error indicator
    controller.refresh(RefreshTrigger::Manual).await;
    assert_eq!(controller.state().error, None);
    assert_eq!(ids(&controller), vec!["never-fetched"]);
}

#[tokio::test]
async fn test_rejection_is_not_retried() {
    let store = Arc::new(ScriptedStore::new());
    store.push_failure(StoreError::Rejected {
        status: 401,
        message: "expired token".to_string(),
    });
    let controller = controller(&store);

    let outcome = controller.refresh(RefreshTrigger::Manual).await;
    assert_eq!(
        outcome,
        RefreshOutcome::Failed {
            kind: ErrorKind::TerminalNetwork,
            retries: 0
        }
    );
    assert_eq!(store.list_calls(), 1);
    assert!(controller
        .state()
        .error_message
        .unwrap()
        .contains("expired token"));
}

#[tokio::test]
async fn test_diff_tracks_changes_between_refreshes() {
    let store = Arc::new(ScriptedStore::new());
    store.push_items(vec![ticket("a", "u-1"), ticket("b", "u-2")]);
    let mut changed = ticket("b", "u-2");
    changed["status"] = "IN_PROGRESS".into();
    store.push_items(vec![changed, ticket("c", "u-3")]);
    let controller = controller(&store);

    controller.refresh(RefreshTrigger::Manual).await;
    let first_version = controller.snapshot().version();
    match controller.refresh(RefreshTrigger::Manual).await {
        RefreshOutcome::Refreshed { diff, .. } => {
            assert_eq!(diff.added, vec!["c".to_string()]);
            assert_eq!(diff.removed, vec!["a".to_string()]);
            assert_eq!(diff.changed, vec!["b".to_string()]);
        }
        other => panic!("expected success, got {other:?}"),
    }
    assert!(controller.snapshot().version() > first_version);
}

#[tokio::test]
async fn test_snapshot_handed_out_is_never_mutated() {
    let store = Arc::new(ScriptedStore::new());
    store.push_items(vec![ticket("a", "u-1")]);
    store.push_items(vec![ticket("b", "u-2")]);
    let controller = controller(&store);

    controller.refresh(RefreshTrigger::Manual).await;
    let held = controller.snapshot();
    controller.refresh(RefreshTrigger::Manual).await;

    assert_eq!(held.records()[0].id, "a");
    assert_eq!(controller.snapshot().records()[0].id, "b");
}

#[tokio::test(start_paused = true)]
async fn test_polling_fires_immediately_then_every_interval_until_stopped() {
    let store = Arc::new(ScriptedStore::with_fallback(vec![ticket("t-1", "u-1")]));
    let controller = controller(&store);

    let handle = controller.spawn_polling();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(store.list_calls(), 1);
    assert_eq!(ids(&controller), vec!["t-1"]);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(store.list_calls(), 2);

    handle.stop();
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(store.list_calls(), 2);
}

#[tokio::test]
async fn test_queues_refresh_independently() {
    let support_store = Arc::new(ScriptedStore::with_fallback(vec![ticket("t-1", "u-1")]));
    let deletion_store = Arc::new(ScriptedStore::new());
    let release = deletion_store.push_gated(Ok(vec![deletion_request("d-1", "u-2")]));

    let support = controller(&support_store);
    let deletion = Arc::new(RefreshController::new(
        QueueKind::AccountDeletion,
        Arc::clone(&deletion_store),
        config(),
    ));

    let pending = tokio::spawn({
        let deletion = Arc::clone(&deletion);
        async move { deletion.refresh(RefreshTrigger::Manual).await }
    });
    deletion_store.wait_started().await;

    // A fetch in flight on one queue neither blocks nor supersedes the other
    assert!(matches!(
        support.refresh(RefreshTrigger::Periodic).await,
        RefreshOutcome::Refreshed { .. }
    ));
    assert!(deletion.is_refreshing());

    release.send(()).unwrap();
    assert!(matches!(
        pending.await.unwrap(),
        RefreshOutcome::Refreshed { .. }
    ));
    assert_eq!(deletion.snapshot().records()[0].subject_id, "u-2");
}
