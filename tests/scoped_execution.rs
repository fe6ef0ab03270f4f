// tests/scoped_execution.rs

mod common;
use crate::common::{TestResult, controller_for, init_tracing};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::oneshot;

use safe_runner::errors::SafeRunError;
use safe_runner::shutdown::ScopeOutcome;
use safe_runner_test_utils::fake_registry::{ChildBehaviour, FakeRegistry};
use safe_runner_test_utils::with_timeout;

#[tokio::test]
async fn completed_work_is_followed_by_exactly_one_cleanup() -> TestResult {
    init_tracing();

    let registry = FakeRegistry::new();
    let controller = controller_for(&registry);

    // The work spawns a child; cleanup must see it, so it runs afterwards.
    let work_registry = registry.clone();
    let outcome = with_timeout(controller.scoped(move || async move {
        work_registry.add_child(ChildBehaviour::ExitsOnTerminate);
        Ok(())
    }))
    .await;

    assert!(outcome.is_completed());
    assert_eq!(outcome.exit_code(), 0);
    assert!(controller.has_cleaned_up());
    assert_eq!(registry.list_calls(), 1);
    assert_eq!(registry.terminate_calls().len(), 1);
    assert!(registry.alive().is_empty());

    drop(controller);
    assert_eq!(registry.list_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn failing_work_is_reported_not_raised() -> TestResult {
    init_tracing();

    let registry = FakeRegistry::new().with_children(ChildBehaviour::IgnoresTerminate, 2);
    let controller = controller_for(&registry);

    let outcome = with_timeout(controller.scoped(|| async {
        Err(SafeRunError::UnitFailed {
            unit: "linkedlist".to_string(),
            code: 3,
        })
    }))
    .await;

    match outcome {
        ScopeOutcome::Failed(SafeRunError::UnitFailed { ref unit, code }) => {
            assert_eq!(unit, "linkedlist");
            assert_eq!(code, 3);
        }
        ref other => panic!("expected UnitFailed, got {other:?}"),
    }
    assert_eq!(outcome.exit_code(), 1);
    assert_eq!(registry.list_calls(), 1);
    assert_eq!(registry.kill_calls().len(), 2);
    Ok(())
}

#[tokio::test]
async fn interruption_is_swallowed() -> TestResult {
    init_tracing();

    let registry = FakeRegistry::new().with_children(ChildBehaviour::ExitsOnTerminate, 1);
    let controller = controller_for(&registry);

    let outcome =
        with_timeout(controller.scoped(|| async { Err(SafeRunError::Interrupted) })).await;

    assert!(outcome.is_interrupted());
    assert!(outcome.error().is_none());
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(registry.list_calls(), 1);
    assert_eq!(registry.terminate_calls().len(), 1);
    Ok(())
}

#[tokio::test]
async fn panicking_work_still_gets_cleanup() -> TestResult {
    init_tracing();

    let registry = FakeRegistry::new().with_children(ChildBehaviour::ExitsOnTerminate, 1);
    let controller = controller_for(&registry);

    #[allow(unreachable_code)]
    let outcome = with_timeout(controller.scoped(|| async {
        panic!("linked list cycle detected");
        Ok(())
    }))
    .await;

    match outcome.error() {
        Some(SafeRunError::WorkPanicked(msg)) => assert!(msg.contains("cycle detected")),
        other => panic!("expected WorkPanicked, got {other:?}"),
    }
    assert_eq!(registry.list_calls(), 1);
    assert!(registry.alive().is_empty());
    Ok(())
}

#[tokio::test]
async fn work_runs_exactly_once() -> TestResult {
    init_tracing();

    let registry = FakeRegistry::new();
    let controller = controller_for(&registry);
    let runs = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&runs);
    let outcome = with_timeout(controller.scoped(move || async move {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }))
    .await;

    assert!(outcome.is_completed());
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn dispose_keeps_the_exit_hook() -> TestResult {
    init_tracing();

    let registry = FakeRegistry::new().with_children(ChildBehaviour::ExitsOnTerminate, 1);
    let mut controller = controller_for(&registry);

    controller.dispose();
    controller.dispose();
    assert!(!controller.has_cleaned_up());
    assert_eq!(registry.list_calls(), 0);

    drop(controller);
    assert_eq!(registry.list_calls(), 1);
    assert!(registry.alive().is_empty());
    Ok(())
}

#[tokio::test]
async fn dropping_the_scope_aborts_the_work_before_cleanup() -> TestResult {
    init_tracing();

    let registry = FakeRegistry::new().with_children(ChildBehaviour::ExitsOnTerminate, 1);
    let controller = controller_for(&registry);

    // The work holds `alive` until its future is dropped.
    let (alive, gone) = oneshot::channel::<()>();
    let work_registry = registry.clone();
    let scope = controller.scoped(move || async move {
        let _alive = alive;
        tokio::time::sleep(Duration::from_millis(100)).await;
        work_registry.add_child(ChildBehaviour::ExitsOnTerminate);
        std::future::pending::<()>().await;
        Ok(())
    });

    assert!(tokio::time::timeout(Duration::from_millis(20), scope).await.is_err());
    assert!(controller.has_cleaned_up());
    assert_eq!(registry.list_calls(), 1);

    // Aborted, so the sender is dropped without ever being used.
    assert!(with_timeout(gone).await.is_err());
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(registry.alive().is_empty());
    Ok(())
}
