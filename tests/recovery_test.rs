mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::*;
use crm_sales_core::orchestration::CancellationToken;
use crm_sales_core::ports::SagaStore;
use crm_sales_core::state_machine::SagaState;
use crm_sales_core::{SagaConfig, SagaRecoverySweeper};

fn sweep_config() -> SagaConfig {
    SagaConfig {
        // every in-flight saga counts as stuck
        pending_saga_age_secs: 0,
        completed_retention_secs: 0,
        sweep_concurrency: 2,
        ..SagaConfig::default()
    }
}

#[tokio::test]
async fn test_sweep_resumes_stuck_and_compensating_sagas() {
    let harness = TestHarness::new();
    let store = Arc::new(FlakySagaStore::failing_after(5));
    let orchestrator = Arc::new(harness.orchestrator_with_store(store.clone()));

    // crashed before creating the opportunity
    let mut running = harness
        .persisted_saga_in(store.as_ref(), harness.create_customer_request())
        .await;
    orchestrator
        .execute(&harness.ctx(), &mut running)
        .await
        .unwrap_err();

    // crashed while undoing the opportunity
    let second_lead = harness.add_lead();
    let mut compensating = harness.build_saga_for(second_lead.id, harness.create_customer_request());
    store.create(&mut compensating).await.unwrap();
    harness.leads.fail_updates.store(true, Ordering::SeqCst);
    store.allow_updates(9);
    orchestrator
        .execute(&harness.ctx(), &mut compensating)
        .await
        .unwrap_err();
    harness.leads.fail_updates.store(false, Ordering::SeqCst);

    // accepted but never picked up
    let third_lead = harness.add_lead();
    let mut started = harness.build_saga_for(third_lead.id, harness.create_customer_request());
    store.create(&mut started).await.unwrap();

    store.allow_updates(usize::MAX);
    let sweeper = SagaRecoverySweeper::new(orchestrator.clone(), store.clone(), sweep_config());

    let report = sweeper.sweep_once().await.unwrap();

    assert_eq!(report.examined, 3);
    assert_eq!(report.completed, 2);
    assert_eq!(report.compensated, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(report.errors, 0);
    assert_eq!(report.resumed(), 3);

    let counts = store.count_by_state(harness.tenant_id).await.unwrap();
    assert_eq!(counts.get(&SagaState::Completed), Some(&2));
    assert_eq!(counts.get(&SagaState::Compensated), Some(&1));

    let again = sweeper.sweep_once().await.unwrap();
    assert_eq!(again.examined, 0);
}

#[tokio::test]
async fn test_sweep_counts_sagas_that_cannot_be_resumed() {
    let harness = TestHarness::new();
    let store = Arc::new(FlakySagaStore::failing_after(3));
    let orchestrator = Arc::new(harness.orchestrator_with_store(store.clone()));
    let mut saga = harness
        .persisted_saga_in(store.as_ref(), harness.create_customer_request())
        .await;
    orchestrator
        .execute(&harness.ctx(), &mut saga)
        .await
        .unwrap_err();

    // the store is still failing
    let sweeper = SagaRecoverySweeper::new(orchestrator, store.clone(), sweep_config());
    let report = sweeper.sweep_once().await.unwrap();

    assert_eq!(report.examined, 1);
    assert_eq!(report.errors, 1);
    assert_eq!(report.resumed(), 0);
}

#[tokio::test]
async fn test_purge_removes_completed_sagas_past_retention() {
    let harness = TestHarness::new();
    let orchestrator = Arc::new(harness.orchestrator());
    let mut saga = harness.persisted_saga(harness.create_customer_request()).await;
    orchestrator.execute(&harness.ctx(), &mut saga).await.unwrap();

    let sweeper = SagaRecoverySweeper::new(orchestrator, harness.store.clone(), sweep_config());
    let removed = sweeper.purge_completed().await.unwrap();

    assert_eq!(removed, 1);
    assert!(harness.store.is_empty());
}

#[tokio::test]
async fn test_run_stops_when_cancelled() {
    let harness = TestHarness::new();
    let orchestrator = Arc::new(harness.orchestrator());
    let saga = harness.persisted_saga(harness.create_customer_request()).await;
    let sweeper = Arc::new(SagaRecoverySweeper::new(
        orchestrator,
        harness.store.clone(),
        SagaConfig {
            completed_retention_secs: 3600,
            ..sweep_config()
        },
    ));

    let shutdown = CancellationToken::new();
    let task = {
        let sweeper = sweeper.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { sweeper.run(Duration::from_millis(10), shutdown).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("sweeper stops after cancellation")
        .unwrap();

    let swept = harness
        .store
        .get_by_id(harness.tenant_id, saga.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(swept.state(), SagaState::Completed);
}

#[tokio::test]
async fn test_run_stops_promptly_while_waiting_for_next_pass() {
    let harness = TestHarness::new();
    let sweeper = Arc::new(SagaRecoverySweeper::new(
        Arc::new(harness.orchestrator()),
        harness.store.clone(),
        sweep_config(),
    ));

    let shutdown = CancellationToken::new();
    let task = {
        let sweeper = sweeper.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { sweeper.run(Duration::from_secs(5), shutdown).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.cancel();
    let stopped = tokio::time::timeout(Duration::from_secs(1), task).await;

    assert!(stopped.is_ok(), "sweeper kept waiting for its next tick");
}
