//! PostgreSQL store contract tests.
//!
//! Run with a database: `DATABASE_URL=postgresql://... cargo test -- --ignored`

use sqlx::PgPool;
use std::sync::Arc;
use stepchain_core::config::SchedulerConfig;
use stepchain_core::models::{NewStep, StateUpdate};
use stepchain_core::orchestration::{
    SimulatedAction, StepDefinition, StepScheduler, WorkflowInitializer, WorkflowRequest,
};
use stepchain_core::state_machine::StepState;
use stepchain_core::store::{PgStepStore, StepStore, StoreError, UpdateOutcome};
use uuid::Uuid;

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[sqlx::test(migrator = "stepchain_core::database::MIGRATOR")]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn test_insert_and_query(pool: PgPool) -> TestResult {
    let store = PgStepStore::new(pool);
    let ids = store
        .insert_batch(vec![
            NewStep::new("reports", "a").with_payload(serde_json::json!({"k": 1})),
            NewStep::new("billing", "x"),
            NewStep::new("reports", "b").with_action("render"),
        ])
        .await?;

    let a = store.get_by_id(ids[0]).await?.expect("inserted");
    assert_eq!(a.state, StepState::Waiting);
    assert_eq!(a.payload, serde_json::json!({"k": 1}));
    assert_eq!(a.created_at, a.state_changed_at);

    let reports = store.list_by_workflow("reports").await?;
    assert_eq!(
        reports.iter().map(|s| s.step_id).collect::<Vec<_>>(),
        vec![ids[0], ids[2]]
    );
    assert_eq!(store.list_by_state(StepState::Waiting).await?.len(), 3);
    assert_eq!(store.list_workflow_names().await?, vec!["billing", "reports"]);
    assert!(store.get_by_id(Uuid::new_v4()).await?.is_none());
    Ok(())
}

#[sqlx::test(migrator = "stepchain_core::database::MIGRATOR")]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn test_duplicate_id_rolls_back_batch(pool: PgPool) -> TestResult {
    let store = PgStepStore::new(pool);
    let first = NewStep::new("reports", "a");
    let duplicate = first.clone();

    let err = store
        .insert_batch(vec![first, NewStep::new("reports", "b"), duplicate])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateStep(_)));
    assert!(store.list_by_workflow("reports").await?.is_empty());
    Ok(())
}

#[sqlx::test(migrator = "stepchain_core::database::MIGRATOR")]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn test_conditional_update(pool: PgPool) -> TestResult {
    let store = PgStepStore::new(pool);
    let id = store.insert(NewStep::new("reports", "a")).await?;
    let claim = || StateUpdate::new(StepState::Running, chrono::Utc::now());

    assert!(store.update_state(id, StepState::Waiting, claim()).await?.is_applied());
    assert_eq!(
        store.update_state(id, StepState::Waiting, claim()).await?,
        UpdateOutcome::Conflict {
            actual: StepState::Running
        }
    );
    assert_eq!(
        store
            .update_state(Uuid::new_v4(), StepState::Waiting, claim())
            .await?,
        UpdateOutcome::NotFound
    );

    let failed = store
        .update_state(
            id,
            StepState::Running,
            StateUpdate::new(StepState::Failed, chrono::Utc::now() - chrono::Duration::hours(1))
                .with_error("boom"),
        )
        .await?;
    let UpdateOutcome::Applied(step) = failed else {
        panic!("expected applied update");
    };
    assert_eq!(step.last_error.as_deref(), Some("boom"));
    assert!(step.state_changed_at >= step.created_at);
    Ok(())
}

#[sqlx::test(migrator = "stepchain_core::database::MIGRATOR")]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn test_competing_claims_have_one_winner(pool: PgPool) -> TestResult {
    let store = Arc::new(PgStepStore::new(pool));
    let id = store.insert(NewStep::new("reports", "a")).await?;

    let attempts: Vec<_> = (0..5)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .update_state(
                        id,
                        StepState::Waiting,
                        StateUpdate::new(StepState::Running, chrono::Utc::now()),
                    )
                    .await
            })
        })
        .collect();

    let mut applied = 0;
    for attempt in attempts {
        if attempt.await??.is_applied() {
            applied += 1;
        }
    }
    assert_eq!(applied, 1);
    Ok(())
}

#[sqlx::test(migrator = "stepchain_core::database::MIGRATOR")]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn test_scheduler_drives_chain_against_postgres(pool: PgPool) -> TestResult {
    let store: Arc<dyn StepStore> = Arc::new(PgStepStore::new(pool));
    let created = WorkflowInitializer::new(store.clone())
        .create_workflow(
            WorkflowRequest::new("chain")
                .with_step(StepDefinition::new("a"))
                .with_step(StepDefinition::new("b").depends_on("a")),
        )
        .await?;

    let scheduler = StepScheduler::new(
        store.clone(),
        Arc::new(SimulatedAction::new(std::time::Duration::from_millis(1))),
        SchedulerConfig::default(),
    );
    scheduler.run_cycle().await?;
    let b = store.get_by_id(created.step_mapping["b"]).await?.expect("b");
    assert_eq!(b.state, StepState::Waiting);

    scheduler.run_cycle().await?;
    let b = store.get_by_id(created.step_mapping["b"]).await?.expect("b");
    assert_eq!(b.state, StepState::Succeeded);
    Ok(())
}
