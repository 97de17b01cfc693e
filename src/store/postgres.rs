//! PostgreSQL step store.
//!
//! Every state change is a single conditional `UPDATE ... RETURNING`, so two scheduler
//! processes sharing one database can never both claim the same step.

use super::{StepStore, StoreError, StoreResult, UpdateOutcome};
use crate::models::{NewStep, StateUpdate, Step};
use crate::state_machine::StepState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::{debug, instrument};
use uuid::Uuid;

const STEP_COLUMNS: &str = "step_id, workflow_name, step_name, action, payload, state, \
                            dependency_id, last_error, created_at, state_changed_at";

/// Internal struct for SQL query results
#[derive(Debug, FromRow)]
struct StepRow {
    step_id: Uuid,
    workflow_name: String,
    step_name: String,
    action: Option<String>,
    payload: serde_json::Value,
    state: String,
    dependency_id: Option<Uuid>,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    state_changed_at: DateTime<Utc>,
}

impl TryFrom<StepRow> for Step {
    type Error = StoreError;

    fn try_from(row: StepRow) -> Result<Self, Self::Error> {
        let state = row.state.parse::<StepState>().map_err(StoreError::InvalidData)?;

        Ok(Step {
            step_id: row.step_id,
            workflow_name: row.workflow_name,
            step_name: row.step_name,
            action: row.action,
            payload: row.payload,
            state,
            dependency_id: row.dependency_id,
            last_error: row.last_error,
            created_at: row.created_at,
            state_changed_at: row.state_changed_at,
        })
    }
}

fn rows_into_steps(rows: Vec<StepRow>) -> StoreResult<Vec<Step>> {
    rows.into_iter().map(Step::try_from).collect()
}

fn map_insert_error(error: sqlx::Error, step_id: Uuid) -> StoreError {
    match error.as_database_error() {
        Some(db_error) if db_error.is_unique_violation() => StoreError::DuplicateStep(step_id),
        _ => StoreError::Database(error),
    }
}

/// SQLx-backed implementation of [`StepStore`]
#[derive(Debug, Clone)]
pub struct PgStepStore {
    pool: PgPool,
}

impl PgStepStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl StepStore for PgStepStore {
    async fn insert(&self, new_step: NewStep) -> StoreResult<Uuid> {
        let mut ids = self.insert_batch(vec![new_step]).await?;
        ids.pop()
            .ok_or_else(|| StoreError::InvalidData("empty insert result".to_string()))
    }

    #[instrument(skip(self, new_steps), fields(batch_size = new_steps.len()))]
    async fn insert_batch(&self, new_steps: Vec<NewStep>) -> StoreResult<Vec<Uuid>> {
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(new_steps.len());

        for new_step in new_steps {
            let step_id = new_step.step_id;

            sqlx::query(
                r#"
                INSERT INTO stepchain_workflow_steps
                    (step_id, workflow_name, step_name, action, payload, state, dependency_id)
                VALUES ($1, $2, $3, $4, $5, 'waiting', $6)
                "#,
            )
            .bind(step_id)
            .bind(&new_step.workflow_name)
            .bind(&new_step.step_name)
            .bind(&new_step.action)
            .bind(&new_step.payload)
            .bind(new_step.dependency_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_insert_error(e, step_id))?;

            ids.push(step_id);
        }

        tx.commit().await?;
        debug!(inserted = ids.len(), "Inserted step batch");
        Ok(ids)
    }

    async fn get_by_id(&self, step_id: Uuid) -> StoreResult<Option<Step>> {
        let query = format!("SELECT {STEP_COLUMNS} FROM stepchain_workflow_steps WHERE step_id = $1");

        let row = sqlx::query_as::<_, StepRow>(&query)
            .bind(step_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Step::try_from).transpose()
    }

    async fn list_by_workflow(&self, workflow_name: &str) -> StoreResult<Vec<Step>> {
        let query = format!(
            "SELECT {STEP_COLUMNS} FROM stepchain_workflow_steps \
             WHERE workflow_name = $1 ORDER BY insertion_seq ASC"
        );

        let rows = sqlx::query_as::<_, StepRow>(&query)
            .bind(workflow_name)
            .fetch_all(&self.pool)
            .await?;

        rows_into_steps(rows)
    }

    async fn list_by_state(&self, state: StepState) -> StoreResult<Vec<Step>> {
        let query = format!(
            "SELECT {STEP_COLUMNS} FROM stepchain_workflow_steps \
             WHERE state = $1 ORDER BY insertion_seq ASC"
        );

        let rows = sqlx::query_as::<_, StepRow>(&query)
            .bind(state.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows_into_steps(rows)
    }

    async fn list_workflow_names(&self) -> StoreResult<Vec<String>> {
        let names: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT workflow_name FROM stepchain_workflow_steps ORDER BY workflow_name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(names.into_iter().map(|(name,)| name).collect())
    }

    #[instrument(skip(self, update), fields(to_state = %update.state))]
    async fn update_state(
        &self,
        step_id: Uuid,
        expected: StepState,
        update: StateUpdate,
    ) -> StoreResult<UpdateOutcome> {
        let query = format!(
            "UPDATE stepchain_workflow_steps \
             SET state = $3, state_changed_at = GREATEST($4, created_at), last_error = $5 \
             WHERE step_id = $1 AND state = $2 \
             RETURNING {STEP_COLUMNS}"
        );

        let row = sqlx::query_as::<_, StepRow>(&query)
            .bind(step_id)
            .bind(expected.as_str())
            .bind(update.state.as_str())
            .bind(update.state_changed_at)
            .bind(&update.last_error)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = row {
            return Ok(UpdateOutcome::Applied(Step::try_from(row)?));
        }

        // Nothing matched: tell a lost race apart from a missing record
        let current: Option<(String,)> =
            sqlx::query_as("SELECT state FROM stepchain_workflow_steps WHERE step_id = $1")
                .bind(step_id)
                .fetch_optional(&self.pool)
                .await?;

        match current {
            Some((state,)) => {
                let actual = state.parse::<StepState>().map_err(StoreError::InvalidData)?;
                debug!(step_id = %step_id, expected = %expected, actual = %actual, "Conditional update lost");
                Ok(UpdateOutcome::Conflict { actual })
            }
            None => Ok(UpdateOutcome::NotFound),
        }
    }
}
