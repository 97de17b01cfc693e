//! # Step Store
//!
//! Persistence contract for step records. The scheduler never caches steps between
//! cycles; every decision is made against what a [`StepStore`] returns.
//!
//! ## Contract
//!
//! - `insert` / `insert_batch` create steps in `Waiting` state. A batch is all-or-nothing.
//! - `get_by_id` returns `None` for unknown ids. Callers treat that as "not visible yet".
//! - `update_state` is a compare-and-set on the current state: the write only happens
//!   when the stored state equals `expected`. A lost race reports
//!   [`UpdateOutcome::Conflict`] and leaves the record untouched.
//!
//! Two implementations ship with the crate:
//!
//! - [`InMemoryStepStore`] for tests and single-process embedding
//! - [`PgStepStore`] backed by PostgreSQL through SQLx

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStepStore;
pub use postgres::PgStepStore;

use crate::models::{NewStep, StateUpdate, Step};
use crate::state_machine::StepState;
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Error type for storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A step with the same id already exists
    #[error("Duplicate step id: {0}")]
    DuplicateStep(Uuid),

    /// A persisted record could not be decoded
    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of a conditional state update
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// The update was written; carries the record as stored
    Applied(Step),
    /// The stored state did not match the expected state
    Conflict { actual: StepState },
    NotFound,
}

impl UpdateOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Storage trait for workflow steps
#[async_trait]
pub trait StepStore: Send + Sync {
    /// Insert a single step in `Waiting` state and return its id
    async fn insert(&self, new_step: NewStep) -> StoreResult<Uuid>;

    /// Insert a batch atomically, returning ids in input order
    async fn insert_batch(&self, new_steps: Vec<NewStep>) -> StoreResult<Vec<Uuid>>;

    async fn get_by_id(&self, step_id: Uuid) -> StoreResult<Option<Step>>;

    async fn list_by_workflow(&self, workflow_name: &str) -> StoreResult<Vec<Step>>;

    async fn list_by_state(&self, state: StepState) -> StoreResult<Vec<Step>>;

    /// Distinct workflow names, sorted
    async fn list_workflow_names(&self) -> StoreResult<Vec<String>>;

    /// Write `update` only if the step is currently in `expected`
    async fn update_state(
        &self,
        step_id: Uuid,
        expected: StepState,
        update: StateUpdate,
    ) -> StoreResult<UpdateOutcome>;
}
