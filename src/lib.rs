#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Stepchain Core
//!
//! A polling scheduler that drives chains of dependent workflow steps to completion.
//!
//! ## Overview
//!
//! A workflow is a named batch of steps. Each step may depend on exactly one other
//! step of the same workflow. On a fixed cadence the scheduler scans every `Waiting`
//! step, keeps those whose dependency has `Succeeded` (or that have none), claims
//! each with a compare-and-set `Waiting -> Running` and records `Succeeded` or
//! `Failed` once its action returns. Dependents are discovered by the next cycle.
//!
//! ## Module Organization
//!
//! - [`models`] - Step records and workflow summaries
//! - [`state_machine`] - Step states, events and guarded transitions
//! - [`store`] - The persistence contract with in-memory and PostgreSQL backends
//! - [`orchestration`] - Dependency resolution, execution and the scheduler loop
//! - [`database`] - Connection pooling and embedded migrations
//! - [`config`] - Layered YAML/environment configuration
//! - [`logging`] - Structured logging setup
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stepchain_core::config::StepchainConfig;
//! use stepchain_core::orchestration::{StepDefinition, StepScheduler, WorkflowInitializer, WorkflowRequest};
//! use stepchain_core::store::InMemoryStepStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryStepStore::new());
//!
//! WorkflowInitializer::new(store.clone())
//!     .create_workflow(
//!         WorkflowRequest::new("reports")
//!             .with_step(StepDefinition::new("extract"))
//!             .with_step(StepDefinition::new("render").depends_on("extract")),
//!     )
//!     .await?;
//!
//! let scheduler = StepScheduler::from_config(store, &StepchainConfig::default());
//! let report = scheduler.run_cycle().await?;
//! println!("{} steps ran", report.executed());
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! Unit tests live next to the code; integration tests under `tests/` run against
//! [`store::InMemoryStepStore`]. PostgreSQL store tests use `#[sqlx::test]` and are
//! ignored unless `DATABASE_URL` points at a database.

pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod state_machine;
pub mod store;

pub use config::{ConfigManager, StepchainConfig};
pub use error::{Result, StepchainError};
pub use models::{NewStep, Step, WorkflowSummary};
pub use orchestration::{
    DependencyResolver, ExecutionOutcome, StepExecutor, StepScheduler, WorkflowInitializer,
};
pub use state_machine::{StepState, StepStateMachine};
pub use store::{InMemoryStepStore, PgStepStore, StepStore, StoreError};
