//! # Orchestration
//!
//! The scheduling core and the workflow-level operations around it.
//!
//! ## Core Components
//!
//! - **DependencyResolver**: decides whether a waiting step may run
//! - **StepExecutor**: claims a step, runs its [`StepAction`], records the outcome
//! - **StepScheduler**: the polling loop tying the two together
//! - **WorkflowInitializer**: creates a workflow's steps in one batch
//! - **WorkflowRecipe**: YAML workflow definitions
//! - **WorkflowInspector**: grouped, read-only workflow views

pub mod dependency_resolver;
pub mod recipe;
pub mod scheduler;
pub mod step_action;
pub mod step_executor;
pub mod workflow_initializer;
pub mod workflow_inspector;

pub use dependency_resolver::{DependencyResolver, Eligibility};
pub use recipe::WorkflowRecipe;
pub use scheduler::{CycleReport, SchedulerHandle, StepScheduler};
pub use step_action::{SimulatedAction, StepAction, StepActionError};
pub use step_executor::{ExecutionOutcome, StepExecutor};
pub use workflow_initializer::{
    StepDefinition, WorkflowInitializationError, WorkflowInitializationResult,
    WorkflowInitializer, WorkflowRequest,
};
pub use workflow_inspector::WorkflowInspector;
