//! Error types for the step scheduler.
//!

use crate::config::ConfigurationError;
use crate::orchestration::step_action::StepActionError;
use crate::orchestration::workflow_initializer::WorkflowInitializationError;
use crate::state_machine::errors::StateMachineError;
use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StepchainError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Store error: {0}")]
    StoreError(String),
    #[error("State transition error: {0}")]
    StateTransitionError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Orchestration error: {0}")]
    OrchestrationError(String),
}

impl From<serde_json::Error> for StepchainError {
    fn from(error: serde_json::Error) -> Self {
        StepchainError::ValidationError(format!("JSON serialization error: {error}"))
    }
}

impl From<serde_yaml::Error> for StepchainError {
    fn from(error: serde_yaml::Error) -> Self {
        StepchainError::ValidationError(format!("YAML parse error: {error}"))
    }
}

impl From<sqlx::Error> for StepchainError {
    fn from(err: sqlx::Error) -> Self {
        StepchainError::DatabaseError(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for StepchainError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StepchainError::DatabaseError(format!("Migration failed: {err}"))
    }
}

impl From<StoreError> for StepchainError {
    fn from(err: StoreError) -> Self {
        StepchainError::StoreError(err.to_string())
    }
}

impl From<StateMachineError> for StepchainError {
    fn from(err: StateMachineError) -> Self {
        StepchainError::StateTransitionError(err.to_string())
    }
}

impl From<ConfigurationError> for StepchainError {
    fn from(err: ConfigurationError) -> Self {
        StepchainError::ConfigurationError(err.to_string())
    }
}

impl From<StepActionError> for StepchainError {
    fn from(err: StepActionError) -> Self {
        StepchainError::OrchestrationError(err.to_string())
    }
}

impl From<WorkflowInitializationError> for StepchainError {
    fn from(err: WorkflowInitializationError) -> Self {
        match err {
            WorkflowInitializationError::Store(store_error) => store_error.into(),
            other => StepchainError::ValidationError(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, StepchainError>;
