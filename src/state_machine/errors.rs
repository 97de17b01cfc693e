use super::states::StepState;
use crate::store::StoreError;
use thiserror::Error;
use uuid::Uuid;

/// Error types for step state machine operations
#[derive(Error, Debug)]
pub enum StateMachineError {
    #[error("Invalid state transition from {from} on event {event}")]
    InvalidTransition { from: StepState, event: String },

    #[error("Concurrent modification detected for step {step_id}: expected {expected}, found {actual}")]
    ConcurrentModification {
        step_id: Uuid,
        expected: StepState,
        actual: StepState,
    },

    #[error("Step not found: {step_id}")]
    StepNotFound { step_id: Uuid },

    #[error("Persistence operation failed: {0}")]
    Persistence(#[from] StoreError),
}

impl StateMachineError {
    /// Conflicts and vanished steps mean another writer owns the step; callers skip it
    pub fn is_lost_claim(&self) -> bool {
        matches!(
            self,
            Self::ConcurrentModification { .. } | Self::StepNotFound { .. }
        )
    }
}

/// Result type alias for state machine operations
pub type StateMachineResult<T> = Result<T, StateMachineError>;
