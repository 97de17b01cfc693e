use super::{
    errors::{StateMachineError, StateMachineResult},
    events::StepEvent,
    states::StepState,
};
use crate::models::{StateUpdate, Step};
use crate::store::{StepStore, UpdateOutcome};
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

/// Workflow step state machine for individual step management
///
/// Holds the last known snapshot of the step. A transition is only written if the
/// stored state still matches that snapshot, so a stale machine cannot overwrite a
/// newer state.
#[derive(Clone)]
pub struct StepStateMachine {
    step: Step,
    store: Arc<dyn StepStore>,
}

impl std::fmt::Debug for StepStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepStateMachine")
            .field("step_id", &self.step.step_id)
            .field("state", &self.step.state)
            .finish()
    }
}

impl StepStateMachine {
    /// Create a new step state machine instance
    pub fn new(step: Step, store: Arc<dyn StepStore>) -> Self {
        Self { step, store }
    }

    /// Determine the target state based on current state and event
    pub fn determine_target_state(
        current_state: StepState,
        event: &StepEvent,
    ) -> StateMachineResult<StepState> {
        let target = match (current_state, event) {
            (StepState::Waiting, StepEvent::Start) => StepState::Running,
            (StepState::Running, StepEvent::Complete) => StepState::Succeeded,
            (StepState::Running, StepEvent::Fail(_)) => StepState::Failed,

            (from, event) => {
                return Err(StateMachineError::InvalidTransition {
                    from,
                    event: event.event_type().to_string(),
                })
            }
        };

        Ok(target)
    }

    /// Attempt to transition the step state
    pub async fn transition(&mut self, event: StepEvent) -> StateMachineResult<StepState> {
        let current_state = self.step.state;
        let target_state = Self::determine_target_state(current_state, &event)?;

        let mut update = StateUpdate::new(target_state, Utc::now());
        if let Some(message) = event.error_message() {
            update = update.with_error(message);
        }

        let outcome = self
            .store
            .update_state(self.step.step_id, current_state, update)
            .await?;

        match outcome {
            UpdateOutcome::Applied(step) => {
                debug!(
                    step_id = %step.step_id,
                    from_state = %current_state,
                    to_state = %step.state,
                    event = event.event_type(),
                    "Step transitioned"
                );
                self.step = step;
                Ok(target_state)
            }
            UpdateOutcome::Conflict { actual } => Err(StateMachineError::ConcurrentModification {
                step_id: self.step.step_id,
                expected: current_state,
                actual,
            }),
            UpdateOutcome::NotFound => Err(StateMachineError::StepNotFound {
                step_id: self.step.step_id,
            }),
        }
    }

    /// Claim the step: `Waiting -> Running`
    pub async fn claim(&mut self) -> StateMachineResult<StepState> {
        self.transition(StepEvent::Start).await
    }

    pub fn current_state(&self) -> StepState {
        self.step.state
    }

    pub fn is_terminal(&self) -> bool {
        self.step.state.is_terminal()
    }

    /// Get step information
    pub fn step(&self) -> &Step {
        &self.step
    }

    pub fn into_step(self) -> Step {
        self.step
    }
}
