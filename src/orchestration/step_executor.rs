//! # Step Executor
//!
//! Claims one step, runs its action and records the terminal state.
//!
//! The claim is a compare-and-set `Waiting -> Running`. A claimant that loses the
//! race (or finds the step gone) skips it without writing anything. Once claimed,
//! the action's outcome is persisted as `Succeeded` or `Failed`; the failure
//! message goes to `last_error` and to the log.
//!
//! Writing the terminal state is retried a bounded number of times with a linear
//! backoff, so a transient store failure does not strand a step in `Running`. A
//! retry that finds the step already in the target state counts as success: the
//! earlier write landed even though the store reported an error.
//!
//! The executor only ever writes the one step it was given. Dependents are picked
//! up by the next scheduler cycle.

use super::step_action::StepAction;
use crate::constants::{operations, system};
use crate::logging::log_step_operation;
use crate::models::Step;
use crate::state_machine::{
    StateMachineError, StateMachineResult, StepEvent, StepState, StepStateMachine,
};
use crate::store::StepStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// What happened to a step handed to the executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Succeeded,
    Failed { error: String },
    /// Not claimed by this executor; nothing was written
    Skipped { reason: String },
}

impl ExecutionOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

/// Runs claimed steps through an injected [`StepAction`]
#[derive(Clone)]
pub struct StepExecutor {
    store: Arc<dyn StepStore>,
    action: Arc<dyn StepAction>,
    finalize_attempts: u32,
    finalize_backoff: Duration,
}

impl std::fmt::Debug for StepExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepExecutor")
            .field("action", &self.action.name())
            .field("finalize_attempts", &self.finalize_attempts)
            .field("finalize_backoff", &self.finalize_backoff)
            .finish()
    }
}

impl StepExecutor {
    pub fn new(store: Arc<dyn StepStore>, action: Arc<dyn StepAction>) -> Self {
        Self {
            store,
            action,
            finalize_attempts: system::DEFAULT_FINALIZE_MAX_ATTEMPTS,
            finalize_backoff: system::DEFAULT_FINALIZE_RETRY_BACKOFF,
        }
    }

    /// Override how often the terminal write is attempted; `attempts` is clamped to 1
    pub fn with_finalize_retry(mut self, attempts: u32, backoff: Duration) -> Self {
        self.finalize_attempts = attempts.max(1);
        self.finalize_backoff = backoff;
        self
    }

    pub fn action_name(&self) -> &str {
        self.action.name()
    }

    /// Claim, run and finalize a single step
    ///
    /// A store failure while writing the outcome is retried; only when every attempt
    /// fails is the error returned, leaving the step `Running`. There is no lease to
    /// recover it after that.
    #[instrument(skip(self, step), fields(step_id = %step.step_id, step = %step.get_step_identifier()))]
    pub async fn execute(&self, step: Step) -> StateMachineResult<ExecutionOutcome> {
        let step_identifier = step.get_step_identifier();
        let step_id = step.step_id;
        let mut state_machine = StepStateMachine::new(step, Arc::clone(&self.store));

        match state_machine.claim().await {
            Ok(_) => {}
            Err(e) if e.is_lost_claim() => {
                log_step_operation(
                    operations::STEP_CLAIM_CONFLICT,
                    step_id,
                    &step_identifier,
                    "skipped",
                    Some(&e.to_string()),
                );
                return Ok(ExecutionOutcome::Skipped {
                    reason: e.to_string(),
                });
            }
            Err(StateMachineError::InvalidTransition { from, .. }) => {
                debug!(state = %from, "Step is not waiting; skipping");
                return Ok(ExecutionOutcome::Skipped {
                    reason: format!("step is {from}, not waiting"),
                });
            }
            Err(e) => return Err(e),
        }

        log_step_operation(
            operations::STEP_CLAIMED,
            step_id,
            &step_identifier,
            "running",
            Some(self.action.name()),
        );

        let result = self.action.run(state_machine.step()).await;

        match result {
            Ok(()) => {
                self.finalize(&mut state_machine, StepEvent::Complete)
                    .await
                    .inspect_err(|e| error!(error = %e, "Failed to record step success"))?;

                info!(workflow_name = %state_machine.step().workflow_name, "Step succeeded");
                log_step_operation(
                    operations::STEP_SUCCEEDED,
                    step_id,
                    &step_identifier,
                    "succeeded",
                    None,
                );
                Ok(ExecutionOutcome::Succeeded)
            }
            Err(action_error) => {
                let message = action_error.to_string();
                warn!(error = %message, action = self.action.name(), "Step action failed");

                self.finalize(&mut state_machine, StepEvent::fail_with_error(message.clone()))
                    .await
                    .inspect_err(|e| error!(error = %e, "Failed to record step failure"))?;

                log_step_operation(
                    operations::STEP_FAILED,
                    step_id,
                    &step_identifier,
                    "failed",
                    Some(&message),
                );
                Ok(ExecutionOutcome::Failed { error: message })
            }
        }
    }

    /// Persist the terminal state of a claimed step, retrying store failures
    async fn finalize(
        &self,
        state_machine: &mut StepStateMachine,
        event: StepEvent,
    ) -> StateMachineResult<StepState> {
        let target = StepStateMachine::determine_target_state(StepState::Running, &event)?;
        let mut attempt = 1;

        loop {
            match state_machine.transition(event.clone()).await {
                Ok(state) => return Ok(state),
                Err(StateMachineError::ConcurrentModification { actual, .. })
                    if attempt > 1 && actual == target =>
                {
                    debug!(attempt, state = %actual, "Earlier terminal write had landed");
                    return Ok(actual);
                }
                Err(StateMachineError::Persistence(e)) if attempt < self.finalize_attempts => {
                    warn!(
                        attempt,
                        max_attempts = self.finalize_attempts,
                        event = event.event_type(),
                        error = %e,
                        "Terminal write failed; retrying"
                    );
                    tokio::time::sleep(self.finalize_backoff * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
