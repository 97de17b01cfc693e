//! # Step Actions
//!
//! The unit of work a step performs once claimed. The scheduler treats the
//! action as opaque: it only observes success or failure.

use crate::models::Step;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Failure reported by a step action
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StepActionError {
    #[error("Step action failed: {0}")]
    Failed(String),
}

impl StepActionError {
    pub fn failed<S: Into<String>>(message: S) -> Self {
        Self::Failed(message.into())
    }
}

/// Injected capability that runs a single step
#[async_trait]
pub trait StepAction: Send + Sync {
    /// Perform the step's work
    async fn run(&self, step: &Step) -> Result<(), StepActionError>;

    /// Name used in logs
    fn name(&self) -> &str;
}

/// Sleeps for a fixed duration, then succeeds
#[derive(Debug, Clone)]
pub struct SimulatedAction {
    duration: Duration,
}

impl SimulatedAction {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl Default for SimulatedAction {
    fn default() -> Self {
        Self::new(crate::constants::system::DEFAULT_SIMULATED_ACTION_DURATION)
    }
}

#[async_trait]
impl StepAction for SimulatedAction {
    async fn run(&self, step: &Step) -> Result<(), StepActionError> {
        debug!(
            step_id = %step.step_id,
            action = step.action.as_deref().unwrap_or("none"),
            duration_ms = self.duration.as_millis() as u64,
            "Simulating step work"
        );
        tokio::time::sleep(self.duration).await;
        Ok(())
    }

    fn name(&self) -> &str {
        "simulated"
    }
}
