use crate::state_machine::StepState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Step represents one schedulable unit of work within a named workflow
/// Maps to `stepchain_workflow_steps` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub step_id: Uuid,
    pub workflow_name: String,
    pub step_name: String,
    /// Opaque descriptor of what to execute
    pub action: Option<String>,
    pub payload: serde_json::Value,
    pub state: StepState,
    /// At most one dependency, referenced by step id
    pub dependency_id: Option<Uuid>,
    /// Failure reason captured when the step enters `Failed`
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub state_changed_at: DateTime<Utc>,
}

/// New Step for creation. The id is allocated here so a creator can wire
/// dependency references before the batch reaches the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStep {
    pub step_id: Uuid,
    pub workflow_name: String,
    pub step_name: String,
    pub action: Option<String>,
    pub payload: serde_json::Value,
    pub dependency_id: Option<Uuid>,
}

impl NewStep {
    pub fn new(workflow_name: impl Into<String>, step_name: impl Into<String>) -> Self {
        Self {
            step_id: Uuid::new_v4(),
            workflow_name: workflow_name.into(),
            step_name: step_name.into(),
            action: None,
            payload: serde_json::Value::Object(serde_json::Map::new()),
            dependency_id: None,
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_dependency(mut self, dependency_id: Uuid) -> Self {
        self.dependency_id = Some(dependency_id);
        self
    }

    /// Materialize the record a store persists: `Waiting`, both timestamps equal
    pub fn into_step(self, now: DateTime<Utc>) -> Step {
        Step {
            step_id: self.step_id,
            workflow_name: self.workflow_name,
            step_name: self.step_name,
            action: self.action,
            payload: self.payload,
            state: StepState::Waiting,
            dependency_id: self.dependency_id,
            last_error: None,
            created_at: now,
            state_changed_at: now,
        }
    }
}

/// The only mutable fields of a step, written together in one store operation
#[derive(Debug, Clone, PartialEq)]
pub struct StateUpdate {
    pub state: StepState,
    pub state_changed_at: DateTime<Utc>,
    pub last_error: Option<String>,
}

impl StateUpdate {
    pub fn new(state: StepState, state_changed_at: DateTime<Utc>) -> Self {
        Self {
            state,
            state_changed_at,
            last_error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.last_error = Some(error.into());
        self
    }

    /// Apply to a step record, never moving `state_changed_at` before `created_at`
    pub fn apply_to(&self, step: &mut Step) {
        step.state = self.state;
        step.state_changed_at = self.state_changed_at.max(step.created_at);
        step.last_error = self.last_error.clone();
    }
}

impl Step {
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Get step identifier for logging
    pub fn get_step_identifier(&self) -> String {
        format!("{}/{}", self.workflow_name, self.step_name)
    }
}
