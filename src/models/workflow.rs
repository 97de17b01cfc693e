use super::step::Step;
use crate::state_machine::StepState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// All steps sharing one workflow name, with a per-state tally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub workflow_name: String,
    pub steps: Vec<Step>,
    pub state_counts: BTreeMap<StepState, usize>,
}

impl WorkflowSummary {
    pub fn from_steps(workflow_name: impl Into<String>, steps: Vec<Step>) -> Self {
        let mut state_counts = BTreeMap::new();
        for step in &steps {
            *state_counts.entry(step.state).or_insert(0) += 1;
        }

        Self {
            workflow_name: workflow_name.into(),
            steps,
            state_counts,
        }
    }

    pub fn count(&self, state: StepState) -> usize {
        self.state_counts.get(&state).copied().unwrap_or(0)
    }

    /// Every step reached a terminal state
    pub fn is_finished(&self) -> bool {
        self.steps.iter().all(Step::is_terminal)
    }

    pub fn has_failures(&self) -> bool {
        self.count(StepState::Failed) > 0
    }
}
