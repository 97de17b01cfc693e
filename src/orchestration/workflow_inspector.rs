//! Read-only views over workflows, grouped by `workflow_name`.

use crate::models::WorkflowSummary;
use crate::store::{StepStore, StoreResult};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct WorkflowInspector {
    store: Arc<dyn StepStore>,
}

impl std::fmt::Debug for WorkflowInspector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowInspector").finish_non_exhaustive()
    }
}

impl WorkflowInspector {
    pub fn new(store: Arc<dyn StepStore>) -> Self {
        Self { store }
    }

    /// Every workflow with its steps, sorted by name
    pub async fn list_workflows(&self) -> StoreResult<Vec<WorkflowSummary>> {
        let names = self.store.list_workflow_names().await?;
        let mut summaries = Vec::with_capacity(names.len());
        for name in names {
            let steps = self.store.list_by_workflow(&name).await?;
            summaries.push(WorkflowSummary::from_steps(name, steps));
        }
        Ok(summaries)
    }

    pub async fn workflow(&self, workflow_name: &str) -> StoreResult<Option<WorkflowSummary>> {
        let steps = self.store.list_by_workflow(workflow_name).await?;
        if steps.is_empty() {
            return Ok(None);
        }
        Ok(Some(WorkflowSummary::from_steps(workflow_name, steps)))
    }

    /// The workflow that `step_id` belongs to; `None` for an unknown step
    pub async fn related_steps(&self, step_id: Uuid) -> StoreResult<Option<WorkflowSummary>> {
        match self.store.get_by_id(step_id).await? {
            Some(step) => self.workflow(&step.workflow_name).await,
            None => Ok(None),
        }
    }
}
