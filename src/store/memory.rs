use super::{StepStore, StoreError, StoreResult, UpdateOutcome};
use crate::models::{NewStep, StateUpdate, Step};
use crate::state_machine::StepState;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

#[derive(Debug, Default)]
struct Records {
    by_id: HashMap<Uuid, Step>,
    insertion_order: Vec<Uuid>,
}

impl Records {
    fn ordered(&self) -> impl Iterator<Item = &Step> {
        self.insertion_order
            .iter()
            .filter_map(|step_id| self.by_id.get(step_id))
    }
}

/// Process-local step store. Every mutation happens under one write lock, so each
/// conditional update is a single atomic read-modify-write.
#[derive(Debug, Default)]
pub struct InMemoryStepStore {
    records: RwLock<Records>,
}

impl InMemoryStepStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every step in insertion order
    pub fn all_steps(&self) -> Vec<Step> {
        self.records.read().ordered().cloned().collect()
    }
}

#[async_trait]
impl StepStore for InMemoryStepStore {
    async fn insert(&self, new_step: NewStep) -> StoreResult<Uuid> {
        let mut ids = self.insert_batch(vec![new_step]).await?;
        ids.pop()
            .ok_or_else(|| StoreError::InvalidData("empty insert result".to_string()))
    }

    async fn insert_batch(&self, new_steps: Vec<NewStep>) -> StoreResult<Vec<Uuid>> {
        let mut records = self.records.write();

        // Reject the whole batch before touching anything
        let mut batch_ids = BTreeSet::new();
        for new_step in &new_steps {
            if records.by_id.contains_key(&new_step.step_id) || !batch_ids.insert(new_step.step_id)
            {
                return Err(StoreError::DuplicateStep(new_step.step_id));
            }
        }

        let now = Utc::now();
        let mut ids = Vec::with_capacity(new_steps.len());
        for new_step in new_steps {
            let step = new_step.into_step(now);
            ids.push(step.step_id);
            records.insertion_order.push(step.step_id);
            records.by_id.insert(step.step_id, step);
        }

        Ok(ids)
    }

    async fn get_by_id(&self, step_id: Uuid) -> StoreResult<Option<Step>> {
        Ok(self.records.read().by_id.get(&step_id).cloned())
    }

    async fn list_by_workflow(&self, workflow_name: &str) -> StoreResult<Vec<Step>> {
        Ok(self
            .records
            .read()
            .ordered()
            .filter(|step| step.workflow_name == workflow_name)
            .cloned()
            .collect())
    }

    async fn list_by_state(&self, state: StepState) -> StoreResult<Vec<Step>> {
        Ok(self
            .records
            .read()
            .ordered()
            .filter(|step| step.state == state)
            .cloned()
            .collect())
    }

    async fn list_workflow_names(&self) -> StoreResult<Vec<String>> {
        let names: BTreeSet<String> = self
            .records
            .read()
            .by_id
            .values()
            .map(|step| step.workflow_name.clone())
            .collect();
        Ok(names.into_iter().collect())
    }

    async fn update_state(
        &self,
        step_id: Uuid,
        expected: StepState,
        update: StateUpdate,
    ) -> StoreResult<UpdateOutcome> {
        let mut records = self.records.write();

        let Some(step) = records.by_id.get_mut(&step_id) else {
            return Ok(UpdateOutcome::NotFound);
        };

        if step.state != expected {
            return Ok(UpdateOutcome::Conflict { actual: step.state });
        }

        update.apply_to(step);
        Ok(UpdateOutcome::Applied(step.clone()))
    }
}
