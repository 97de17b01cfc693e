//! Shared helpers for integration tests.

#![allow(dead_code)]

pub mod strategies;

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use stepchain_core::config::SchedulerConfig;
use stepchain_core::models::{NewStep, StateUpdate, Step};
use stepchain_core::orchestration::{StepAction, StepActionError, StepExecutor, StepScheduler};
use stepchain_core::state_machine::StepState;
use stepchain_core::store::{
    InMemoryStepStore, StepStore, StoreError, StoreResult, UpdateOutcome,
};
use uuid::Uuid;

/// Action that fails for chosen step names and records what it ran
#[derive(Debug, Default)]
pub struct ScriptedAction {
    failing: HashSet<String>,
    delay: Duration,
    runs: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedAction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, step_name: &str) -> Self {
        self.failing.insert(step_name.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Step names in the order their runs started
    pub fn runs(&self) -> Vec<String> {
        self.runs.lock().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StepAction for ScriptedAction {
    async fn run(&self, step: &Step) -> Result<(), StepActionError> {
        self.runs.lock().push(step.step_name.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&step.step_name) {
            return Err(StepActionError::failed(format!(
                "{} exited with status 1",
                step.step_name
            )));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// In-memory store that can be switched off to simulate an outage
#[derive(Debug, Default)]
pub struct OutageStore {
    inner: InMemoryStepStore,
    down: AtomicBool,
    terminal_write_failures: AtomicUsize,
}

impl OutageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Reject the next `count` writes of `Succeeded`/`Failed`
    pub fn fail_terminal_writes(&self, count: usize) {
        self.terminal_write_failures.store(count, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> Vec<Step> {
        self.inner.all_steps()
    }

    fn check(&self) -> StoreResult<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StepStore for OutageStore {
    async fn insert(&self, new_step: NewStep) -> StoreResult<Uuid> {
        self.check()?;
        self.inner.insert(new_step).await
    }

    async fn insert_batch(&self, new_steps: Vec<NewStep>) -> StoreResult<Vec<Uuid>> {
        self.check()?;
        self.inner.insert_batch(new_steps).await
    }

    async fn get_by_id(&self, step_id: Uuid) -> StoreResult<Option<Step>> {
        self.check()?;
        self.inner.get_by_id(step_id).await
    }

    async fn list_by_workflow(&self, workflow_name: &str) -> StoreResult<Vec<Step>> {
        self.check()?;
        self.inner.list_by_workflow(workflow_name).await
    }

    async fn list_by_state(&self, state: StepState) -> StoreResult<Vec<Step>> {
        self.check()?;
        self.inner.list_by_state(state).await
    }

    async fn list_workflow_names(&self) -> StoreResult<Vec<String>> {
        self.check()?;
        self.inner.list_workflow_names().await
    }

    async fn update_state(
        &self,
        step_id: Uuid,
        expected: StepState,
        update: StateUpdate,
    ) -> StoreResult<UpdateOutcome> {
        self.check()?;
        if update.state.is_terminal()
            && self
                .terminal_write_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        {
            return Err(StoreError::Unavailable("write timed out".to_string()));
        }
        self.inner.update_state(step_id, expected, update).await
    }
}

pub fn scheduler_config(max_concurrent_steps: usize) -> SchedulerConfig {
    SchedulerConfig {
        enabled: true,
        polling_interval_ms: 10,
        max_concurrent_steps,
    }
}

pub fn scheduler_with(
    store: Arc<dyn StepStore>,
    action: Arc<ScriptedAction>,
    max_concurrent_steps: usize,
) -> StepScheduler {
    let executor = StepExecutor::new(Arc::clone(&store), action)
        .with_finalize_retry(3, Duration::from_millis(1));
    StepScheduler::with_executor(store, executor, scheduler_config(max_concurrent_steps))
}

pub async fn state_of(store: &dyn StepStore, step_id: Uuid) -> StepState {
    store
        .get_by_id(step_id)
        .await
        .expect("store lookup")
        .expect("step exists")
        .state
}
