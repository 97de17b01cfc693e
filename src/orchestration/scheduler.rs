//! # Step Scheduler
//!
//! Polling loop that drives waiting steps to completion.
//!
//! Each cycle:
//!
//! 1. lists every `Waiting` step from the store,
//! 2. checks each against the [`DependencyResolver`],
//! 3. hands the eligible ones to the [`StepExecutor`],
//! 4. then sleeps for `polling_interval` before the next cycle.
//!
//! Eligibility for the whole batch is settled before anything runs, so a step whose
//! dependency finishes during a cycle waits for the next one. Nothing is cached
//! between cycles; a restarted scheduler simply re-scans.

use super::dependency_resolver::DependencyResolver;
use super::step_action::{SimulatedAction, StepAction};
use super::step_executor::{ExecutionOutcome, StepExecutor};
use crate::config::{SchedulerConfig, StepchainConfig};
use crate::constants::operations;
use crate::models::Step;
use crate::state_machine::StepState;
use crate::store::{StepStore, StoreResult};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Counters for one scheduler cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// `Waiting` steps seen
    pub scanned: usize,
    pub eligible: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Eligible steps another claimant took first
    pub skipped: usize,
    /// Waiting on a `Failed` dependency
    pub blocked: usize,
    /// Executions that hit a store error after claiming
    pub errored: usize,
}

impl CycleReport {
    pub fn executed(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn is_idle(&self) -> bool {
        self.eligible == 0
    }
}

#[derive(Clone)]
pub struct StepScheduler {
    scheduler_id: Uuid,
    store: Arc<dyn StepStore>,
    resolver: DependencyResolver,
    executor: StepExecutor,
    config: SchedulerConfig,
}

impl std::fmt::Debug for StepScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepScheduler")
            .field("scheduler_id", &self.scheduler_id)
            .field("config", &self.config)
            .field("executor", &self.executor)
            .finish()
    }
}

impl StepScheduler {
    pub fn new(
        store: Arc<dyn StepStore>,
        action: Arc<dyn StepAction>,
        config: SchedulerConfig,
    ) -> Self {
        let executor = StepExecutor::new(Arc::clone(&store), action);
        Self::with_executor(store, executor, config)
    }

    /// Build around a preconfigured executor that writes to the same store
    pub fn with_executor(
        store: Arc<dyn StepStore>,
        executor: StepExecutor,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            scheduler_id: Uuid::new_v4(),
            store,
            resolver: DependencyResolver::new(),
            executor,
            config,
        }
    }

    /// Scheduler running the simulated action configured under `executor`
    pub fn from_config(store: Arc<dyn StepStore>, config: &StepchainConfig) -> Self {
        let action = Arc::new(SimulatedAction::new(config.executor.simulated_duration()));
        let executor = StepExecutor::new(Arc::clone(&store), action).with_finalize_retry(
            config.executor.finalize_max_attempts,
            config.executor.finalize_retry_backoff(),
        );
        Self::with_executor(store, executor, config.scheduler.clone())
    }

    pub fn scheduler_id(&self) -> Uuid {
        self.scheduler_id
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Run one scan-resolve-execute pass
    ///
    /// Fails only when the store cannot list or resolve steps; per-step execution
    /// errors are counted in the report.
    #[instrument(skip(self), fields(scheduler_id = %self.scheduler_id))]
    pub async fn run_cycle(&self) -> StoreResult<CycleReport> {
        let waiting = self.store.list_by_state(StepState::Waiting).await?;
        let mut report = CycleReport {
            scanned: waiting.len(),
            ..CycleReport::default()
        };

        let mut eligible: Vec<Step> = Vec::new();
        for step in waiting {
            let eligibility = self.resolver.check(&step, self.store.as_ref()).await?;
            if eligibility.is_eligible() {
                eligible.push(step);
            } else if eligibility.is_permanently_blocked() {
                report.blocked += 1;
            }
        }
        report.eligible = eligible.len();

        let concurrency = self.config.max_concurrent_steps.max(1);
        let outcomes: Vec<_> = stream::iter(eligible)
            .map(|step| {
                let executor = self.executor.clone();
                let step_id = step.step_id;
                async move { (step_id, executor.execute(step).await) }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        for (step_id, outcome) in outcomes {
            match outcome {
                Ok(ExecutionOutcome::Succeeded) => report.succeeded += 1,
                Ok(ExecutionOutcome::Failed { .. }) => report.failed += 1,
                Ok(ExecutionOutcome::Skipped { .. }) => report.skipped += 1,
                Err(e) => {
                    error!(step_id = %step_id, error = %e, "Step execution aborted");
                    report.errored += 1;
                }
            }
        }

        if report.scanned > 0 {
            info!(
                operation = operations::SCHEDULER_CYCLE,
                scanned = report.scanned,
                eligible = report.eligible,
                succeeded = report.succeeded,
                failed = report.failed,
                skipped = report.skipped,
                blocked = report.blocked,
                errored = report.errored,
                "Scheduler cycle complete"
            );
        } else {
            debug!("No waiting steps");
        }

        Ok(report)
    }

    /// Cycle, sleep, repeat until `shutdown` resolves
    ///
    /// A failed cycle is logged and retried after the normal interval. Shutdown is
    /// observed between cycles; a cycle in progress runs to completion.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let interval = self.config.polling_interval();

        info!(
            scheduler_id = %self.scheduler_id,
            polling_interval_ms = interval.as_millis() as u64,
            max_concurrent_steps = self.config.max_concurrent_steps,
            action = self.executor.action_name(),
            "Starting scheduler loop"
        );

        loop {
            if let Err(e) = self.run_cycle().await {
                error!(
                    scheduler_id = %self.scheduler_id,
                    error = %e,
                    "Scheduler cycle failed; retrying next interval"
                );
            }

            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!(scheduler_id = %self.scheduler_id, "Scheduler loop stopped");
    }

    /// Run the loop on a background task
    pub fn spawn(&self) -> SchedulerHandle {
        if !self.config.enabled {
            info!(scheduler_id = %self.scheduler_id, "Scheduler disabled");
            return SchedulerHandle {
                scheduler_id: self.scheduler_id,
                stop_tx: None,
                join_handle: None,
            };
        }

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let scheduler = self.clone();
        let join_handle = tokio::spawn(async move {
            scheduler
                .run_until(async {
                    // A dropped sender also stops the loop
                    let _ = stop_rx.await;
                })
                .await;
        });

        SchedulerHandle {
            scheduler_id: self.scheduler_id,
            stop_tx: Some(stop_tx),
            join_handle: Some(join_handle),
        }
    }
}

/// Owner of a spawned scheduler loop
#[derive(Debug)]
pub struct SchedulerHandle {
    scheduler_id: Uuid,
    stop_tx: Option<oneshot::Sender<()>>,
    join_handle: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn scheduler_id(&self) -> Uuid {
        self.scheduler_id
    }

    pub fn is_running(&self) -> bool {
        self.join_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Signal the loop and wait for the current cycle to finish
    pub async fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            info!(scheduler_id = %self.scheduler_id, "Stopping scheduler");
            let _ = stop_tx.send(());
        }

        if let Some(handle) = self.join_handle.take() {
            if let Err(e) = handle.await {
                warn!(scheduler_id = %self.scheduler_id, error = %e, "Scheduler task ended abnormally");
            }
        }
    }
}
