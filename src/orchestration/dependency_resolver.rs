//! # Dependency Resolver
//!
//! Decides whether a `Waiting` step may run. A step is eligible when it has no
//! dependency, or when the step it depends on has `Succeeded`. A dependency that
//! is not visible in the store yet is "not ready", never an error. A `Failed`
//! dependency blocks its dependent permanently.

use crate::models::Step;
use crate::state_machine::StepState;
use crate::store::{StepStore, StoreResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Why a step is or is not eligible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Eligibility {
    NoDependency,
    DependencySucceeded { dependency_id: Uuid },
    DependencyPending { dependency_id: Uuid, state: StepState },
    /// The referenced step does not exist (yet)
    DependencyMissing { dependency_id: Uuid },
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Self::NoDependency | Self::DependencySucceeded { .. })
    }

    /// Blocked by a dependency that will never succeed
    pub fn is_permanently_blocked(&self) -> bool {
        matches!(
            self,
            Self::DependencyPending {
                state: StepState::Failed,
                ..
            }
        )
    }
}

/// Stateless eligibility check against the authoritative store
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyResolver;

impl DependencyResolver {
    pub fn new() -> Self {
        Self
    }

    /// Classify a step's readiness
    #[instrument(skip(self, step, store), fields(step_id = %step.step_id))]
    pub async fn check(&self, step: &Step, store: &dyn StepStore) -> StoreResult<Eligibility> {
        let Some(dependency_id) = step.dependency_id else {
            return Ok(Eligibility::NoDependency);
        };

        let eligibility = match store.get_by_id(dependency_id).await? {
            None => Eligibility::DependencyMissing { dependency_id },
            Some(dependency) if dependency.state.satisfies_dependencies() => {
                Eligibility::DependencySucceeded { dependency_id }
            }
            Some(dependency) => Eligibility::DependencyPending {
                dependency_id,
                state: dependency.state,
            },
        };

        match eligibility {
            Eligibility::DependencyMissing { .. } => debug!(
                dependency_id = %dependency_id,
                "Dependency not visible in store; treating as not ready"
            ),
            Eligibility::DependencyPending {
                state: StepState::Failed,
                ..
            } => warn!(
                step_id = %step.step_id,
                workflow_name = %step.workflow_name,
                step_name = %step.step_name,
                dependency_id = %dependency_id,
                "Step is blocked by a failed dependency"
            ),
            _ => {}
        }

        Ok(eligibility)
    }

    /// `true` iff the step has no dependency or its dependency has succeeded
    pub async fn is_eligible(&self, step: &Step, store: &dyn StepStore) -> StoreResult<bool> {
        Ok(self.check(step, store).await?.is_eligible())
    }
}
