//! # Workflow Initializer
//!
//! Turns a workflow definition into a batch of `Waiting` step records.
//!
//! Workflow names, step names and `depends_on` entries are trimmed before they
//! are validated, so what gets stored is exactly what was checked.
//!
//! Step ids are allocated up front, so `depends_on` names are resolved to ids
//! before anything is written and the whole workflow lands in one atomic
//! `insert_batch`. Only the first `depends_on` entry is wired; steps carry at
//! most one dependency.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use stepchain_core::orchestration::{StepDefinition, WorkflowInitializer, WorkflowRequest};
//! use stepchain_core::store::InMemoryStepStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let initializer = WorkflowInitializer::new(Arc::new(InMemoryStepStore::new()));
//!
//! let request = WorkflowRequest::new("reports")
//!     .with_step(StepDefinition::new("extract").with_action("extract_rows"))
//!     .with_step(StepDefinition::new("publish").depends_on("extract"));
//!
//! let result = initializer.create_workflow(request).await?;
//! println!("Created {} steps", result.step_count);
//! # Ok(())
//! # }
//! ```

use crate::constants::{operations, system};
use crate::logging::log_workflow_operation;
use crate::models::NewStep;
use crate::store::{StepStore, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// One declared step of a workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepDefinition {
    pub name: String,
    #[serde(default)]
    pub action: Option<String>,
    /// Names of steps this one waits for; only the first is honored
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl StepDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            action: None,
            depends_on: Vec::new(),
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn depends_on(mut self, step_name: impl Into<String>) -> Self {
        self.depends_on.push(step_name.into());
        self
    }

    fn wired_dependency(&self) -> Option<&str> {
        self.depends_on.first().map(String::as_str)
    }

    fn trimmed(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            action: self.action,
            depends_on: self
                .depends_on
                .iter()
                .map(|dependency| dependency.trim().to_string())
                .collect(),
        }
    }
}

/// Request to create every step of one workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRequest {
    pub workflow_name: String,
    /// Copied unchanged onto every step
    #[serde(default = "empty_payload")]
    pub payload: serde_json::Value,
    pub steps: Vec<StepDefinition>,
}

fn empty_payload() -> serde_json::Value {
    serde_json::json!({})
}

impl WorkflowRequest {
    pub fn new(workflow_name: impl Into<String>) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            payload: empty_payload(),
            steps: Vec::new(),
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_step(mut self, step: StepDefinition) -> Self {
        self.steps.push(step);
        self
    }

    fn trimmed(self) -> Self {
        Self {
            workflow_name: self.workflow_name.trim().to_string(),
            payload: self.payload,
            steps: self.steps.into_iter().map(StepDefinition::trimmed).collect(),
        }
    }
}

/// Result of workflow initialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInitializationResult {
    pub workflow_name: String,
    /// Number of steps created
    pub step_count: usize,
    /// Mapping of step names to step ids
    pub step_mapping: HashMap<String, Uuid>,
}

#[derive(Debug, Error)]
pub enum WorkflowInitializationError {
    #[error("Invalid workflow definition: {0}")]
    InvalidDefinition(String),

    #[error("Dependency cycle through step '{0}'")]
    DependencyCycle(String),

    #[error("Failed to persist workflow: {0}")]
    Store(#[from] StoreError),
}

/// Creates workflows as batches of step records
#[derive(Clone)]
pub struct WorkflowInitializer {
    store: Arc<dyn StepStore>,
}

impl std::fmt::Debug for WorkflowInitializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowInitializer").finish_non_exhaustive()
    }
}

impl WorkflowInitializer {
    pub fn new(store: Arc<dyn StepStore>) -> Self {
        Self { store }
    }

    /// Validate the request and insert all of its steps atomically
    #[instrument(skip(self, request), fields(workflow_name = %request.workflow_name, steps = request.steps.len()))]
    pub async fn create_workflow(
        &self,
        request: WorkflowRequest,
    ) -> Result<WorkflowInitializationResult, WorkflowInitializationError> {
        let request = request.trimmed();
        Self::validate(&request)?;

        let step_mapping: HashMap<String, Uuid> = request
            .steps
            .iter()
            .map(|definition| (definition.name.clone(), Uuid::new_v4()))
            .collect();

        let mut new_steps = Vec::with_capacity(request.steps.len());
        for definition in &request.steps {
            if definition.depends_on.len() > 1 {
                warn!(
                    step_name = %definition.name,
                    ignored = ?definition.depends_on.get(1..),
                    "Only the first dependency is honored"
                );
            }

            let mut new_step = NewStep::new(&request.workflow_name, &definition.name)
                .with_payload(request.payload.clone());
            new_step.step_id = step_mapping[&definition.name];
            if let Some(action) = &definition.action {
                new_step = new_step.with_action(action);
            }
            if let Some(dependency) = definition.wired_dependency() {
                new_step = new_step.with_dependency(step_mapping[dependency]);
            }

            debug!(step_name = %definition.name, step_id = %new_step.step_id, "Prepared step");
            new_steps.push(new_step);
        }

        let step_count = self.store.insert_batch(new_steps).await?.len();

        log_workflow_operation(
            operations::WORKFLOW_CREATED,
            &request.workflow_name,
            step_count,
            None,
        );

        Ok(WorkflowInitializationResult {
            workflow_name: request.workflow_name,
            step_count,
            step_mapping,
        })
    }

    fn validate(request: &WorkflowRequest) -> Result<(), WorkflowInitializationError> {
        let invalid = |msg: String| Err(WorkflowInitializationError::InvalidDefinition(msg));

        let workflow_name = request.workflow_name.as_str();
        if workflow_name.is_empty() {
            return invalid("workflow name must not be empty".to_string());
        }
        if workflow_name.chars().count() > system::MAX_WORKFLOW_NAME_LENGTH {
            return invalid(format!(
                "workflow name exceeds {} characters",
                system::MAX_WORKFLOW_NAME_LENGTH
            ));
        }
        if request.steps.is_empty() {
            return invalid(format!("workflow '{workflow_name}' declares no steps"));
        }

        let mut names = HashSet::new();
        for definition in &request.steps {
            if definition.name.is_empty() {
                return invalid("step name must not be empty".to_string());
            }
            if definition.name.chars().count() > system::MAX_STEP_NAME_LENGTH {
                return invalid(format!(
                    "step name '{}' exceeds {} characters",
                    definition.name,
                    system::MAX_STEP_NAME_LENGTH
                ));
            }
            if !names.insert(definition.name.as_str()) {
                return invalid(format!("duplicate step name '{}'", definition.name));
            }
        }

        for definition in &request.steps {
            for dependency in &definition.depends_on {
                if dependency == &definition.name {
                    return invalid(format!("step '{}' depends on itself", definition.name));
                }
                if !names.contains(dependency.as_str()) {
                    return invalid(format!(
                        "step '{}' depends on undeclared step '{dependency}'",
                        definition.name
                    ));
                }
            }
        }

        Self::detect_cycles(request)
    }

    /// Each step has at most one wired edge, so a cycle is a chain that revisits a step
    fn detect_cycles(request: &WorkflowRequest) -> Result<(), WorkflowInitializationError> {
        let edges: HashMap<&str, &str> = request
            .steps
            .iter()
            .filter_map(|d| d.wired_dependency().map(|dep| (d.name.as_str(), dep)))
            .collect();

        for start in edges.keys() {
            let mut seen = HashSet::from([*start]);
            let mut current = *start;
            while let Some(&next) = edges.get(current) {
                if !seen.insert(next) {
                    return Err(WorkflowInitializationError::DependencyCycle(
                        next.to_string(),
                    ));
                }
                current = next;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::StepState;
    use crate::store::InMemoryStepStore;
    use serde_json::json;

    fn chain_request() -> WorkflowRequest {
        WorkflowRequest::new("reports")
            .with_payload(json!({"month": "2026-09"}))
            .with_step(StepDefinition::new("a").with_action("extract"))
            .with_step(StepDefinition::new("b").depends_on("a"))
            .with_step(StepDefinition::new("c").depends_on("b"))
    }

    #[tokio::test]
    async fn test_create_workflow_wires_dependencies() {
        let store = Arc::new(InMemoryStepStore::new());
        let initializer = WorkflowInitializer::new(store.clone());

        let result = initializer.create_workflow(chain_request()).await.unwrap();
        assert_eq!(result.step_count, 3);

        let steps = store.list_by_workflow("reports").await.unwrap();
        assert_eq!(steps.len(), 3);
        assert!(steps.iter().all(|s| s.state == StepState::Waiting));
        assert!(steps.iter().all(|s| s.payload == json!({"month": "2026-09"})));
        assert_eq!(steps[0].action.as_deref(), Some("extract"));
        assert_eq!(steps[0].dependency_id, None);
        assert_eq!(steps[1].dependency_id, Some(result.step_mapping["a"]));
        assert_eq!(steps[2].dependency_id, Some(result.step_mapping["b"]));
    }

    #[tokio::test]
    async fn test_dependency_declared_after_dependent() {
        let store = Arc::new(InMemoryStepStore::new());
        let request = WorkflowRequest::new("late")
            .with_step(StepDefinition::new("second").depends_on("first"))
            .with_step(StepDefinition::new("first"));

        let result = WorkflowInitializer::new(store.clone())
            .create_workflow(request)
            .await
            .unwrap();

        let second = store
            .get_by_id(result.step_mapping["second"])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.dependency_id, Some(result.step_mapping["first"]));
    }

    #[tokio::test]
    async fn test_only_first_dependency_is_wired() {
        let store = Arc::new(InMemoryStepStore::new());
        let request = WorkflowRequest::new("multi")
            .with_step(StepDefinition::new("a"))
            .with_step(StepDefinition::new("b"))
            .with_step(StepDefinition::new("c").depends_on("b").depends_on("a"));

        let result = WorkflowInitializer::new(store.clone())
            .create_workflow(request)
            .await
            .unwrap();
        let c = store
            .get_by_id(result.step_mapping["c"])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(c.dependency_id, Some(result.step_mapping["b"]));
    }

    #[tokio::test]
    async fn test_invalid_definitions_write_nothing() {
        let store = Arc::new(InMemoryStepStore::new());
        let initializer = WorkflowInitializer::new(store.clone());

        let cases = vec![
            WorkflowRequest::new(" ").with_step(StepDefinition::new("a")),
            WorkflowRequest::new("empty"),
            WorkflowRequest::new("dupe")
                .with_step(StepDefinition::new("a"))
                .with_step(StepDefinition::new("a")),
            WorkflowRequest::new("unknown").with_step(StepDefinition::new("a").depends_on("zz")),
            WorkflowRequest::new("self").with_step(StepDefinition::new("a").depends_on("a")),
        ];

        for request in cases {
            let err = initializer.create_workflow(request).await.unwrap_err();
            assert!(matches!(
                err,
                WorkflowInitializationError::InvalidDefinition(_)
            ));
        }
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_cycle_is_rejected() {
        let store = Arc::new(InMemoryStepStore::new());
        let request = WorkflowRequest::new("loop")
            .with_step(StepDefinition::new("a").depends_on("c"))
            .with_step(StepDefinition::new("b").depends_on("a"))
            .with_step(StepDefinition::new("c").depends_on("b"));

        let err = WorkflowInitializer::new(store.clone())
            .create_workflow(request)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowInitializationError::DependencyCycle(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_names_are_stored_trimmed() {
        let store = Arc::new(InMemoryStepStore::new());
        let request = WorkflowRequest::new("  padded ")
            .with_step(StepDefinition::new(" a\t"))
            .with_step(StepDefinition::new("b ").depends_on("  a"));

        let result = WorkflowInitializer::new(store.clone())
            .create_workflow(request)
            .await
            .unwrap();
        assert_eq!(result.workflow_name, "padded");
        assert!(result.step_mapping.contains_key("a"));

        let steps = store.list_by_workflow("padded").await.unwrap();
        let names: Vec<_> = steps.iter().map(|s| s.step_name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(steps[1].dependency_id, Some(result.step_mapping["a"]));
    }

    #[tokio::test]
    async fn test_name_length_is_checked_after_trimming() {
        let store = Arc::new(InMemoryStepStore::new());
        let initializer = WorkflowInitializer::new(store.clone());
        let longest = "s".repeat(system::MAX_STEP_NAME_LENGTH);

        let workflow_name = "w".repeat(system::MAX_WORKFLOW_NAME_LENGTH);
        let padded = WorkflowRequest::new(format!(" {workflow_name} "))
            .with_step(StepDefinition::new(format!("  {longest}  ")));
        let result = initializer.create_workflow(padded).await.unwrap();
        assert!(result.step_mapping.contains_key(&longest));

        let too_long = WorkflowRequest::new("long")
            .with_step(StepDefinition::new("s".repeat(system::MAX_STEP_NAME_LENGTH + 1)));
        assert!(matches!(
            initializer.create_workflow(too_long).await.unwrap_err(),
            WorkflowInitializationError::InvalidDefinition(_)
        ));
        assert_eq!(store.len(), 1);
    }
}
