//! Declarative workflow recipes.
//!
//! ```yaml
//! workflow:
//!   name: monthly_reports
//!   steps:
//!     - name: extract
//!       action: extract_rows
//!     - name: render
//!       depends_on: [extract]
//! ```

use super::workflow_initializer::{StepDefinition, WorkflowRequest};
use crate::error::{Result, StepchainError};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowRecipe {
    pub workflow: RecipeWorkflow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecipeWorkflow {
    pub name: String,
    pub steps: Vec<StepDefinition>,
}

impl WorkflowRecipe {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            StepchainError::ValidationError(format!(
                "Failed to read recipe {}: {e}",
                path.display()
            ))
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Build a creation request; `payload` is attached to every step
    pub fn into_request(self, payload: serde_json::Value) -> WorkflowRequest {
        WorkflowRequest {
            workflow_name: self.workflow.name,
            payload,
            steps: self.workflow.steps,
        }
    }
}
