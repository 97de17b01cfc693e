use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a workflow step
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    /// Initial state when step is created
    #[default]
    Waiting,
    /// Step has been claimed and its action is executing
    Running,
    /// Step action completed without error
    Succeeded,
    /// Step action returned an error
    Failed,
}

impl StepState {
    /// All states, in lifecycle order
    pub const ALL: [StepState; 4] = [
        Self::Waiting,
        Self::Running,
        Self::Succeeded,
        Self::Failed,
    ];

    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Check if this step satisfies the dependency of another step
    pub fn satisfies_dependencies(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StepState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(Self::Waiting),
            "running" => Ok(Self::Running),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid step state: {s}")),
        }
    }
}
