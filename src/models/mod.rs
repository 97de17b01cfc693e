pub mod step;
pub mod workflow;

// Re-export core models for easy access
pub use step::{NewStep, StateUpdate, Step};
pub use workflow::WorkflowSummary;
