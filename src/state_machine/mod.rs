// State machine module for the step lifecycle
//
// Steps move Waiting -> Running -> {Succeeded, Failed} exactly once. Transitions are
// computed here and applied through the step store under a compare-and-set guard.

pub mod errors;
pub mod events;
pub mod states;
pub mod step_state_machine;

// Re-export main types for convenient access
pub use errors::{StateMachineError, StateMachineResult};
pub use events::StepEvent;
pub use states::StepState;
pub use step_state_machine::StepStateMachine;
