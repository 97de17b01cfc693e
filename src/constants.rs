//! # System Constants
//!
//! Defaults and names that define the operational boundaries of the step scheduler.

use std::time::Duration;

/// Step lifecycle operation names used in structured logs
pub mod operations {
    pub const STEP_CLAIMED: &str = "step.claimed";
    pub const STEP_SUCCEEDED: &str = "step.succeeded";
    pub const STEP_FAILED: &str = "step.failed";
    pub const STEP_CLAIM_CONFLICT: &str = "step.claim_conflict";
    pub const WORKFLOW_CREATED: &str = "workflow.created";
    pub const SCHEDULER_CYCLE: &str = "scheduler.cycle";
}

/// System-wide defaults
pub mod system {
    use super::Duration;

    /// Delay between two scheduler cycles
    pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(5);
    /// Duration of the simulated unit of work
    pub const DEFAULT_SIMULATED_ACTION_DURATION: Duration = Duration::from_secs(2);
    /// Attempts at persisting a step's terminal state before giving up
    pub const DEFAULT_FINALIZE_MAX_ATTEMPTS: u32 = 3;
    /// First retry delay for a failed terminal write; grows linearly per attempt
    pub const DEFAULT_FINALIZE_RETRY_BACKOFF: Duration = Duration::from_millis(100);
    /// Steps executed at once within one cycle
    pub const DEFAULT_MAX_CONCURRENT_STEPS: usize = 1;
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
    pub const DEFAULT_ACQUIRE_TIMEOUT_SECONDS: u64 = 30;
    pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/stepchain_development";

    pub const MAX_WORKFLOW_NAME_LENGTH: usize = 100;
    pub const MAX_STEP_NAME_LENGTH: usize = 100;
}

/// Environment variable names
pub mod env {
    pub const ENVIRONMENT: &str = "STEPCHAIN_ENV";
    pub const FALLBACK_ENVIRONMENT: &str = "APP_ENV";
    pub const CONFIG_DIR: &str = "STEPCHAIN_CONFIG_DIR";
    pub const CONFIG_PREFIX: &str = "STEPCHAIN";
    pub const DATABASE_URL: &str = "DATABASE_URL";
}
