//! # Stepchain Configuration System
//!
//! Layered configuration: built-in defaults, `stepchain.yaml`, an environment-specific
//! `stepchain.<environment>.yaml`, then `STEPCHAIN__*` environment variables.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use stepchain_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//!
//! let interval = manager.config().scheduler.polling_interval();
//! let database_url = &manager.config().database.url;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::system;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring stepchain.yaml
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StepchainConfig {
    /// Database connection and pooling configuration
    pub database: DatabaseConfig,

    /// Scheduler loop settings
    pub scheduler: SchedulerConfig,

    /// Step execution settings
    pub executor: ExecutorConfig,

    /// Log output settings
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
    /// Apply embedded migrations on startup
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: system::DEFAULT_DATABASE_URL.to_string(),
            max_connections: system::DEFAULT_MAX_CONNECTIONS,
            acquire_timeout_seconds: system::DEFAULT_ACQUIRE_TIMEOUT_SECONDS,
            run_migrations: true,
        }
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Sleep between the end of one cycle and the start of the next
    pub polling_interval_ms: u64,
    /// Eligible steps executed at once within a cycle; 1 runs them strictly in sequence
    pub max_concurrent_steps: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            polling_interval_ms: system::DEFAULT_POLLING_INTERVAL.as_millis() as u64,
            max_concurrent_steps: system::DEFAULT_MAX_CONCURRENT_STEPS,
        }
    }
}

impl SchedulerConfig {
    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// How long the simulated action sleeps before succeeding
    pub simulated_duration_ms: u64,
    /// Attempts at writing `Succeeded`/`Failed` after the action returned
    pub finalize_max_attempts: u32,
    pub finalize_retry_backoff_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            simulated_duration_ms: system::DEFAULT_SIMULATED_ACTION_DURATION.as_millis() as u64,
            finalize_max_attempts: system::DEFAULT_FINALIZE_MAX_ATTEMPTS,
            finalize_retry_backoff_ms: system::DEFAULT_FINALIZE_RETRY_BACKOFF.as_millis() as u64,
        }
    }
}

impl ExecutorConfig {
    pub fn simulated_duration(&self) -> Duration {
        Duration::from_millis(self.simulated_duration_ms)
    }

    pub fn finalize_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.finalize_retry_backoff_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive such as `info` or `stepchain_core=debug`; derived from the
    /// environment name when absent
    pub level: Option<String>,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl StepchainConfig {
    /// Reject values the scheduler cannot run with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "database.url",
                "",
                "database URL must not be empty",
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigurationError::invalid_value(
                "database.max_connections",
                "0",
                "at least one connection is required",
            ));
        }

        if self.scheduler.polling_interval_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "scheduler.polling_interval_ms",
                "0",
                "polling interval must be positive",
            ));
        }

        if self.scheduler.max_concurrent_steps == 0 {
            return Err(ConfigurationError::invalid_value(
                "scheduler.max_concurrent_steps",
                "0",
                "at least one step must be allowed to run",
            ));
        }

        if self.executor.finalize_max_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "executor.finalize_max_attempts",
                "0",
                "a step outcome must be written at least once",
            ));
        }

        Ok(())
    }
}
