//! Configuration Loader
//!
//! Environment-aware configuration loading. Sources are merged in order, later
//! sources winning:
//!
//! 1. built-in defaults
//! 2. `<dir>/stepchain.yaml`
//! 3. `<dir>/stepchain.<environment>.yaml`
//! 4. `STEPCHAIN__SECTION__KEY` environment variables
//! 5. `DATABASE_URL`, which overrides `database.url`
//!
//! Both files are optional.

use super::error::{ConfigResult, ConfigurationError};
use super::StepchainConfig;
use crate::constants::env as env_vars;
use config::{Config, Environment, File, FileFormat};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const BASE_FILE_NAME: &str = "stepchain.yaml";

/// Loaded configuration together with where it came from
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: StepchainConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::load_with_variables(config_dir, environment, env::vars().collect())
    }

    /// Same as [`Self::load_from_directory_with_env`] but reads overrides from
    /// `variables` instead of the process environment
    pub fn load_with_variables(
        config_dir: Option<PathBuf>,
        environment: &str,
        variables: HashMap<String, String>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);
        let environment = environment.to_lowercase();

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let config = Self::build_config(&config_directory, &environment, variables)?;
        config.validate()?;

        let sanitized_config = Self::sanitize_config_for_logging(&config);
        debug!(
            "Configuration loaded successfully: {}",
            serde_json::to_string_pretty(&sanitized_config)
                .unwrap_or_else(|_| "[serialization error]".to_string())
        );

        info!(
            environment = %environment,
            polling_interval_ms = config.scheduler.polling_interval_ms,
            max_concurrent_steps = config.scheduler.max_concurrent_steps,
            "Configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment,
            config_directory,
        }))
    }

    /// Wrap an already-built configuration, mostly for tests and embedding
    pub fn from_config(config: StepchainConfig, environment: &str) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            environment: environment.to_lowercase(),
            config_directory: Self::default_config_directory(),
        })
    }

    pub fn config(&self) -> &StepchainConfig {
        &self.config
    }

    /// Get the current environment
    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Configuration as JSON with credentials masked
    pub fn debug_config(&self) -> serde_json::Value {
        Self::sanitize_config_for_logging(&self.config)
    }

    fn build_config(
        config_directory: &Path,
        environment: &str,
        variables: HashMap<String, String>,
    ) -> ConfigResult<StepchainConfig> {
        let defaults = Config::try_from(&StepchainConfig::default())
            .map_err(|e| ConfigurationError::load_error("defaults", e))?;

        let base_file = config_directory.join(BASE_FILE_NAME);
        let env_file = config_directory.join(format!("stepchain.{environment}.yaml"));
        let database_url = variables.get(env_vars::DATABASE_URL).cloned();

        let merged = Config::builder()
            .add_source(defaults)
            .add_source(
                File::from(base_file.as_path())
                    .format(FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                File::from(env_file.as_path())
                    .format(FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(env_vars::CONFIG_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .source(Some(variables)),
            )
            .set_override_option("database.url", database_url)
            .and_then(|builder| builder.build())
            .map_err(|e| ConfigurationError::load_error(config_directory.display().to_string(), e))?;

        merged
            .try_deserialize::<StepchainConfig>()
            .map_err(|e| ConfigurationError::DeserializationError {
                error: e.to_string(),
            })
    }

    /// Mask connection strings and credentials before configuration reaches a log line
    fn sanitize_config_for_logging(config: &StepchainConfig) -> serde_json::Value {
        let mut config_json = serde_json::json!(config);
        let sensitive_patterns = ["password", "secret", "key", "token", "url"];
        Self::sanitize_json_recursive(&mut config_json, &sensitive_patterns);
        config_json
    }

    fn sanitize_json_recursive(value: &mut serde_json::Value, sensitive_patterns: &[&str]) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, val) in map.iter_mut() {
                    let key_lower = key.to_lowercase();
                    let is_sensitive = sensitive_patterns
                        .iter()
                        .any(|pattern| key_lower.contains(pattern));

                    if !is_sensitive {
                        Self::sanitize_json_recursive(val, sensitive_patterns);
                        continue;
                    }

                    *val = match val {
                        serde_json::Value::String(s) if s.is_empty() => {
                            serde_json::Value::String("[EMPTY]".to_string())
                        }
                        serde_json::Value::String(s) => {
                            let masked = match (s.get(..2), s.get(s.len().saturating_sub(2)..)) {
                                (Some(head), Some(tail)) if s.len() > 4 => {
                                    format!("{head}***{tail}")
                                }
                                _ => "***".to_string(),
                            };
                            serde_json::Value::String(format!("[MASKED: {masked}]"))
                        }
                        _ => serde_json::Value::String("[MASKED]".to_string()),
                    };
                }
            }
            serde_json::Value::Array(arr) => {
                for item in arr.iter_mut() {
                    Self::sanitize_json_recursive(item, sensitive_patterns);
                }
            }
            _ => {}
        }
    }

    /// STEPCHAIN_ENV || APP_ENV || 'development'
    pub fn detect_environment() -> String {
        env::var(env_vars::ENVIRONMENT)
            .or_else(|_| env::var(env_vars::FALLBACK_ENVIRONMENT))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    fn default_config_directory() -> PathBuf {
        env::var(env_vars::CONFIG_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }
}
