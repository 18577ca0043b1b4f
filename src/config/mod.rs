//! Configuration for flashing runs.
//!
//! # Module Structure
//!
//! - `loader`: reads and writes `FlashConfig` as TOML and locates the global
//!   config file
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration: check the image, then flash it with fw-util.

pub mod loader;

use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::orchestrator::{SequencerConfig, DEFAULT_MAX_RETRIES};
use crate::step::StepRegistry;

pub use loader::{
    create_default_config, get_global_config_path, load_config_from_file, save_config_to_file,
    validate_config_path,
};

pub const DEFAULT_LOCK_FILE: &str = "/run/bmcflash.lock";

/// Upper bound on retries; a higher value is almost certainly a typo.
pub const MAX_RETRIES_LIMIT: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FlashConfig {
    pub pipeline: PipelineSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Step names, executed in this order.
    pub steps: Vec<String>,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub lock_file: PathBuf,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        PipelineSettings {
            steps: vec![
                crate::step::check_image::STEP_NAME.to_string(),
                crate::step::flash_fw_util::STEP_NAME.to_string(),
            ],
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: 1000,
            lock_file: PathBuf::from(DEFAULT_LOCK_FILE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// One of off, error, warn, info, debug, trace.
    pub level: String,
    /// Directory for per-run log files. Unset means stderr only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            level: "info".to_string(),
            log_dir: None,
        }
    }
}

impl LoggingSettings {
    pub fn level_filter(&self) -> Result<LevelFilter, ConfigError> {
        self.level.parse::<LevelFilter>().map_err(|_| {
            ConfigError::ValidationFailed(format!("Invalid log level '{}'", self.level))
        })
    }
}

impl FlashConfig {
    pub fn sequencer_config(&self) -> SequencerConfig {
        SequencerConfig {
            max_retries: self.pipeline.max_retries,
            retry_delay: Duration::from_millis(self.pipeline.retry_delay_ms),
        }
    }

    /// Check settings that serde cannot; step names are checked against `registry`.
    pub fn validate(&self, registry: &StepRegistry) -> Result<(), ConfigError> {
        if self.pipeline.max_retries > MAX_RETRIES_LIMIT {
            return Err(ConfigError::ValidationFailed(format!(
                "max_retries must be at most {}, got {}",
                MAX_RETRIES_LIMIT, self.pipeline.max_retries
            )));
        }
        if self.pipeline.lock_file.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "lock_file cannot be empty".to_string(),
            ));
        }
        for name in &self.pipeline.steps {
            if !registry.contains(name) {
                return Err(ConfigError::UnknownStep {
                    name: name.clone(),
                    known: registry.names().join(", "),
                });
            }
        }
        self.logging.level_filter()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::SystemCommandRunner;
    use std::sync::Arc;

    fn registry() -> StepRegistry {
        StepRegistry::with_builtin_steps(Arc::new(SystemCommandRunner::new()))
    }

    #[test]
    fn test_defaults() {
        let config = FlashConfig::default();
        assert_eq!(
            config.pipeline.steps,
            vec!["check_image_file", "flash_fw_util"]
        );
        assert_eq!(config.pipeline.lock_file, PathBuf::from("/run/bmcflash.lock"));
        assert_eq!(config.logging.level_filter().unwrap(), LevelFilter::Info);
        assert!(config.validate(&registry()).is_ok());
    }

    #[test]
    fn test_sequencer_config_conversion() {
        let mut config = FlashConfig::default();
        config.pipeline.max_retries = 4;
        config.pipeline.retry_delay_ms = 250;

        let seq = config.sequencer_config();
        assert_eq!(seq.max_retries, 4);
        assert_eq!(seq.retry_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_validate_rejects_unknown_step() {
        let mut config = FlashConfig::default();
        config.pipeline.steps.push("flash_flashrom".to_string());

        let err = config.validate(&registry()).unwrap_err();
        assert!(
            matches!(err, ConfigError::UnknownStep { ref name, .. } if name == "flash_flashrom")
        );
    }

    #[test]
    fn test_validate_rejects_bad_level_and_retries() {
        let mut config = FlashConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate(&registry()).is_err());

        let mut config = FlashConfig::default();
        config.pipeline.max_retries = 99;
        assert!(config.validate(&registry()).is_err());
    }
}
