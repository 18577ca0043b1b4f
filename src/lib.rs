//! bmcflash: step engine for flashing BMC firmware.
//!
//! A flashing run is an ordered pipeline of steps. Each step either succeeds
//! or reports a classified failure telling the caller whether the device may
//! be rebooted. The sequencer runs the steps one at a time, stops at the first
//! failure, retries transient failures and produces a [`PipelineResult`].
//!
//! The system is organized into functional modules:
//! - **error**: command, step and ambient error types
//! - **models**: `StepParams`, the per-run input shared by every step
//! - **command**: external command execution with a hard timeout
//! - **step**: the `Step` trait, built-in steps and the step registry
//! - **orchestrator**: the sequencer, its state machine and results
//! - **config**: TOML configuration
//! - **system**: global logger setup and the device lock
//! - **log_collector**: the `log` backend

pub mod command;
pub mod config;
pub mod error;
pub mod log_collector;
pub mod models;
pub mod orchestrator;
pub mod step;
pub mod system;

// Re-export the log crate for macro usage
pub use log;

pub use command::{CommandResult, CommandRunner, SystemCommandRunner};
pub use config::FlashConfig;
pub use error::{
    CommandError, CommandFailure, ConfigError, LockError, LoggingError, StepExitError,
    StepFailure, StepResult,
};
pub use log_collector::{LogCollector, LogLine};
pub use models::StepParams;
pub use orchestrator::{
    run_pipeline, Disposition, PipelineResult, PipelineState, Sequencer, SequencerConfig,
    StepOutcome, StepStatus,
};
pub use step::{CheckImageFile, FlashFwUtil, RebootSafety, Step, StepRegistry};
pub use system::{flush_all_logs, initialize_logging, DeviceLock};

/// Version string for the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_public_surface_wires_together() {
        let runner: std::sync::Arc<dyn CommandRunner> =
            std::sync::Arc::new(SystemCommandRunner::new());
        let registry = StepRegistry::with_builtin_steps(runner);
        let config = FlashConfig::default();
        let steps = registry.build_pipeline(&config.pipeline.steps).unwrap();
        assert_eq!(steps.len(), 2);
    }
}
