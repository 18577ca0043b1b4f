//! Unified error type hierarchy for bmcflash
//!
//! Two layers matter to the flashing pipeline:
//! - `CommandError` / `CommandFailure`: raw facts about an external process
//!   (exit code, captured output). These never carry a reboot-safety decision.
//! - `StepExitError`: the classification a step assigns to its own failure,
//!   which is the only thing the sequencer looks at.
//!
//! `ConfigError`, `LockError` and `LoggingError` cover the ambient layers.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Raw failure facts reported by the command runner.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("invalid invocation: {0}")]
    InvalidInvocation(String),

    #[error("failed to start process: {cause}")]
    SpawnFailure { cause: String },

    #[error("failed to wait for process: {cause}")]
    WaitFailure { cause: String },

    #[error("timed out after {}s", .after.as_secs())]
    Timeout { after: Duration },

    #[error("exit status {code}")]
    NonZeroExit { code: i32 },

    #[error("terminated by signal {}", signal_name(.signal))]
    Signaled { signal: Option<i32> },
}

fn signal_name(signal: &Option<i32>) -> String {
    signal.map_or_else(|| "unknown".to_string(), |s| s.to_string())
}

/// A failed command invocation with everything needed to diagnose it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFailure {
    pub argv: Vec<String>,
    pub exit_code: i32,
    pub cause: CommandError,
    pub stdout: String,
    pub stderr: String,
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "command {:?} failed with exit code {}, error: {}, stdout: '{}', stderr: '{}'",
            self.argv, self.exit_code, self.cause, self.stdout, self.stderr
        )
    }
}

/// Human-readable cause of a step failure, optionally backed by the command
/// that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    pub message: String,
    pub command: Option<CommandFailure>,
}

impl StepFailure {
    pub fn new(message: impl Into<String>) -> Self {
        StepFailure {
            message: message.into(),
            command: None,
        }
    }

    pub fn with_command(message: impl Into<String>, command: CommandFailure) -> Self {
        StepFailure {
            message: message.into(),
            command: Some(command),
        }
    }

    /// Exit code of the underlying command, if the failure came from one.
    pub fn exit_code(&self) -> Option<i32> {
        self.command.as_ref().map(|c| c.exit_code)
    }

    /// Captured stderr of the underlying command, if any.
    pub fn stderr(&self) -> Option<&str> {
        self.command.as_ref().map(|c| c.stderr.as_str())
    }
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.command {
            Some(command) => write!(f, "{}: {}", self.message, command),
            None => f.write_str(&self.message),
        }
    }
}

/// Classified step failure. Success is `Ok(())` of [`StepResult`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepExitError {
    /// The step failed but the device may be rebooted without bricking it.
    #[error("failed, safe to reboot: {0}")]
    SafeToReboot(StepFailure),

    /// The step failed and the device must not be rebooted until remediated.
    #[error("failed, unsafe to reboot: {0}")]
    UnsafeToReboot(StepFailure),

    /// The step failed transiently and may succeed if run again.
    #[error("failed, retryable: {0}")]
    Retryable(StepFailure),
}

impl StepExitError {
    pub fn safe_to_reboot(message: impl Into<String>) -> Self {
        StepExitError::SafeToReboot(StepFailure::new(message))
    }

    pub fn unsafe_to_reboot(message: impl Into<String>) -> Self {
        StepExitError::UnsafeToReboot(StepFailure::new(message))
    }

    pub fn retryable(message: impl Into<String>) -> Self {
        StepExitError::Retryable(StepFailure::new(message))
    }

    pub fn failure(&self) -> &StepFailure {
        match self {
            StepExitError::SafeToReboot(f)
            | StepExitError::UnsafeToReboot(f)
            | StepExitError::Retryable(f) => f,
        }
    }

    /// Short label for logs: "safe-to-reboot", "unsafe-to-reboot" or "retryable".
    pub fn kind(&self) -> &'static str {
        match self {
            StepExitError::SafeToReboot(_) => "safe-to-reboot",
            StepExitError::UnsafeToReboot(_) => "unsafe-to-reboot",
            StepExitError::Retryable(_) => "retryable",
        }
    }
}

/// Outcome of a single step execution.
pub type StepResult = std::result::Result<(), StepExitError>;

/// Configuration file parsing and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid TOML in config: {0}")]
    InvalidToml(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("Unknown step '{name}' (known steps: {known})")]
    UnknownStep { name: String, known: String },

    #[error("IO error during config operations: {0}")]
    IoError(#[from] io::Error),
}

/// Device lock acquisition errors.
#[derive(Error, Debug)]
pub enum LockError {
    #[error("Another flashing run holds the lock at {}", .path.display())]
    AlreadyHeld { path: PathBuf },

    #[error("Failed to lock {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Logging backend initialization errors.
#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Failed to prepare log file: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid log level '{0}'")]
    InvalidLevel(String),

    #[error("A global logger is already installed")]
    AlreadyInitialized,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure() -> CommandFailure {
        CommandFailure {
            argv: vec!["fw-util".to_string(), "/tmp/bmc.rom".to_string()],
            exit_code: 1,
            cause: CommandError::NonZeroExit { code: 1 },
            stdout: "progress 10%".to_string(),
            stderr: "flash error".to_string(),
        }
    }

    #[test]
    fn test_command_failure_display_embeds_all_fields() {
        let rendered = failure().to_string();
        assert!(rendered.contains("exit code 1"));
        assert!(rendered.contains("exit status 1"));
        assert!(rendered.contains("stdout: 'progress 10%'"));
        assert!(rendered.contains("stderr: 'flash error'"));
        assert!(rendered.contains("/tmp/bmc.rom"));
    }

    #[test]
    fn test_timeout_display() {
        let err = CommandError::Timeout {
            after: Duration::from_secs(1800),
        };
        assert_eq!(err.to_string(), "timed out after 1800s");
    }

    #[test]
    fn test_signaled_display_without_number() {
        let err = CommandError::Signaled { signal: None };
        assert_eq!(err.to_string(), "terminated by signal unknown");
    }

    #[test]
    fn test_step_failure_accessors() {
        let f = StepFailure::with_command("flash failed", failure());
        assert_eq!(f.exit_code(), Some(1));
        assert_eq!(f.stderr(), Some("flash error"));

        let plain = StepFailure::new("no image");
        assert_eq!(plain.exit_code(), None);
        assert_eq!(plain.to_string(), "no image");
    }

    #[test]
    fn test_step_exit_error_kind_and_failure() {
        let err = StepExitError::unsafe_to_reboot("partial write");
        assert_eq!(err.kind(), "unsafe-to-reboot");
        assert_eq!(err.failure().message, "partial write");
        assert_eq!(err.to_string(), "failed, unsafe to reboot: partial write");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::FileNotFound("/etc/bmcflash.toml".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration file not found: /etc/bmcflash.toml"
        );
    }
}
