//! What a pipeline run hands back to its caller.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;

use crate::error::StepExitError;

/// Process exit code for a run that failed but left the device safe to reboot.
pub const EXIT_SAFE_TO_REBOOT: i32 = 42;

/// Process exit code for a run that left the device unsafe to reboot.
pub const EXIT_UNSAFE_TO_REBOOT: i32 = 52;

/// Final classification of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Disposition {
    Succeeded,
    FailedSafe,
    FailedUnsafe,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Succeeded => "succeeded",
            Disposition::FailedSafe => "failed-safe",
            Disposition::FailedUnsafe => "failed-unsafe",
        }
    }

    /// Whether the orchestrator may reboot the device now.
    pub fn reboot_permitted(&self) -> bool {
        !matches!(self, Disposition::FailedUnsafe)
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Disposition::Succeeded => 0,
            Disposition::FailedSafe => EXIT_SAFE_TO_REBOOT,
            Disposition::FailedUnsafe => EXIT_UNSAFE_TO_REBOOT,
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final status of one step after any retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
    Succeeded,
    FailedSafe,
    FailedUnsafe,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Succeeded => "succeeded",
            StepStatus::FailedSafe => "failed-safe",
            StepStatus::FailedUnsafe => "failed-unsafe",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub name: String,
    /// Number of times the step was executed, at least 1.
    pub attempts: u32,
    pub status: StepStatus,
    pub elapsed: Duration,
    /// Last error returned by the step; `None` when it succeeded.
    pub error: Option<StepExitError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineResult {
    /// Outcomes of the steps that ran, in execution order.
    pub outcomes: Vec<StepOutcome>,
    /// Names of steps that never ran because an earlier step halted the pipeline.
    pub skipped: Vec<String>,
    pub disposition: Disposition,
    pub elapsed: Duration,
}

impl PipelineResult {
    pub fn succeeded(&self) -> bool {
        self.disposition == Disposition::Succeeded
    }

    pub fn reboot_permitted(&self) -> bool {
        self.disposition.reboot_permitted()
    }

    /// Names of the steps that ran, in order.
    pub fn ran_steps(&self) -> Vec<&str> {
        self.outcomes.iter().map(|o| o.name.as_str()).collect()
    }

    /// The step that halted the pipeline, if any.
    pub fn failed_step(&self) -> Option<&StepOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.status != StepStatus::Succeeded)
    }

    /// Machine-readable summary for the orchestrator.
    pub fn to_json(&self) -> Value {
        let steps: Vec<Value> = self
            .outcomes
            .iter()
            .map(|o| {
                json!({
                    "name": o.name,
                    "attempts": o.attempts,
                    "status": o.status.as_str(),
                    "elapsed_ms": o.elapsed.as_millis() as u64,
                    "error": o.error.as_ref().map(|e| e.to_string()),
                    "exit_code": o.error.as_ref().and_then(|e| e.failure().exit_code()),
                })
            })
            .collect();

        json!({
            "disposition": self.disposition.as_str(),
            "reboot_permitted": self.reboot_permitted(),
            "exit_code": self.disposition.exit_code(),
            "elapsed_ms": self.elapsed.as_millis() as u64,
            "steps": steps,
            "skipped": self.skipped,
        })
    }
}
