//! Step sequencing: runs an ordered list of steps, stops at the first failure,
//! retries retryable failures and decides whether the device may be rebooted.

pub mod result;
pub mod state;

use log::{error, info, warn};
use std::time::{Duration, Instant};

pub use result::{
    Disposition, PipelineResult, StepOutcome, StepStatus, EXIT_SAFE_TO_REBOOT,
    EXIT_UNSAFE_TO_REBOOT,
};
pub use state::PipelineState;

use crate::error::{StepExitError, StepFailure};
use crate::models::StepParams;
use crate::step::{RebootSafety, Step};

pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencerConfig {
    /// Extra attempts after the first for a step that reports `Retryable`.
    pub max_retries: u32,
    /// Pause between attempts of the same step.
    pub retry_delay: Duration,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        SequencerConfig {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Runs pipelines strictly one step at a time.
#[derive(Debug, Clone, Default)]
pub struct Sequencer {
    config: SequencerConfig,
}

impl Sequencer {
    pub fn new(config: SequencerConfig) -> Self {
        Sequencer { config }
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    /// Execute `steps` in order against `params`.
    ///
    /// A step is never started before the previous one returned. The first
    /// step that ends in a safe or unsafe failure halts the pipeline and the
    /// remaining steps are reported as skipped.
    pub async fn run_pipeline(
        &self,
        steps: &[Box<dyn Step>],
        params: &StepParams,
    ) -> PipelineResult {
        let started = Instant::now();
        let mut state = PipelineState::Pending;
        let mut outcomes = Vec::with_capacity(steps.len());

        if steps.is_empty() {
            warn!("Pipeline has no steps; nothing to do");
            advance(&mut state, PipelineState::Succeeded);
            return PipelineResult {
                outcomes,
                skipped: Vec::new(),
                disposition: Disposition::Succeeded,
                elapsed: started.elapsed(),
            };
        }

        info!("Running {} step(s) with {}", steps.len(), params);

        for (index, step) in steps.iter().enumerate() {
            advance(&mut state, PipelineState::Running(index));
            info!("[{}/{}] Running step '{}'", index + 1, steps.len(), step.name());

            let outcome = self.run_step(step.as_ref(), params).await;
            let status = outcome.status;
            outcomes.push(outcome);

            let halted = match status {
                StepStatus::Succeeded => None,
                StepStatus::FailedSafe => Some(PipelineState::FailedSafe),
                StepStatus::FailedUnsafe => Some(PipelineState::FailedUnsafe),
            };
            if let Some(terminal) = halted {
                advance(&mut state, terminal);
                let skipped: Vec<String> = steps[index + 1..]
                    .iter()
                    .map(|s| s.name().to_string())
                    .collect();
                if !skipped.is_empty() {
                    warn!("Skipping remaining step(s): {}", skipped.join(", "));
                }
                let disposition = if terminal == PipelineState::FailedSafe {
                    Disposition::FailedSafe
                } else {
                    Disposition::FailedUnsafe
                };
                error!("Pipeline halted at step '{}': {}", step.name(), disposition);
                return PipelineResult {
                    outcomes,
                    skipped,
                    disposition,
                    elapsed: started.elapsed(),
                };
            }
        }

        advance(&mut state, PipelineState::Succeeded);
        info!("All {} step(s) succeeded in {:.1?}", steps.len(), started.elapsed());
        PipelineResult {
            outcomes,
            skipped: Vec::new(),
            disposition: Disposition::Succeeded,
            elapsed: started.elapsed(),
        }
    }

    async fn run_step(&self, step: &dyn Step, params: &StepParams) -> StepOutcome {
        let started = Instant::now();
        let mut attempts: u32 = 0;

        loop {
            attempts = attempts.saturating_add(1);
            let error = match step.execute(params).await {
                Ok(()) => {
                    info!("Step '{}' succeeded (attempt {})", step.name(), attempts);
                    return StepOutcome {
                        name: step.name().to_string(),
                        attempts,
                        status: StepStatus::Succeeded,
                        elapsed: started.elapsed(),
                        error: None,
                    };
                }
                Err(e) => e,
            };

            let (status, error) = match error {
                StepExitError::SafeToReboot(_) => (StepStatus::FailedSafe, error),
                StepExitError::UnsafeToReboot(_) => (StepStatus::FailedUnsafe, error),
                StepExitError::Retryable(failure) => {
                    if attempts <= self.config.max_retries {
                        warn!(
                            "Step '{}' failed with a retryable error (attempt {} of {}): {}",
                            step.name(),
                            attempts,
                            self.config.max_retries.saturating_add(1),
                            failure
                        );
                        if !self.config.retry_delay.is_zero() {
                            tokio::time::sleep(self.config.retry_delay).await;
                        }
                        continue;
                    }
                    escalate(step, attempts, failure)
                }
            };

            error!("Step '{}' failed: {}", step.name(), error);
            return StepOutcome {
                name: step.name().to_string(),
                attempts,
                status,
                elapsed: started.elapsed(),
                error: Some(error),
            };
        }
    }
}

/// Classify a step whose retries ran out, per its declared escalation.
fn escalate(
    step: &dyn Step,
    attempts: u32,
    failure: StepFailure,
) -> (StepStatus, StepExitError) {
    let failure = StepFailure {
        message: format!("{} (gave up after {} attempts)", failure.message, attempts),
        command: failure.command,
    };
    match step.retry_escalation() {
        RebootSafety::Safe => (
            StepStatus::FailedSafe,
            StepExitError::SafeToReboot(failure),
        ),
        RebootSafety::Unsafe => (
            StepStatus::FailedUnsafe,
            StepExitError::UnsafeToReboot(failure),
        ),
    }
}

fn advance(state: &mut PipelineState, next: PipelineState) {
    if let Err(e) = state.transition_to(next) {
        // Only reachable through a sequencing bug; the result is still reported.
        error!("{}", e);
    }
}

/// Run `steps` with the default retry policy.
pub async fn run_pipeline(steps: &[Box<dyn Step>], params: &StepParams) -> PipelineResult {
    Sequencer::default().run_pipeline(steps, params).await
}
