//! Flash the BMC through the vendor `fw-util` utility.
//!
//! Every fw-util failure (spawn error, timeout, non-zero exit) is classified
//! as safe to reboot.

use async_trait::async_trait;
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;

use super::{RebootSafety, Step};
use crate::command::CommandRunner;
use crate::error::{CommandFailure, StepExitError, StepFailure, StepResult};
use crate::models::StepParams;

pub const STEP_NAME: &str = "flash_fw_util";

/// Slow flash parts can take the better part of half an hour.
pub const FW_UTIL_TIMEOUT: Duration = Duration::from_secs(1800);

/// Argument vector for flashing `image_file_path`. The path is one argument,
/// never split or quoted.
pub fn fw_util_command(image_file_path: &str) -> Vec<String> {
    vec![
        "fw-util".to_string(),
        "bmc".to_string(),
        "--update".to_string(),
        "bmc".to_string(),
        image_file_path.to_string(),
    ]
}

pub struct FlashFwUtil {
    runner: Arc<dyn CommandRunner>,
}

impl FlashFwUtil {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        FlashFwUtil { runner }
    }

    async fn run_fw_util(&self, image_file_path: &str) -> Result<(), CommandFailure> {
        info!("Starting to run fw-util");

        let flash_cmd = fw_util_command(image_file_path);
        let result = self.runner.run(&flash_cmd, FW_UTIL_TIMEOUT).await;
        if let Some(failure) = result.failure() {
            error!("Flashing failed: {}", failure);
            return Err(failure);
        }

        info!("fw-util succeeded in {:.1?}", result.elapsed);
        Ok(())
    }
}

#[async_trait]
impl Step for FlashFwUtil {
    fn name(&self) -> &str {
        STEP_NAME
    }

    async fn execute(&self, params: &StepParams) -> StepResult {
        info!("Flashing using fw-util method");
        let image = params.image_file_arg();
        info!("Attempting to flash with image file '{}'", image);

        self.run_fw_util(&image).await.map_err(|failure| {
            StepExitError::SafeToReboot(StepFailure::with_command(
                format!("Flashing '{}' with fw-util failed", image),
                failure,
            ))
        })
    }

    fn retry_escalation(&self) -> RebootSafety {
        RebootSafety::Safe
    }
}
