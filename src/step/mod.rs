//! Pipeline steps.
//!
//! A step is a named unit of work that reads the shared [`StepParams`] and
//! reports either success or a classified [`StepExitError`]. Steps that need
//! to run external tools get a [`CommandRunner`](crate::command::CommandRunner)
//! injected at construction, so tests can substitute it freely.
//!
//! - `check_image`: pre-flight validation of the image file
//! - `flash_fw_util`: flashing through the vendor `fw-util` utility
//! - `registry`: name -> constructor table used to assemble pipelines

pub mod check_image;
pub mod flash_fw_util;
pub mod registry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StepResult;
use crate::models::StepParams;

pub use check_image::CheckImageFile;
pub use flash_fw_util::{fw_util_command, FlashFwUtil, FW_UTIL_TIMEOUT};
pub use registry::StepRegistry;

/// Whether the device may be rebooted after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RebootSafety {
    Safe,
    Unsafe,
}

#[async_trait]
pub trait Step: Send + Sync {
    /// Stable identifier, also the name used in configuration.
    fn name(&self) -> &str;

    /// Runs the step once. Must not depend on anything beyond `params` and
    /// the capabilities the step was built with.
    async fn execute(&self, params: &StepParams) -> StepResult;

    /// Classification applied when a `Retryable` failure outlives the
    /// sequencer's retry bound.
    fn retry_escalation(&self) -> RebootSafety {
        RebootSafety::Unsafe
    }
}
