//! Pre-flight check that the image file is present and readable.
//!
//! Runs before anything touches the flash, so every failure is safe to reboot.

use async_trait::async_trait;
use log::{debug, info};

use super::{RebootSafety, Step};
use crate::error::{StepExitError, StepResult};
use crate::models::StepParams;

pub const STEP_NAME: &str = "check_image_file";

#[derive(Debug, Clone, Copy, Default)]
pub struct CheckImageFile;

impl CheckImageFile {
    pub fn new() -> Self {
        CheckImageFile
    }
}

#[async_trait]
impl Step for CheckImageFile {
    fn name(&self) -> &str {
        STEP_NAME
    }

    async fn execute(&self, params: &StepParams) -> StepResult {
        let path = params.image_file_path();
        debug!("Checking image file '{}'", path.display());

        if path.as_os_str().is_empty() {
            return Err(StepExitError::safe_to_reboot("Image file path is empty"));
        }

        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            StepExitError::safe_to_reboot(format!(
                "Image file '{}' is not accessible: {}",
                path.display(),
                e
            ))
        })?;

        if !metadata.is_file() {
            return Err(StepExitError::safe_to_reboot(format!(
                "Image path '{}' is not a regular file",
                path.display()
            )));
        }
        if metadata.len() == 0 {
            return Err(StepExitError::safe_to_reboot(format!(
                "Image file '{}' is empty",
                path.display()
            )));
        }

        // Open once so permission problems surface here rather than mid-flash.
        tokio::fs::File::open(path).await.map_err(|e| {
            StepExitError::safe_to_reboot(format!(
                "Image file '{}' cannot be opened: {}",
                path.display(),
                e
            ))
        })?;

        info!(
            "Image file '{}' looks valid ({} bytes)",
            path.display(),
            metadata.len()
        );
        Ok(())
    }

    fn retry_escalation(&self) -> RebootSafety {
        RebootSafety::Safe
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[tokio::test]
    async fn test_existing_non_empty_file_passes() {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(b"\x7fBMC").expect("write image");
        let params = StepParams::new(file.path(), "mtd:flash0");

        assert_eq!(CheckImageFile::new().execute(&params).await, Ok(()));
    }

    #[tokio::test]
    async fn test_missing_file_is_safe_to_reboot() {
        let dir = TempDir::new().expect("temp dir");
        let params = StepParams::new(dir.path().join("missing.rom"), "mtd:flash0");

        let err = CheckImageFile::new().execute(&params).await.unwrap_err();
        assert!(matches!(err, StepExitError::SafeToReboot(_)));
        assert!(err.to_string().contains("missing.rom"));
    }

    #[tokio::test]
    async fn test_empty_file_is_rejected() {
        let file = NamedTempFile::new().expect("temp file");
        let params = StepParams::new(file.path(), "mtd:flash0");

        let err = CheckImageFile::new().execute(&params).await.unwrap_err();
        assert!(err.to_string().contains("is empty"));
    }

    #[tokio::test]
    async fn test_directory_is_rejected() {
        let dir = TempDir::new().expect("temp dir");
        let params = StepParams::new(dir.path(), "mtd:flash0");

        let err = CheckImageFile::new().execute(&params).await.unwrap_err();
        assert!(err.to_string().contains("not a regular file"));
    }

    #[tokio::test]
    async fn test_empty_path_is_rejected() {
        let params = StepParams::new("", "mtd:flash0");
        let err = CheckImageFile::new().execute(&params).await.unwrap_err();
        assert_eq!(err, StepExitError::safe_to_reboot("Image file path is empty"));
    }
}
