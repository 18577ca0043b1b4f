//! Core data types for bmcflash.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Device identifier used when none is given, the primary BMC flash chip.
pub const DEFAULT_DEVICE_ID: &str = "mtd:flash0";

/// Inputs shared by every step of a pipeline run.
///
/// Built once before the run and only ever handed out by shared reference,
/// so no step can alter what the next one sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepParams {
    image_file_path: PathBuf,
    device_id: String,
    #[serde(default)]
    partition: Option<String>,
    #[serde(default)]
    install: bool,
    #[serde(default)]
    force: bool,
}

impl StepParams {
    pub fn new(image_file_path: impl Into<PathBuf>, device_id: impl Into<String>) -> Self {
        StepParams {
            image_file_path: image_file_path.into(),
            device_id: device_id.into(),
            partition: None,
            install: false,
            force: false,
        }
    }

    pub fn with_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = Some(partition.into());
        self
    }

    pub fn with_install(mut self, install: bool) -> Self {
        self.install = install;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn image_file_path(&self) -> &Path {
        &self.image_file_path
    }

    /// Image path as passed on a command line.
    pub fn image_file_arg(&self) -> String {
        self.image_file_path.to_string_lossy().into_owned()
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn partition(&self) -> Option<&str> {
        self.partition.as_deref()
    }

    pub fn install(&self) -> bool {
        self.install
    }

    pub fn force(&self) -> bool {
        self.force
    }
}

impl fmt::Display for StepParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "image='{}' device='{}'",
            self.image_file_path.display(),
            self.device_id
        )?;
        if let Some(partition) = &self.partition {
            write!(f, " partition='{}'", partition)?;
        }
        write!(f, " install={} force={}", self.install, self.force)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let params = StepParams::new("/tmp/bmc.rom", DEFAULT_DEVICE_ID);
        assert_eq!(params.image_file_path(), Path::new("/tmp/bmc.rom"));
        assert_eq!(params.device_id(), "mtd:flash0");
        assert_eq!(params.partition(), None);
        assert!(!params.install());
        assert!(!params.force());
    }

    #[test]
    fn test_builder_overrides() {
        let params = StepParams::new("/tmp/bmc.rom", "mtd:flash1")
            .with_partition("u-boot")
            .with_install(true)
            .with_force(true);
        assert_eq!(params.partition(), Some("u-boot"));
        assert!(params.install());
        assert!(params.force());
    }

    #[test]
    fn test_image_file_arg_keeps_spaces() {
        let params = StepParams::new("/tmp/my images/bmc v2.rom", DEFAULT_DEVICE_ID);
        assert_eq!(params.image_file_arg(), "/tmp/my images/bmc v2.rom");
    }

    #[test]
    fn test_display() {
        let params =
            StepParams::new("/tmp/bmc.rom", "mtd:flash0").with_partition("rootfs");
        assert_eq!(
            params.to_string(),
            "image='/tmp/bmc.rom' device='mtd:flash0' partition='rootfs' install=false force=false"
        );
    }

    #[test]
    fn test_json_roundtrip_defaults_missing_flags() {
        let params: StepParams =
            serde_json::from_str(r#"{"image_file_path":"/tmp/a.rom","device_id":"mtd:flash0"}"#)
                .expect("params should deserialize");
        assert_eq!(params, StepParams::new("/tmp/a.rom", "mtd:flash0"));
    }
}
