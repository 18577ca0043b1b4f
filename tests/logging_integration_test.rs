//! Global logger installation. Kept to a single test: the logger is process-wide.

use log::LevelFilter;
use tempfile::TempDir;

use bmcflash::config::LoggingSettings;
use bmcflash::{flush_all_logs, initialize_logging, LoggingError};

#[test]
fn test_initialize_logging_writes_session_file_once() {
    let temp_dir = TempDir::new().unwrap();
    let settings = LoggingSettings {
        level: "warn".to_string(),
        log_dir: Some(temp_dir.path().join("logs")),
    };

    let collector = initialize_logging(&settings, Some(LevelFilter::Debug)).unwrap();
    assert_eq!(collector.level(), LevelFilter::Debug);
    assert_eq!(log::max_level(), LevelFilter::Debug);

    log::debug!("Checking image file '/tmp/bmc.rom'");
    log::trace!("not recorded");
    flush_all_logs();

    let path = collector.session_log_path().unwrap().to_path_buf();
    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("DEBUG"));
    assert!(content.contains("Checking image file '/tmp/bmc.rom'"));
    assert!(!content.contains("not recorded"));

    let again = initialize_logging(&settings, None);
    assert!(matches!(again, Err(LoggingError::AlreadyInitialized)));
}
