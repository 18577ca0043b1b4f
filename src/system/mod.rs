//! Process-level plumbing: the global logger and the device lock.

pub mod lock;

use log::LevelFilter;
use std::sync::OnceLock;
use std::time::Duration;

use crate::config::LoggingSettings;
use crate::error::LoggingError;
use crate::log_collector::LogCollector;

pub use lock::DeviceLock;

static GLOBAL_COLLECTOR: OnceLock<LogCollector> = OnceLock::new();

/// Install a [`LogCollector`] as the `log` crate's global logger.
///
/// `level_override` wins over the level in `settings`. Returns a handle that
/// shares the writer thread with the installed logger. Can succeed only once
/// per process.
pub fn initialize_logging(
    settings: &LoggingSettings,
    level_override: Option<LevelFilter>,
) -> Result<LogCollector, LoggingError> {
    let level = match level_override {
        Some(level) => level,
        None => settings
            .level
            .parse::<LevelFilter>()
            .map_err(|_| LoggingError::InvalidLevel(settings.level.clone()))?,
    };

    let collector = LogCollector::new(level, settings.log_dir.as_deref(), true)?;
    log::set_boxed_logger(Box::new(collector.clone()))
        .map_err(|_| LoggingError::AlreadyInitialized)?;
    log::set_max_level(level);
    let _ = GLOBAL_COLLECTOR.set(collector.clone());

    if let Some(path) = collector.session_log_path() {
        log::info!("Logging to {}", path.display());
    }
    Ok(collector)
}

/// Flush pending log lines to stderr and disk. No-op before logging is initialized.
pub fn flush_all_logs() {
    if let Some(collector) = GLOBAL_COLLECTOR.get() {
        if let Err(e) = collector.wait_for_empty(Duration::from_secs(5)) {
            eprintln!("[bmcflash] {}", e);
        }
    }
}
