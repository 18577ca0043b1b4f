//! Decoupled logging backend for flashing runs.
//!
//! ```text
//! log::info!() ...
//!     |
//! [LogCollector] (formats, never blocks on IO)
//!     | (crossbeam unbounded channel)
//!     v
//! [writer thread] ---> stderr
//!                 \--> <log_dir>/bmcflash-<timestamp>.log
//! ```
//!
//! The writer is a plain OS thread so it keeps draining regardless of which
//! runtime (if any) the logging call came from. `wait_for_empty` blocks until
//! every line sent before it has been written and synced.

use chrono::Local;
use crossbeam_channel::{bounded, unbounded, Sender};
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::LoggingError;

/// How long `Log::flush` waits for the writer before giving up.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

enum LogMessage {
    Line(LogLine),
    /// Acknowledged once every earlier line is written.
    Flush(Sender<()>),
}

/// A formatted log line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogLine {
    pub level: Level,
    pub target: String,
    pub message: String,
    /// Local wall-clock time, `HH:MM:SS.mmm`.
    pub timestamp: String,
}

impl LogLine {
    pub fn new(level: Level, target: impl Into<String>, message: impl Into<String>) -> Self {
        LogLine {
            level,
            target: target.into(),
            message: message.into(),
            timestamp: Local::now().format("%H:%M:%S%.3f").to_string(),
        }
    }

    pub fn render(&self) -> String {
        format!(
            "[{}] {:<5} {}: {}",
            self.timestamp, self.level, self.target, self.message
        )
    }
}

pub struct LogCollector {
    tx: Sender<LogMessage>,
    level: LevelFilter,
    session_log_path: Option<PathBuf>,
}

impl LogCollector {
    /// Start the writer thread.
    ///
    /// With `log_dir` set, a fresh per-run file is created inside it (the
    /// directory is created if needed). `mirror_stderr` controls whether lines
    /// are also written to stderr.
    pub fn new(
        level: LevelFilter,
        log_dir: Option<&Path>,
        mirror_stderr: bool,
    ) -> Result<Self, LoggingError> {
        let (session_log_path, file) = match log_dir {
            Some(dir) => {
                let (path, file) = create_session_log(dir)?;
                (Some(path), Some(file))
            }
            None => (None, None),
        };

        let (tx, rx) = unbounded::<LogMessage>();

        std::thread::spawn(move || {
            let mut file = file;
            while let Ok(msg) = rx.recv() {
                match msg {
                    LogMessage::Line(line) => {
                        let rendered = line.render();
                        if mirror_stderr {
                            eprintln!("{}", rendered);
                        }
                        if let Some(f) = file.as_mut() {
                            // Write errors are dropped; logging never fails a run.
                            let _ = writeln!(f, "{}", rendered);
                        }
                    }
                    LogMessage::Flush(ack) => {
                        if let Some(f) = file.as_mut() {
                            let _ = f.flush();
                            let _ = f.sync_all();
                        }
                        let _ = std::io::stderr().flush();
                        let _ = ack.send(());
                    }
                }
            }
        });

        Ok(LogCollector {
            tx,
            level,
            session_log_path,
        })
    }

    /// File this run is logging to, if any.
    pub fn session_log_path(&self) -> Option<&Path> {
        self.session_log_path.as_deref()
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }

    /// Queue a line, bypassing the level filter.
    pub fn log_line(&self, line: LogLine) {
        // Only fails once the writer thread is gone, at which point there is
        // nowhere left to report it.
        let _ = self.tx.send(LogMessage::Line(line));
    }

    /// Block until every line queued so far has been written, or `timeout` passes.
    pub fn wait_for_empty(&self, timeout: Duration) -> Result<(), String> {
        let (ack_tx, ack_rx) = bounded(1);
        self.tx
            .send(LogMessage::Flush(ack_tx))
            .map_err(|e| format!("Log writer has stopped: {}", e))?;
        ack_rx
            .recv_timeout(timeout)
            .map_err(|e| format!("Log flush did not complete: {}", e))
    }
}

impl Clone for LogCollector {
    fn clone(&self) -> Self {
        LogCollector {
            tx: self.tx.clone(),
            level: self.level,
            session_log_path: self.session_log_path.clone(),
        }
    }
}

impl Log for LogCollector {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            self.log_line(LogLine::new(
                record.level(),
                record.target(),
                record.args().to_string(),
            ));
        }
    }

    fn flush(&self) {
        let _ = self.wait_for_empty(FLUSH_TIMEOUT);
    }
}

fn create_session_log(log_dir: &Path) -> Result<(PathBuf, File), LoggingError> {
    std::fs::create_dir_all(log_dir)?;

    let stamp = Local::now().format("%Y%m%d-%H%M%S");
    let mut path = log_dir.join(format!("bmcflash-{}.log", stamp));
    let mut suffix = 1;
    while path.exists() {
        path = log_dir.join(format!("bmcflash-{}-{}.log", stamp, suffix));
        suffix += 1;
    }

    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((path, file))
}
