//! External command execution with a hard timeout.
//!
//! The runner reports raw facts only: exit code, captured stdout/stderr and an
//! optional [`CommandError`]. Deciding what a failure means for the device is
//! left to the calling step.
//!
//! `SystemCommandRunner` spawns the program directly (no shell), drains both
//! pipes concurrently so a chatty child cannot block on a full pipe, and on
//! timeout kills the child's whole process group with SIGKILL.

use async_trait::async_trait;
use log::{debug, warn};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::error::{CommandError, CommandFailure};

/// Exit code reported when no real exit code exists (not started, killed, signaled).
pub const EXIT_CODE_UNAVAILABLE: i32 = -1;

/// Upper bound on waiting for a killed child to be reaped.
pub const KILL_GRACE: Duration = Duration::from_secs(2);

/// Upper bound on draining stdout/stderr once the child is gone.
pub const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Result of one command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub argv: Vec<String>,
    pub exit_code: i32,
    pub error: Option<CommandError>,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl CommandResult {
    /// Result for a command that exited 0.
    pub fn success(argv: &[String], stdout: impl Into<String>) -> Self {
        CommandResult {
            argv: argv.to_vec(),
            exit_code: 0,
            error: None,
            stdout: stdout.into(),
            stderr: String::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// Result for a command that never got to run.
    pub fn not_started(argv: &[String], error: CommandError) -> Self {
        CommandResult {
            argv: argv.to_vec(),
            exit_code: EXIT_CODE_UNAVAILABLE,
            error: Some(error),
            stdout: String::new(),
            stderr: String::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.exit_code == 0
    }

    /// Diagnostic view of a failed invocation, `None` on success.
    ///
    /// A non-zero exit code without an explicit error still counts as a failure.
    pub fn failure(&self) -> Option<CommandFailure> {
        if self.is_success() {
            return None;
        }
        let cause = self.error.clone().unwrap_or(CommandError::NonZeroExit {
            code: self.exit_code,
        });
        Some(CommandFailure {
            argv: self.argv.clone(),
            exit_code: self.exit_code,
            cause,
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
        })
    }
}

/// Capability to run external commands. Steps receive one at construction.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `argv` and waits at most `timeout` for it to finish.
    ///
    /// Always returns a result; invalid input is reported through
    /// [`CommandError::InvalidInvocation`].
    async fn run(&self, argv: &[String], timeout: Duration) -> CommandResult;
}

/// Production runner backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl SystemCommandRunner {
    pub fn new() -> Self {
        SystemCommandRunner
    }
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, argv: &[String], timeout: Duration) -> CommandResult {
        let started = Instant::now();

        let Some((program, args)) = argv.split_first() else {
            return CommandResult::not_started(
                argv,
                CommandError::InvalidInvocation("empty argument vector".to_string()),
            );
        };
        if timeout.is_zero() {
            return CommandResult::not_started(
                argv,
                CommandError::InvalidInvocation("timeout must be greater than zero".to_string()),
            );
        }

        debug!("Running {:?} (timeout {}s)", argv, timeout.as_secs());

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group so a timeout also takes down anything the tool forked.
        #[cfg(unix)]
        command.process_group(0);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to start {:?}: {}", argv, e);
                let mut result = CommandResult::not_started(
                    argv,
                    CommandError::SpawnFailure {
                        cause: e.to_string(),
                    },
                );
                result.elapsed = started.elapsed();
                return result;
            }
        };

        let stdout_task = child
            .stdout
            .take()
            .map(|out| tokio::spawn(read_stream(out)));
        let stderr_task = child
            .stderr
            .take()
            .map(|err| tokio::spawn(read_stream(err)));

        let (exit_code, error) = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => classify_status(status),
            Ok(Err(e)) => (
                EXIT_CODE_UNAVAILABLE,
                Some(CommandError::WaitFailure {
                    cause: e.to_string(),
                }),
            ),
            Err(_) => {
                warn!(
                    "{:?} did not finish within {}s, killing it",
                    argv,
                    timeout.as_secs()
                );
                terminate(&mut child).await;
                (
                    EXIT_CODE_UNAVAILABLE,
                    Some(CommandError::Timeout { after: timeout }),
                )
            }
        };

        // Both drains share one grace period.
        let (stdout, stderr) =
            tokio::join!(collect_output(stdout_task), collect_output(stderr_task));

        let elapsed = started.elapsed();
        debug!(
            "{:?} finished with exit code {} in {:.1?}",
            argv, exit_code, elapsed
        );

        CommandResult {
            argv: argv.to_vec(),
            exit_code,
            error,
            stdout,
            stderr,
            elapsed,
        }
    }
}

fn classify_status(status: ExitStatus) -> (i32, Option<CommandError>) {
    if status.success() {
        return (0, None);
    }
    if let Some(code) = status.code() {
        return (code, Some(CommandError::NonZeroExit { code }));
    }

    #[cfg(unix)]
    let signal = {
        use std::os::unix::process::ExitStatusExt;
        status.signal()
    };
    #[cfg(not(unix))]
    let signal = None;

    (
        EXIT_CODE_UNAVAILABLE,
        Some(CommandError::Signaled { signal }),
    )
}

/// SIGKILL the child's process group, then reap it within [`KILL_GRACE`].
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                debug!("killpg({}) failed: {}", pid, e);
            }
        }
    }

    if let Err(e) = child.start_kill() {
        debug!("start_kill failed: {}", e);
    }

    if tokio::time::timeout(KILL_GRACE, child.wait()).await.is_err() {
        warn!(
            "Killed process was not reaped within {}s",
            KILL_GRACE.as_secs()
        );
    }
}

async fn read_stream<R>(mut reader: R) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Err(e) = reader.read_to_end(&mut buf).await {
        debug!("Output read error: {}", e);
    }
    buf
}

async fn collect_output(task: Option<JoinHandle<Vec<u8>>>) -> String {
    let Some(mut handle) = task else {
        return String::new();
    };
    match tokio::time::timeout(OUTPUT_DRAIN_GRACE, &mut handle).await {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
        Ok(Err(e)) => {
            debug!("Output reader task failed: {}", e);
            String::new()
        }
        Err(_) => {
            // Something outside our process group still holds the pipe open.
            handle.abort();
            warn!(
                "Gave up draining command output after {}s",
                OUTPUT_DRAIN_GRACE.as_secs()
            );
            String::new()
        }
    }
}
