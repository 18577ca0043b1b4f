//! SystemCommandRunner against real processes.

use std::time::{Duration, Instant};

use bmcflash::command::{CommandRunner, SystemCommandRunner, EXIT_CODE_UNAVAILABLE};
use bmcflash::CommandError;

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_success_captures_stdout() {
    let result = SystemCommandRunner::new()
        .run(&argv(&["sh", "-c", "printf 'flashed'"]), Duration::from_secs(10))
        .await;

    assert!(result.is_success());
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.stdout, "flashed");
    assert!(result.failure().is_none());
}

#[tokio::test]
async fn test_nonzero_exit_keeps_stderr() {
    let result = SystemCommandRunner::new()
        .run(
            &argv(&["sh", "-c", "printf 'flash error' >&2; exit 1"]),
            Duration::from_secs(10),
        )
        .await;

    assert_eq!(result.exit_code, 1);
    assert_eq!(result.error, Some(CommandError::NonZeroExit { code: 1 }));
    assert_eq!(result.stderr, "flash error");

    let failure = result.failure().expect("failure");
    let rendered = failure.to_string();
    assert!(rendered.contains("exit code 1"));
    assert!(rendered.contains("flash error"));
}

#[tokio::test]
async fn test_missing_binary_is_spawn_failure() {
    let result = SystemCommandRunner::new()
        .run(
            &argv(&["/nonexistent/bmcflash-test-tool", "bmc"]),
            Duration::from_secs(10),
        )
        .await;

    assert_eq!(result.exit_code, EXIT_CODE_UNAVAILABLE);
    assert!(matches!(result.error, Some(CommandError::SpawnFailure { .. })));
}

#[tokio::test]
async fn test_invalid_invocations() {
    let runner = SystemCommandRunner::new();

    let empty = runner.run(&[], Duration::from_secs(1)).await;
    assert!(matches!(empty.error, Some(CommandError::InvalidInvocation(_))));
    assert_eq!(empty.exit_code, EXIT_CODE_UNAVAILABLE);

    let zero = runner.run(&argv(&["true"]), Duration::ZERO).await;
    assert!(matches!(zero.error, Some(CommandError::InvalidInvocation(_))));
}

#[tokio::test]
async fn test_timeout_kills_process_ignoring_sigterm() {
    let started = Instant::now();
    let result = SystemCommandRunner::new()
        .run(
            &argv(&["sh", "-c", "trap '' TERM; sleep 30"]),
            Duration::from_millis(300),
        )
        .await;

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(result.exit_code, EXIT_CODE_UNAVAILABLE);
    assert!(matches!(result.error, Some(CommandError::Timeout { .. })));
}

#[tokio::test]
async fn test_timeout_takes_down_background_children() {
    // The backgrounded sleep holds the output pipes open; unless the whole
    // group is killed the drain would wait for it.
    let started = Instant::now();
    let result = SystemCommandRunner::new()
        .run(
            &argv(&["sh", "-c", "sleep 30 & wait"]),
            Duration::from_millis(300),
        )
        .await;

    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(matches!(result.error, Some(CommandError::Timeout { .. })));
}

#[tokio::test]
async fn test_escaped_grandchild_delays_return_by_one_drain_grace() {
    // setsid moves the sleep out of the killed group while it keeps both
    // pipes open, so stdout and stderr each hit the drain grace.
    let started = Instant::now();
    let result = SystemCommandRunner::new()
        .run(
            &argv(&["sh", "-c", "setsid sleep 30 & sleep 30"]),
            Duration::from_millis(300),
        )
        .await;

    assert!(matches!(result.error, Some(CommandError::Timeout { .. })));
    assert!(started.elapsed() < Duration::from_millis(3800));
}

#[tokio::test]
async fn test_arguments_are_not_shell_split() {
    let result = SystemCommandRunner::new()
        .run(
            &argv(&["printf", "%s|", "/tmp/my image.rom", "$HOME;echo"]),
            Duration::from_secs(10),
        )
        .await;

    assert!(result.is_success());
    assert_eq!(result.stdout, "/tmp/my image.rom|$HOME;echo|");
}
