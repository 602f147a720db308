// SPDX-License-Identifier: MIT

//! One-shot subprocess execution with a hard timeout, for short commands
//! (`git worktree add`, tracker CLI calls) as opposed to the long-lived,
//! polled agent children owned by [`crate::supervisor::ProcessSupervisor`].

use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Default timeout for `git worktree` operations.
pub const GIT_WORKTREE_TIMEOUT: Duration = Duration::from_secs(30);
/// Default timeout for tracker CLI round-trips (list/show/comment/close).
pub const TRACKER_COMMAND_TIMEOUT: Duration = Duration::from_secs(15);
/// Default timeout for a short planner/reviewer liveness probe.
pub const PREREQ_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum RunError {
    #[error("{label}: failed to spawn: {source}")]
    Spawn { label: String, #[source] source: std::io::Error },
    #[error("{label}: timed out after {timeout:?}")]
    Timeout { label: String, timeout: Duration },
}

/// Run `cmd` to completion, killing it if `timeout` elapses first.
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    label: &str,
) -> Result<std::process::Output, RunError> {
    let child = cmd.kill_on_drop(true).output();
    match tokio::time::timeout(timeout, child).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(source)) => Err(RunError::Spawn { label: label.to_string(), source }),
        Err(_) => Err(RunError::Timeout { label: label.to_string(), timeout }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn succeeds_within_timeout() {
        let mut cmd = Command::new("true");
        let out = run_with_timeout(cmd.arg(""), Duration::from_secs(5), "true").await;
        let out = out.unwrap();
        assert!(out.status.success());
    }

    #[tokio::test]
    async fn times_out_a_sleeping_child() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let result = run_with_timeout(cmd, Duration::from_millis(50), "sleep").await;
        assert!(matches!(result, Err(RunError::Timeout { .. })));
    }
}
