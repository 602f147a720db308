// SPDX-License-Identifier: MIT

//! Subprocess-backed `IssueTracker`: shells out to a configured tracker CLI
//! (e.g. `bd`) with a fixed argument grammar, parsing JSON stdout.

use crate::{Comment, IssueTracker, TrackerError, TrackerIssue};
use async_trait::async_trait;
use noface_process::timeout_run::{run_with_timeout, TRACKER_COMMAND_TIMEOUT};
use std::path::PathBuf;
use tokio::process::Command;

/// Drives a tracker CLI as an opaque subprocess (§6 non-goal: "the issue
/// tracker ... treated as an opaque subprocess with a described
/// stdin/stdout/exit-code contract").
pub struct CommandTracker {
    /// `argv[0]`, e.g. `"bd"`.
    program: String,
    cwd: PathBuf,
}

impl CommandTracker {
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self { program: program.into(), cwd: cwd.into() }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(args).current_dir(&self.cwd);
        cmd
    }

    async fn run_json<T: serde::de::DeserializeOwned>(&self, args: &[&str], label: &str) -> Result<T, TrackerError> {
        let cmd = self.command(args);
        let out = run_with_timeout(cmd, TRACKER_COMMAND_TIMEOUT, label)
            .await
            .map_err(|e| TrackerError::CommandFailed(e.to_string()))?;
        if !out.status.success() {
            return Err(TrackerError::CommandFailed(String::from_utf8_lossy(&out.stderr).trim().to_string()));
        }
        Ok(serde_json::from_slice(&out.stdout)?)
    }

    async fn run_plain(&self, args: &[&str], label: &str) -> Result<(), TrackerError> {
        let cmd = self.command(args);
        let out = run_with_timeout(cmd, TRACKER_COMMAND_TIMEOUT, label)
            .await
            .map_err(|e| TrackerError::CommandFailed(e.to_string()))?;
        if !out.status.success() {
            return Err(TrackerError::CommandFailed(String::from_utf8_lossy(&out.stderr).trim().to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl IssueTracker for CommandTracker {
    async fn list_all_issues(&self) -> Result<Vec<TrackerIssue>, TrackerError> {
        self.run_json(&["list", "--json"], "tracker list").await
    }

    async fn list_ready_issues(&self) -> Result<Vec<TrackerIssue>, TrackerError> {
        self.run_json(&["list", "--ready", "--json"], "tracker list --ready").await
    }

    async fn show_issue(&self, issue_id: &str) -> Result<TrackerIssue, TrackerError> {
        self.run_json(&["show", issue_id, "--json"], "tracker show").await
    }

    async fn list_comments(&self, issue_id: &str) -> Result<Vec<Comment>, TrackerError> {
        self.run_json(&["comments", issue_id, "--json"], "tracker comments").await
    }

    async fn append_comment(&self, issue_id: &str, body: &str) -> Result<(), TrackerError> {
        self.run_plain(&["comment", issue_id, body], "tracker comment").await
    }

    async fn update_status(&self, issue_id: &str, status: &str) -> Result<(), TrackerError> {
        self.run_plain(&["status", issue_id, status], "tracker status").await
    }

    async fn close_issue(&self, issue_id: &str) -> Result<(), TrackerError> {
        self.run_plain(&["close", issue_id], "tracker close").await
    }

    async fn add_dependency(&self, issue_id: &str, depends_on: &str) -> Result<(), TrackerError> {
        self.run_plain(&["depend", issue_id, depends_on], "tracker depend").await
    }

    async fn create_issue(&self, title: &str, body: &str) -> Result<TrackerIssue, TrackerError> {
        self.run_json(&["create", title, "--body", body, "--json"], "tracker create").await
    }
}
