// SPDX-License-Identifier: MIT

//! `Planner` (§4.F): drives the reviewer agent through the planning and
//! quality-pass protocol, and the issue-breakdown request named in §4.I/§4.J.

use crate::batch_builder::PlannedIssue;
use crate::manifest_parse::parse_manifest_comment;
use noface_core::retry::{default_backoff_delay, should_retry, DEFAULT_RETRY_BUDGET};
use noface_core::IssueId;
use noface_process::supervisor::{PollOutcome, ProcessSupervisor};
use noface_tracker::{IssueTracker, TrackerError};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("tracker error: {0}")]
    Tracker(#[from] TrackerError),
    #[error("failed to spawn reviewer agent: {0}")]
    Spawn(String),
    #[error("reviewer agent failed after {attempts} attempt(s), last exit {last_exit}")]
    ReviewerFailed { attempts: u32, last_exit: i32 },
}

/// Configuration for invoking the reviewer agent as a subprocess (§6:
/// "Reviewer agent: ... used for planning and quality passes").
#[derive(Debug, Clone)]
pub struct ReviewerConfig {
    /// Full argv; the prompt is appended as the final argument.
    pub command: Vec<String>,
    pub cwd: PathBuf,
    pub idle_timeout: Duration,
}

pub struct Planner<T: IssueTracker> {
    tracker: T,
    reviewer: ReviewerConfig,
}

impl<T: IssueTracker> Planner<T> {
    pub fn new(tracker: T, reviewer: ReviewerConfig) -> Self {
        Self { tracker, reviewer }
    }

    /// Run one planning pass (§4.F): invoke the reviewer, then read back
    /// each ready issue's manifest comment. Issues without a parseable
    /// manifest are dropped with a warning rather than failing the pass.
    pub async fn run_planning_pass(&self) -> Result<Vec<PlannedIssue>, PlannerError> {
        let ready = self.tracker.list_ready_issues().await?;
        if ready.is_empty() {
            return Ok(Vec::new());
        }

        let prompt = compose_planning_prompt(&ready.iter().map(|i| (i.id.as_str(), i.title.as_str())).collect::<Vec<_>>());
        self.invoke_reviewer_with_retry(&prompt).await?;

        let mut planned = Vec::new();
        for issue in &ready {
            let comments = self.tracker.list_comments(&issue.id).await?;
            let manifest = comments.iter().rev().find_map(|c| parse_manifest_comment(&c.body));
            match manifest {
                Some(manifest) => planned.push(PlannedIssue { issue_id: IssueId::new(issue.id.clone()), manifest }),
                None => tracing::warn!(issue_id = %issue.id, "no parseable manifest after planning pass, skipping"),
            }
        }
        Ok(planned)
    }

    /// Quality pass: a second reviewer invocation, structurally identical
    /// to planning, used as a periodic review cadence (§4.J).
    pub async fn run_quality_pass(&self, prompt: &str) -> Result<(), PlannerError> {
        self.invoke_reviewer_with_retry(prompt).await
    }

    /// Ask the reviewer to split a stuck issue into sub-issues
    /// (SPEC_FULL §4 "Breakdown request"). Returns the created sub-issue ids.
    pub async fn request_breakdown(&self, issue_id: &str, reason: &str) -> Result<Vec<IssueId>, PlannerError> {
        let issue = self.tracker.show_issue(issue_id).await?;
        let prompt = compose_breakdown_prompt(&issue.title, reason);
        self.invoke_reviewer_with_retry(&prompt).await?;

        let comments = self.tracker.list_comments(issue_id).await?;
        let titles = comments.iter().rev().find_map(|c| parse_breakdown_comment(&c.body)).unwrap_or_default();

        let mut created = Vec::new();
        for title in titles {
            let sub_issue = self.tracker.create_issue(&title, &format!("split from {issue_id}: {reason}")).await?;
            self.tracker.add_dependency(issue_id, &sub_issue.id).await?;
            created.push(IssueId::new(sub_issue.id));
        }
        Ok(created)
    }

    /// Retry the reviewer invocation per §4.F step 2: exponential backoff,
    /// base 1s x2 cap 4s, 3 attempts total, never retrying 124/125.
    async fn invoke_reviewer_with_retry(&self, prompt: &str) -> Result<(), PlannerError> {
        let mut last_exit = 1;
        for attempt in 0..DEFAULT_RETRY_BUDGET {
            let exit = self.run_reviewer_once(prompt).await?;
            if exit == 0 {
                return Ok(());
            }
            last_exit = exit;
            if !should_retry(exit) {
                break;
            }
            if attempt + 1 < DEFAULT_RETRY_BUDGET {
                tokio::time::sleep(default_backoff_delay(attempt)).await;
            }
        }
        Err(PlannerError::ReviewerFailed { attempts: DEFAULT_RETRY_BUDGET, last_exit })
    }

    async fn run_reviewer_once(&self, prompt: &str) -> Result<i32, PlannerError> {
        let mut argv = self.reviewer.command.clone();
        argv.push(prompt.to_string());
        let mut supervisor = ProcessSupervisor::spawn(&argv, Some(&self.reviewer.cwd), self.reviewer.idle_timeout)
            .map_err(|e| PlannerError::Spawn(e.to_string()))?;

        loop {
            match supervisor.poll_lines().await {
                PollOutcome::Line(_) => continue,
                PollOutcome::Eof => break,
                PollOutcome::Timeout => {
                    if let Some(code) = supervisor.try_wait() {
                        return Ok(code);
                    }
                }
            }
        }
        loop {
            if let Some(code) = supervisor.try_wait() {
                return Ok(code);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

fn compose_planning_prompt(ready: &[(&str, &str)]) -> String {
    let listing: String = ready.iter().map(|(id, title)| format!("- {id}: {title}\n")).collect();
    format!(
        "For each ready issue below, determine the set of files it will need to \
         change and comment on the issue with a line of the form:\n\
         MANIFEST: primary=[file1,file2] read=[file3] forbidden=[file4]\n\
         `primary` lists files you will write; it must be non-empty. Then emit \
         one or more PARALLEL_BATCH blocks grouping issues whose primary sets \
         do not overlap.\n\nReady issues:\n{listing}"
    )
}

fn compose_breakdown_prompt(title: &str, reason: &str) -> String {
    format!(
        "The issue \"{title}\" could not be completed ({reason}). Propose a \
         split into smaller sub-issues. Comment on the issue with a line of \
         the form:\nBREAKDOWN: titles=[first sub-issue,second sub-issue]"
    )
}

fn parse_breakdown_comment(body: &str) -> Option<Vec<String>> {
    let line = body.lines().rev().find(|l| l.trim_start().starts_with("BREAKDOWN:"))?;
    let rest = line.trim_start().strip_prefix("BREAKDOWN:")?.trim();
    let start = rest.find("titles=[")? + "titles=[".len();
    let end = rest[start..].find(']')? + start;
    Some(rest[start..end].split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
}
