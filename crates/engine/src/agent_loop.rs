// SPDX-License-Identifier: MIT

//! `AgentLoop` (§4.J): the thin top-level controller — prerequisite checks,
//! crash recovery, then the planner/quality/dispatch iteration.

use crate::pool::{EngineError, WorkerPool};
use noface_core::{BatchStatus, Clock, Issue, IssueId, IssueStatus};
use noface_planner::{build_batches, Planner, PlannerError};
use noface_storage::{OrchestratorState, ProgressLog, StorageError};
use noface_tracker::{IssueTracker, TrackerError};
use noface_vcs::RepoOps;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentLoopError {
    #[error("required binary not found on PATH: {0}")]
    MissingBinary(String),
    #[error("baseline build command exited {0}")]
    BuildFailed(i32),
    #[error("failed to spawn baseline build command: {0}")]
    BuildSpawn(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Planner(#[from] PlannerError),
    #[error(transparent)]
    Tracker(#[from] TrackerError),
}

/// Run-mode knobs carried in from the CLI (§6 flags, SPEC_FULL §4 config).
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub max_iterations: Option<u64>,
    /// Run only this issue, stopping once it completes (§6 `--issue ID`).
    pub only_issue: Option<IssueId>,
    /// Skip the baseline build prerequisite check (§6 `--dry-run`).
    pub dry_run: bool,
    pub run_planner: bool,
    pub run_quality: bool,
    pub planner_interval: u64,
    pub quality_interval: u64,
    /// Argv for the baseline build command; empty means "no build configured".
    pub build_command: Vec<String>,
    /// Binaries that must resolve on `PATH` before the loop starts.
    pub required_binaries: Vec<String>,
}

/// Why the loop stopped (§4.J).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxIterationsReached,
    IssueCompleted,
    BacklogEmpty,
    Interrupted,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub iterations_run: u64,
    pub stop_reason: StopReason,
}

pub struct AgentLoop<'a, C: Clock> {
    repo: &'a dyn RepoOps,
    tracker: &'a dyn IssueTracker,
    planner: Planner<&'a dyn IssueTracker>,
    pool: WorkerPool<'a, C>,
    progress: ProgressLog,
    state_path: PathBuf,
    options: RunOptions,
}

impl<'a, C: Clock> AgentLoop<'a, C> {
    pub fn new(
        repo: &'a dyn RepoOps,
        tracker: &'a dyn IssueTracker,
        planner: Planner<&'a dyn IssueTracker>,
        pool: WorkerPool<'a, C>,
        progress: ProgressLog,
        state_path: PathBuf,
        options: RunOptions,
    ) -> Self {
        Self { repo, tracker, planner, pool, progress, state_path, options }
    }

    /// Required binaries resolve on `PATH`, and (unless `--dry-run`) the
    /// configured baseline build command exits 0 (SPEC_FULL §4).
    pub async fn check_prerequisites(&self) -> Result<(), AgentLoopError> {
        for bin in &self.options.required_binaries {
            if !binary_on_path(bin) {
                return Err(AgentLoopError::MissingBinary(bin.clone()));
            }
        }

        if self.options.dry_run || self.options.build_command.is_empty() {
            return Ok(());
        }

        let Some((program, args)) = self.options.build_command.split_first() else { return Ok(()) };
        let status = tokio::process::Command::new(program)
            .args(args)
            .status()
            .await
            .map_err(|e| AgentLoopError::BuildSpawn(e.to_string()))?;
        match status.code() {
            Some(0) => Ok(()),
            Some(code) => Err(AgentLoopError::BuildFailed(code)),
            None => Err(AgentLoopError::BuildFailed(-1)),
        }
    }

    /// Run to completion (§4.J). Persists state after every iteration so a
    /// crash mid-run loses at most the in-flight iteration's work.
    pub async fn run(&self, num_workers: usize) -> Result<RunSummary, AgentLoopError> {
        let mut state = OrchestratorState::load(&self.state_path, num_workers)?;
        state.recover(self.repo).await;

        if let Some(only) = &self.options.only_issue {
            if !state.issues.contains_key(only) {
                self.tracker.show_issue(only.as_str()).await?;
                let mut issue = Issue::new(only.clone());
                issue.status = IssueStatus::Ready;
                state.issues.insert(only.clone(), issue);
            } else if let Some(issue) = state.issues.get_mut(only) {
                if issue.status == IssueStatus::Open {
                    issue.status = IssueStatus::Ready;
                }
            }
        }
        state.save(&self.state_path)?;

        let mut iteration: u64 = 0;
        let stop_reason = loop {
            if self.pool.is_cancelled() {
                break StopReason::Interrupted;
            }
            if let Some(max) = self.options.max_iterations {
                if iteration >= max {
                    break StopReason::MaxIterationsReached;
                }
            }

            if self.options.run_planner && iteration % self.options.planner_interval.max(1) == 0 {
                match self.planner.run_planning_pass().await {
                    Ok(planned) if !planned.is_empty() => {
                        for batch in build_batches(planned) {
                            for issue_id in &batch.issue_ids {
                                if let Some(issue) = state.issues.get_mut(issue_id) {
                                    issue.status = IssueStatus::Ready;
                                }
                            }
                            state.batches.push(batch);
                        }
                    }
                    Ok(_) => {}
                    Err(err) => tracing::warn!(%err, "planning pass failed"),
                }
            }

            if self.options.run_quality && iteration > 0 && iteration % self.options.quality_interval.max(1) == 0 {
                if let Err(err) = self.planner.run_quality_pass("Review recent merges for quality issues.").await {
                    tracing::warn!(%err, "quality pass failed");
                }
            }

            let summary = self.run_one_iteration(&mut state).await?;
            state.save(&self.state_path)?;
            self.progress.record(iteration, &summary);
            iteration += 1;

            if let Some(only) = &self.options.only_issue {
                if state.issues.get(only).map(|i| i.status) == Some(IssueStatus::Completed) {
                    break StopReason::IssueCompleted;
                }
            }

            if self.backlog_is_empty(&state) {
                break StopReason::BacklogEmpty;
            }
        };

        state.save(&self.state_path)?;
        Ok(RunSummary { iterations_run: iteration, stop_reason })
    }

    /// Dispatch exactly one unit of work: the next pending batch, or — if
    /// none exists — the single-issue sequential fallback (§4.J).
    async fn run_one_iteration(&self, state: &mut OrchestratorState) -> Result<String, AgentLoopError> {
        if let Some(idx) = state.batches.iter().position(|b| b.status == BatchStatus::Pending) {
            let mut batch = state.batches[idx].clone();
            let outcome = self.pool.run_batch(state, &mut batch).await?;
            batch.status = if outcome.cancelled {
                BatchStatus::Pending
            } else if outcome.failed.is_empty() {
                BatchStatus::Completed
            } else {
                BatchStatus::Aborted
            };
            state.batches[idx] = batch;

            for (issue_id, reason) in &outcome.needs_breakdown {
                if let Err(err) = self.planner.request_breakdown(issue_id.as_str(), reason).await {
                    tracing::warn!(%issue_id, %err, "breakdown request failed");
                }
            }

            return Ok(format!(
                "batch {}: {} completed, {} failed, {} cancelled",
                state.batches[idx].id,
                outcome.completed.len(),
                outcome.failed.len(),
                outcome.cancelled,
            ));
        }

        let next_unrestricted = self.next_unrestricted_issue(state);
        match next_unrestricted {
            Some(issue_id) => {
                let ok = self.pool.run_single_issue(state, &issue_id).await?;
                Ok(format!("single-issue {issue_id}: {}", if ok { "completed" } else { "failed" }))
            }
            None => Ok("no pending batch or ready issue, idle".to_string()),
        }
    }

    fn next_unrestricted_issue(&self, state: &OrchestratorState) -> Option<IssueId> {
        state
            .issues
            .values()
            .find(|issue| issue.status == IssueStatus::Ready && !issue.has_manifest())
            .map(|issue| issue.id.clone())
    }

    fn backlog_is_empty(&self, state: &OrchestratorState) -> bool {
        let pending_batch = state.batches.iter().any(|b| b.status == BatchStatus::Pending);
        let ready_issue = state.issues.values().any(|i| i.status == IssueStatus::Ready);
        !pending_batch && !ready_issue
    }
}

fn binary_on_path(bin: &str) -> bool {
    let path = std::path::Path::new(bin);
    if path.is_absolute() {
        return path.is_file();
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(bin).is_file()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_git_or_sh_on_path() {
        assert!(binary_on_path("sh") || binary_on_path("cmd.exe"));
    }

    #[test]
    fn rejects_nonexistent_binary() {
        assert!(!binary_on_path("definitely-not-a-real-binary-xyz"));
    }
}
