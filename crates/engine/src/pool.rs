// SPDX-License-Identifier: MIT

//! `WorkerPool` (§4.H): the dispatch loop. One logical thread cooperatively
//! polling up to `N` child processes per batch.

use crate::compliance::{attributable_paths, check_compliance, rollback_violations};
use crate::prompt::{implementer_prompt, resume_prompt_fragment, stricter_prompt, unrestricted_prompt};
use noface_core::retry::{should_retry, DEFAULT_RETRY_BUDGET};
use noface_core::{
    AcquireResult, Attempt, AttemptOutcome, Baseline, Batch, BatchStatus, CancelToken, Clock, IssueId,
    IssueStatus, Manifest, WorkerId, WorkerStatus,
};
use noface_process::sentinel::SentinelScanner;
use noface_process::stream_parser::parse_line;
use noface_process::supervisor::{PollOutcome, ProcessSupervisor};
use noface_storage::{OrchestratorState, TranscriptEvent, TranscriptStore};
use noface_tracker::IssueTracker;
use noface_vcs::{CommitOutcome, DirtyPaths, MergeOutcome, RepoOps};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("vcs error: {0}")]
    Vcs(#[from] noface_vcs::VcsError),
    #[error("tracker error: {0}")]
    Tracker(#[from] noface_tracker::TrackerError),
    #[error("failed to spawn worker: {0}")]
    Spawn(String),
}

/// Configuration the dispatcher needs to spawn implementer agents.
#[derive(Debug, Clone)]
pub struct ImplementerConfig {
    /// `argv` prefix; the composed prompt is appended as the final argument.
    pub command: Vec<String>,
    pub agent_timeout: Duration,
}

/// What happened to a batch after [`WorkerPool::run_batch`] returns.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub completed: Vec<IssueId>,
    pub failed: Vec<IssueId>,
    /// Issues whose failure should trigger a breakdown request (§4.I/§4.J):
    /// idle timeout, or repeated manifest violations past the retry budget.
    pub needs_breakdown: Vec<(IssueId, String)>,
    pub cancelled: bool,
}

/// A running worker's process-facing state. Not part of the durable
/// `OrchestratorState` document — rebuilt fresh every time a worker starts.
struct RunningSlot {
    issue_id: IssueId,
    supervisor: ProcessSupervisor,
    scanner: SentinelScanner,
    raw_buffer: String,
    baseline: Baseline,
    workspace: PathBuf,
    manifest: Manifest,
    attempt_no: u32,
}

/// A worker parked by a `BLOCKED_BY_FILE` conflict (§4.H step 3). Its child
/// has been killed; its workspace and baseline are retained so it can
/// resume without losing prior work.
struct WaitingSlot {
    issue_id: IssueId,
    blocked_on: String,
    baseline: Baseline,
    workspace: PathBuf,
    manifest: Manifest,
    attempt_no: u32,
}

enum Slot {
    Idle,
    Running(RunningSlot),
    Waiting(WaitingSlot),
}

struct FinishedResult {
    worker_id: WorkerId,
    issue_id: IssueId,
    exit_code: i32,
    baseline: Baseline,
    workspace: PathBuf,
    manifest: Manifest,
    attempt_no: u32,
}

pub struct WorkerPool<'a, C: Clock> {
    repo: &'a dyn RepoOps,
    tracker: &'a dyn IssueTracker,
    transcript: &'a TranscriptStore,
    clock: C,
    cancel: CancelToken,
    implementer: ImplementerConfig,
}

impl<'a, C: Clock> WorkerPool<'a, C> {
    pub fn new(
        repo: &'a dyn RepoOps,
        tracker: &'a dyn IssueTracker,
        transcript: &'a TranscriptStore,
        clock: C,
        cancel: CancelToken,
        implementer: ImplementerConfig,
    ) -> Self {
        Self { repo, tracker, transcript, clock, cancel, implementer }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run one batch to completion (§4.H). Mutates `state` in place:
    /// worker/issue/lock/batch transitions, attempts recorded.
    pub async fn run_batch(&self, state: &mut OrchestratorState, batch: &mut Batch) -> Result<BatchOutcome, EngineError> {
        batch.status = BatchStatus::Running;
        let num_workers = state.workers.len();
        let mut slots: Vec<Slot> = (0..num_workers).map(|_| Slot::Idle).collect();
        let mut unassigned: Vec<IssueId> = batch.issue_ids.clone();
        let mut outcome = BatchOutcome::default();

        loop {
            // Step 1: cooperative cancellation check.
            if self.cancel.is_cancelled() {
                for slot in &mut slots {
                    if let Slot::Running(running) = slot {
                        running.supervisor.kill_and_reap().await;
                    }
                }
                batch.status = BatchStatus::Pending;
                outcome.cancelled = true;
                return Ok(outcome);
            }

            // Step 2: poll each live slot once, feed the parser and the
            // sentinel scanner, log to the transcript.
            let mut sentinel_hits = Vec::new();
            for (idx, slot) in slots.iter_mut().enumerate() {
                if let Slot::Running(running) = slot {
                    if let PollOutcome::Line(line) = running.supervisor.poll_lines().await {
                        let event = parse_line(&line);
                        self.transcript.append(&TranscriptEvent {
                            session_id: running.issue_id.as_str(),
                            seq: 0,
                            event_type: event_type_name(&event),
                            tool_name: tool_name(&event),
                            raw_line: &line,
                        });
                        running.raw_buffer.push_str(&line);
                        running.raw_buffer.push('\n');
                        if let Some(path) = running.scanner.scan(&running.raw_buffer) {
                            sentinel_hits.push((idx, path));
                        }
                    }
                }
            }

            // Step 3: resolve sentinel hits against the lock table.
            for (idx, path) in sentinel_hits {
                let conflicting = state
                    .locks
                    .holder(&path)
                    .map(|entry| {
                        if let Slot::Running(running) = &slots[idx] {
                            &entry.issue_id != &running.issue_id
                        } else {
                            false
                        }
                    })
                    .unwrap_or(false);
                if conflicting {
                    if let Slot::Running(mut running) = std::mem::replace(&mut slots[idx], Slot::Idle) {
                        running.supervisor.kill_and_reap().await;
                        state.locks.release(&running.issue_id);
                        if let Some(worker) = state.workers.get_mut(idx) {
                            worker.status = WorkerStatus::Waiting;
                            worker.blocked_on_file = Some(path.clone());
                        }
                        slots[idx] = Slot::Waiting(WaitingSlot {
                            issue_id: running.issue_id,
                            blocked_on: path,
                            baseline: running.baseline,
                            workspace: running.workspace,
                            manifest: running.manifest,
                            attempt_no: running.attempt_no,
                        });
                    }
                }
            }

            // Step 4: reap exited children.
            let mut finished = Vec::new();
            for (idx, slot) in slots.iter_mut().enumerate() {
                if let Slot::Running(running) = slot {
                    if let Some(exit_code) = running.supervisor.try_wait() {
                        if let Slot::Running(running) = std::mem::replace(&mut slots[idx], Slot::Idle) {
                            finished.push((
                                WorkerId(idx),
                                FinishedResult {
                                    worker_id: WorkerId(idx),
                                    issue_id: running.issue_id,
                                    exit_code,
                                    baseline: running.baseline,
                                    workspace: running.workspace,
                                    manifest: running.manifest,
                                    attempt_no: running.attempt_no,
                                },
                            ));
                        }
                    }
                }
            }

            // Step 5: idle-timeout kills.
            for (idx, slot) in slots.iter_mut().enumerate() {
                if let Slot::Running(running) = slot {
                    if running.supervisor.idle_seconds() >= self.implementer.agent_timeout.as_secs() {
                        running.supervisor.kill_and_reap().await;
                        if let Slot::Running(running) = std::mem::replace(&mut slots[idx], Slot::Idle) {
                            finished.push((
                                WorkerId(idx),
                                FinishedResult {
                                    worker_id: WorkerId(idx),
                                    issue_id: running.issue_id,
                                    exit_code: noface_process::supervisor::EXIT_IDLE_TIMEOUT,
                                    baseline: running.baseline,
                                    workspace: running.workspace,
                                    manifest: running.manifest,
                                    attempt_no: running.attempt_no,
                                },
                            ));
                        }
                    }
                }
            }

            // Step 6: process finished results (compliance + merge-back).
            let mut locks_released = false;
            for (worker_id, result) in finished {
                locks_released = true;
                self.finish_result(state, &mut outcome, worker_id, result, &mut unassigned).await?;
            }

            // Step 7: resume waiting workers whose blocker has cleared.
            if locks_released {
                for idx in 0..slots.len() {
                    let should_resume = matches!(&slots[idx], Slot::Waiting(w)
                        if state.locks.holder(&w.blocked_on).map(|e| &e.issue_id == &w.issue_id).unwrap_or(true));
                    if should_resume {
                        if let Slot::Waiting(waiting) = std::mem::replace(&mut slots[idx], Slot::Idle) {
                            self.resume_worker(state, &mut slots[idx], WorkerId(idx), waiting).await?;
                        }
                    }
                }
            }

            // Step 8: dispatch unassigned issues onto idle slots.
            let mut still_unassigned = Vec::new();
            for issue_id in unassigned {
                let Some(idle_idx) = slots.iter().position(|s| matches!(s, Slot::Idle)) else {
                    still_unassigned.push(issue_id);
                    continue;
                };
                if !self.try_dispatch(state, &mut slots[idle_idx], WorkerId(idle_idx), &issue_id).await? {
                    still_unassigned.push(issue_id);
                }
            }
            unassigned = still_unassigned;

            // Stop condition: nothing left running, waiting, or unassigned.
            let all_quiesced = unassigned.is_empty()
                && slots.iter().all(|s| matches!(s, Slot::Idle));
            if all_quiesced {
                batch.status = BatchStatus::Completed;
                return Ok(outcome);
            }

            // Step 9.
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn try_dispatch(
        &self,
        state: &mut OrchestratorState,
        slot: &mut Slot,
        worker_id: WorkerId,
        issue_id: &IssueId,
    ) -> Result<bool, EngineError> {
        let Some(issue) = state.issues.get(issue_id) else { return Ok(false) };
        let Some(manifest) = issue.manifest.clone() else { return Ok(false) };
        let attempt_no = issue.attempt_count() as u32;
        let retry_violation = issue
            .latest_attempt()
            .filter(|attempt| attempt.outcome == AttemptOutcome::ManifestViolation)
            .map(|attempt| violated_paths_from_notes(&attempt.notes));

        let now_ms = self.clock.now_ms();
        if !matches!(state.locks.try_acquire(issue_id, &manifest, worker_id, now_ms), AcquireResult::Acquired) {
            return Ok(false);
        }

        // Baseline is scoped to the isolated workspace, not the main repo: the
        // worktree the agent runs in is a separate working tree, so only its
        // own diff-from-HEAD can tell us what the agent touched (§4.I).
        let workspace = self.repo.create_isolated_workspace(worker_id.0).await?;
        let baseline = Baseline::new(dirty_set(self.repo.workspace_diff(&workspace).await?));
        let tracker_issue = self.tracker.show_issue(issue_id.as_str()).await?;
        let base_prompt = implementer_prompt(&tracker_issue.title, &tracker_issue.body, &manifest);
        let prompt = match retry_violation {
            Some(violated) => stricter_prompt(&base_prompt, &violated),
            None => base_prompt,
        };

        *slot = self.spawn_slot(issue_id.clone(), &workspace, &prompt, baseline, manifest, attempt_no)?;

        if let Some(worker) = state.workers.get_mut(worker_id.0) {
            worker.status = WorkerStatus::Running;
            worker.current_issue = Some(issue_id.clone());
            worker.started_at_ms = Some(now_ms);
            worker.workspace_path = Some(workspace.display().to_string());
        }
        if let Some(issue) = state.issues.get_mut(issue_id) {
            issue.status = IssueStatus::Running;
        }
        Ok(true)
    }

    async fn resume_worker(
        &self,
        state: &mut OrchestratorState,
        slot: &mut Slot,
        worker_id: WorkerId,
        waiting: WaitingSlot,
    ) -> Result<(), EngineError> {
        let now_ms = self.clock.now_ms();
        if !matches!(
            state.locks.try_acquire(&waiting.issue_id, &waiting.manifest, worker_id, now_ms),
            AcquireResult::Acquired
        ) {
            *slot = Slot::Waiting(waiting);
            return Ok(());
        }

        let tracker_issue = self.tracker.show_issue(waiting.issue_id.as_str()).await?;
        let base_prompt = implementer_prompt(&tracker_issue.title, &tracker_issue.body, &waiting.manifest);
        let resume_prompt = format!("{}\n\n{}", resume_prompt_fragment(&waiting.blocked_on), base_prompt);

        *slot = self.spawn_slot(
            waiting.issue_id.clone(),
            &waiting.workspace,
            &resume_prompt,
            waiting.baseline,
            waiting.manifest,
            waiting.attempt_no,
        )?;
        if let Some(worker) = state.workers.get_mut(worker_id.0) {
            worker.status = WorkerStatus::Running;
            worker.blocked_on_file = None;
        }
        Ok(())
    }

    fn spawn_slot(
        &self,
        issue_id: IssueId,
        workspace: &PathBuf,
        prompt: &str,
        baseline: Baseline,
        manifest: Manifest,
        attempt_no: u32,
    ) -> Result<Slot, EngineError> {
        let mut argv = self.implementer.command.clone();
        argv.push(prompt.to_string());
        let supervisor = ProcessSupervisor::spawn(&argv, Some(workspace), self.implementer.agent_timeout)
            .map_err(|e| EngineError::Spawn(e.to_string()))?;
        Ok(Slot::Running(RunningSlot {
            issue_id,
            supervisor,
            scanner: SentinelScanner::new(),
            raw_buffer: String::new(),
            baseline,
            workspace: workspace.clone(),
            manifest,
            attempt_no,
        }))
    }

    async fn finish_result(
        &self,
        state: &mut OrchestratorState,
        outcome: &mut BatchOutcome,
        worker_id: WorkerId,
        result: FinishedResult,
        unassigned: &mut Vec<IssueId>,
    ) -> Result<(), EngineError> {
        state.locks.release(&result.issue_id);
        if let Some(worker) = state.workers.get_mut(worker_id.0) {
            worker.reset_to_idle();
        }

        let other_primaries: Vec<std::collections::BTreeSet<String>> = state
            .issues
            .values()
            .filter(|issue| issue.id != result.issue_id)
            .filter_map(|issue| issue.manifest.as_ref().map(|m| m.primary.clone()))
            .collect();
        let other_refs: Vec<&std::collections::BTreeSet<String>> = other_primaries.iter().collect();

        let current_dirty = DirtyPaths { modified: dirty_set(self.repo.workspace_diff(&result.workspace).await?), ..DirtyPaths::default() };
        let attributable = attributable_paths(&current_dirty, &result.baseline, &other_refs);
        let verdict = check_compliance(attributable, &result.manifest);

        if !verdict.is_clean() {
            let attempt = rollback_violations(self.repo, &result.workspace, &verdict, result.attempt_no).await;
            self.record_attempt(state, &result.issue_id, attempt);
            if result.attempt_no + 1 < DEFAULT_RETRY_BUDGET {
                // `try_dispatch` composes the stricter retry prompt itself,
                // reading this attempt back off the issue's attempt history.
                unassigned.push(result.issue_id.clone());
                if let Some(issue) = state.issues.get_mut(&result.issue_id) {
                    issue.status = IssueStatus::Ready;
                }
            } else {
                self.mark_failed(state, outcome, &result.issue_id).await;
                outcome.needs_breakdown.push((result.issue_id, "repeated manifest violations".to_string()));
            }
            return Ok(());
        }

        if result.exit_code == 0 {
            match self.repo.stage_and_commit(&result.workspace, &format!("noface: {}", result.issue_id)).await? {
                CommitOutcome::Nothing => {
                    self.repo.remove_workspace(&result.workspace).await;
                    self.complete_issue(state, outcome, &result.issue_id, result.attempt_no).await;
                }
                CommitOutcome::Committed => match self.repo.merge_commit_into_main(&result.workspace).await? {
                    MergeOutcome::Clean => {
                        self.repo.remove_workspace(&result.workspace).await;
                        self.complete_issue(state, outcome, &result.issue_id, result.attempt_no).await;
                    }
                    MergeOutcome::Conflict => {
                        tracing::warn!(issue_id = %result.issue_id, "merge conflict, retaining workspace for inspection");
                        self.record_attempt(
                            state,
                            &result.issue_id,
                            Attempt::new(result.attempt_no, AttemptOutcome::AgentFailure, "merge conflict on merge-back"),
                        );
                        self.mark_failed(state, outcome, &result.issue_id).await;
                    }
                },
            }
        } else if result.exit_code == noface_process::supervisor::EXIT_IDLE_TIMEOUT {
            self.record_attempt(state, &result.issue_id, Attempt::new(result.attempt_no, AttemptOutcome::Timeout, "idle timeout"));
            self.mark_failed(state, outcome, &result.issue_id).await;
            outcome.needs_breakdown.push((result.issue_id.clone(), "idle timeout".to_string()));
        } else if should_retry(result.exit_code) && result.attempt_no + 1 < DEFAULT_RETRY_BUDGET {
            self.record_attempt(
                state,
                &result.issue_id,
                Attempt::new(result.attempt_no, AttemptOutcome::AgentFailure, format!("exit {}", result.exit_code)),
            );
            unassigned.push(result.issue_id.clone());
            if let Some(issue) = state.issues.get_mut(&result.issue_id) {
                issue.status = IssueStatus::Ready;
            }
        } else {
            self.record_attempt(
                state,
                &result.issue_id,
                Attempt::new(result.attempt_no, AttemptOutcome::AgentFailure, format!("exit {}", result.exit_code)),
            );
            self.mark_failed(state, outcome, &result.issue_id).await;
        }
        Ok(())
    }

    fn record_attempt(&self, state: &mut OrchestratorState, issue_id: &IssueId, attempt: Attempt) {
        if let Some(issue) = state.issues.get_mut(issue_id) {
            issue.record_attempt(attempt);
        }
    }

    async fn complete_issue(&self, state: &mut OrchestratorState, outcome: &mut BatchOutcome, issue_id: &IssueId, attempt_no: u32) {
        self.record_attempt(state, issue_id, Attempt::new(attempt_no, AttemptOutcome::Success, "completed"));
        if let Some(issue) = state.issues.get_mut(issue_id) {
            issue.status = IssueStatus::Completed;
        }
        if let Err(err) = self.tracker.close_issue(issue_id.as_str()).await {
            tracing::warn!(%issue_id, %err, "failed to close issue in tracker");
        }
        outcome.completed.push(issue_id.clone());
    }

    async fn mark_failed(&self, state: &mut OrchestratorState, outcome: &mut BatchOutcome, issue_id: &IssueId) {
        if let Some(issue) = state.issues.get_mut(issue_id) {
            issue.status = IssueStatus::Failed;
        }
        if let Err(err) = self.tracker.update_status(issue_id.as_str(), "failed").await {
            tracing::warn!(%issue_id, %err, "failed to update tracker status");
        }
        outcome.failed.push(issue_id.clone());
    }

    /// Single-issue sequential fallback (§4.J): the same spawn/poll/merge
    /// workflow collapsed to one worker, for an issue that has no manifest
    /// (so there is nothing for `LockTable`/`ComplianceChecker` to enforce).
    /// Always uses slot 0; callers only invoke this when no batch is pending,
    /// so no other worker is live.
    pub async fn run_single_issue(&self, state: &mut OrchestratorState, issue_id: &IssueId) -> Result<bool, EngineError> {
        let worker_id = WorkerId(0);
        let attempt_no = state.issues.get(issue_id).map(|i| i.attempt_count() as u32).unwrap_or(0);
        let workspace = self.repo.create_isolated_workspace(worker_id.0).await?;
        // No manifest to enforce on this fallback path, so the baseline is
        // never read back; kept as an empty snapshot for type uniformity
        // with the batch-dispatch `RunningSlot`.
        let baseline = Baseline::default();
        let tracker_issue = self.tracker.show_issue(issue_id.as_str()).await?;
        let prompt = unrestricted_prompt(&tracker_issue.title, &tracker_issue.body);

        let mut slot = self.spawn_slot(issue_id.clone(), &workspace, &prompt, baseline, Manifest::default(), attempt_no)?;

        if let Some(worker) = state.workers.get_mut(worker_id.0) {
            worker.status = WorkerStatus::Running;
            worker.current_issue = Some(issue_id.clone());
            worker.workspace_path = Some(workspace.display().to_string());
        }
        if let Some(issue) = state.issues.get_mut(issue_id) {
            issue.status = IssueStatus::Running;
        }

        let exit_code = loop {
            if self.cancel.is_cancelled() {
                if let Slot::Running(running) = &mut slot {
                    running.supervisor.kill_and_reap().await;
                }
                if let Some(worker) = state.workers.get_mut(worker_id.0) {
                    worker.reset_to_idle();
                }
                return Ok(false);
            }
            let Slot::Running(running) = &mut slot else { unreachable!("slot is always Running here") };
            if let PollOutcome::Line(line) = running.supervisor.poll_lines().await {
                let event = parse_line(&line);
                self.transcript.append(&TranscriptEvent {
                    session_id: running.issue_id.as_str(),
                    seq: 0,
                    event_type: event_type_name(&event),
                    tool_name: tool_name(&event),
                    raw_line: &line,
                });
            }
            if let Some(code) = running.supervisor.try_wait() {
                break code;
            }
            if running.supervisor.idle_seconds() >= self.implementer.agent_timeout.as_secs() {
                running.supervisor.kill_and_reap().await;
                break noface_process::supervisor::EXIT_IDLE_TIMEOUT;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        };

        let Slot::Running(running) = slot else { unreachable!("slot is always Running here") };
        if let Some(worker) = state.workers.get_mut(worker_id.0) {
            worker.reset_to_idle();
        }

        let mut dummy_outcome = BatchOutcome::default();
        if exit_code == 0 {
            match self.repo.stage_and_commit(&running.workspace, &format!("noface: {}", running.issue_id)).await? {
                CommitOutcome::Nothing => {
                    self.repo.remove_workspace(&running.workspace).await;
                    self.complete_issue(state, &mut dummy_outcome, &running.issue_id, running.attempt_no).await;
                    Ok(true)
                }
                CommitOutcome::Committed => match self.repo.merge_commit_into_main(&running.workspace).await? {
                    MergeOutcome::Clean => {
                        self.repo.remove_workspace(&running.workspace).await;
                        self.complete_issue(state, &mut dummy_outcome, &running.issue_id, running.attempt_no).await;
                        Ok(true)
                    }
                    MergeOutcome::Conflict => {
                        self.record_attempt(
                            state,
                            &running.issue_id,
                            Attempt::new(running.attempt_no, AttemptOutcome::AgentFailure, "merge conflict on merge-back"),
                        );
                        self.mark_failed(state, &mut dummy_outcome, &running.issue_id).await;
                        Ok(false)
                    }
                },
            }
        } else {
            let outcome_kind = if exit_code == noface_process::supervisor::EXIT_IDLE_TIMEOUT {
                AttemptOutcome::Timeout
            } else {
                AttemptOutcome::AgentFailure
            };
            self.record_attempt(state, &running.issue_id, Attempt::new(running.attempt_no, outcome_kind, format!("exit {exit_code}")));
            self.mark_failed(state, &mut dummy_outcome, &running.issue_id).await;
            Ok(false)
        }
    }
}

fn dirty_set(paths: Vec<String>) -> std::collections::BTreeSet<String> {
    paths.into_iter().collect()
}

fn event_type_name(event: &noface_process::stream_parser::StreamEvent) -> &'static str {
    use noface_process::stream_parser::StreamEvent::*;
    match event {
        ToolUse { .. } => "tool_use",
        TextDelta { .. } => "text_delta",
        MessageStop => "message_stop",
        Error { .. } => "error",
        Unknown { .. } => "unknown",
    }
}

fn tool_name(event: &noface_process::stream_parser::StreamEvent) -> Option<&str> {
    match event {
        noface_process::stream_parser::StreamEvent::ToolUse { name, .. } => Some(name.as_str()),
        _ => None,
    }
}

/// Recover the path list a rollback recorded in an attempt's notes, to feed
/// back into [`stricter_prompt`] on the retry dispatch.
fn violated_paths_from_notes(notes: &str) -> Vec<String> {
    notes
        .strip_prefix("violated paths: ")
        .map(|rest| rest.split(", ").filter(|s| !s.is_empty()).map(str::to_string).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use noface_core::{Batch, Clock, Issue, SystemClock};
    use noface_tracker::{InMemoryTracker, IssueTracker, TrackerIssue};
    use noface_vcs::GitRepoOps;
    use std::collections::BTreeSet;
    use std::os::unix::fs::PermissionsExt;
    use tokio::process::Command as TokioCommand;

    async fn init_repo(root: &std::path::Path) {
        let run = |args: &'static [&'static str]| {
            let mut cmd = TokioCommand::new("git");
            cmd.current_dir(root).args(args);
            cmd
        };
        run(&["init", "-q"]).status().await.unwrap();
        run(&["config", "user.email", "test@example.com"]).status().await.unwrap();
        run(&["config", "user.name", "test"]).status().await.unwrap();
        tokio::fs::write(root.join("README.md"), "hello\n").await.unwrap();
        run(&["add", "-A"]).status().await.unwrap();
        run(&["commit", "-q", "-m", "init"]).status().await.unwrap();
    }

    /// Writes an executable shell script (ignoring argv) to `dir/name` and
    /// returns its path, the same "fake agent via shell" technique used by
    /// `noface_process::supervisor`'s own unit tests.
    fn write_agent_script(dir: &std::path::Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    fn implementer(script: PathBuf) -> ImplementerConfig {
        ImplementerConfig { command: vec![script.display().to_string()], agent_timeout: Duration::from_secs(5) }
    }

    #[tokio::test]
    async fn single_issue_happy_path_completes_and_merges() {
        let repo_dir = tempfile::tempdir().unwrap();
        init_repo(repo_dir.path()).await;
        let scripts_dir = tempfile::tempdir().unwrap();
        let script = write_agent_script(scripts_dir.path(), "agent.sh", "echo done > output.txt");

        let repo = GitRepoOps::new(repo_dir.path());
        let tracker = InMemoryTracker::new();
        tracker.seed(TrackerIssue {
            id: "iss-1".to_string(),
            title: "add output file".to_string(),
            status: "open".to_string(),
            body: String::new(),
            depends_on: Vec::new(),
        });
        let transcript = TranscriptStore::new(repo_dir.path().join("transcripts.db"));
        let pool = WorkerPool::new(&repo, &tracker, &transcript, SystemClock, CancelToken::new(), implementer(script));

        let mut state = OrchestratorState::fresh(1);
        state.issues.insert(IssueId::new("iss-1"), Issue::new(IssueId::new("iss-1")));

        let completed = pool.run_single_issue(&mut state, &IssueId::new("iss-1")).await.unwrap();
        assert!(completed);
        assert_eq!(state.issues[&IssueId::new("iss-1")].status, IssueStatus::Completed);
        assert_eq!(tracker.show_issue("iss-1").await.unwrap().status, "closed");
        assert!(repo_dir.path().join("output.txt").exists());
    }

    #[tokio::test]
    async fn single_issue_idle_timeout_marks_failed() {
        let repo_dir = tempfile::tempdir().unwrap();
        init_repo(repo_dir.path()).await;
        let scripts_dir = tempfile::tempdir().unwrap();
        let script = write_agent_script(scripts_dir.path(), "agent.sh", "sleep 5");

        let repo = GitRepoOps::new(repo_dir.path());
        let tracker = InMemoryTracker::new();
        tracker.seed(TrackerIssue {
            id: "iss-1".to_string(),
            title: "slow".to_string(),
            status: "open".to_string(),
            body: String::new(),
            depends_on: Vec::new(),
        });
        let transcript = TranscriptStore::new(repo_dir.path().join("transcripts.db"));
        let mut implementer = implementer(script);
        implementer.agent_timeout = Duration::from_millis(200);
        let pool = WorkerPool::new(&repo, &tracker, &transcript, SystemClock, CancelToken::new(), implementer);

        let mut state = OrchestratorState::fresh(1);
        state.issues.insert(IssueId::new("iss-1"), Issue::new(IssueId::new("iss-1")));

        let completed = pool.run_single_issue(&mut state, &IssueId::new("iss-1")).await.unwrap();
        assert!(!completed);
        let issue = &state.issues[&IssueId::new("iss-1")];
        assert_eq!(issue.status, IssueStatus::Failed);
        assert_eq!(issue.latest_attempt().unwrap().outcome, AttemptOutcome::Timeout);
    }

    #[tokio::test]
    async fn batch_dispatch_rolls_back_manifest_violation_and_exhausts_retry_budget() {
        let repo_dir = tempfile::tempdir().unwrap();
        init_repo(repo_dir.path()).await;
        let scripts_dir = tempfile::tempdir().unwrap();
        // Always writes outside its declared primary set.
        let script = write_agent_script(scripts_dir.path(), "agent.sh", "echo bad > forbidden.txt");

        let repo = GitRepoOps::new(repo_dir.path());
        let tracker = InMemoryTracker::new();
        tracker.seed(TrackerIssue {
            id: "iss-1".to_string(),
            title: "touches only allowed.txt".to_string(),
            status: "open".to_string(),
            body: String::new(),
            depends_on: Vec::new(),
        });
        let transcript = TranscriptStore::new(repo_dir.path().join("transcripts.db"));
        let pool = WorkerPool::new(&repo, &tracker, &transcript, SystemClock, CancelToken::new(), implementer(script));

        let manifest = Manifest::new(
            BTreeSet::from(["allowed.txt".to_string()]),
            BTreeSet::new(),
            BTreeSet::new(),
        )
        .unwrap();
        let mut state = OrchestratorState::fresh(1);
        let mut issue = Issue::new(IssueId::new("iss-1"));
        issue.manifest = Some(manifest);
        state.issues.insert(IssueId::new("iss-1"), issue);

        let mut batch = Batch::new(vec![IssueId::new("iss-1")]);
        let outcome = pool.run_batch(&mut state, &mut batch).await.unwrap();

        assert!(outcome.completed.is_empty());
        assert_eq!(outcome.failed, vec![IssueId::new("iss-1")]);
        assert_eq!(outcome.needs_breakdown.len(), 1);
        assert_eq!(outcome.needs_breakdown[0].1, "repeated manifest violations");
        let issue = &state.issues[&IssueId::new("iss-1")];
        assert_eq!(issue.status, IssueStatus::Failed);
        assert!(issue.attempts.iter().all(|a| a.outcome == AttemptOutcome::ManifestViolation));
        assert!(!repo_dir.path().join("forbidden.txt").exists(), "violation must never reach the main repo");
        let last_workspace = repo_dir.path().join(noface_vcs::workspace_dir_name(0));
        assert!(
            !last_workspace.join("forbidden.txt").exists(),
            "violating file must be rolled back inside the worker's own workspace"
        );
        assert!(state.locks.is_empty(), "lock must be released once the issue is done retrying");
    }

    #[test]
    fn dirty_set_dedupes_and_sorts() {
        let set = dirty_set(vec!["b".to_string(), "a".to_string(), "a".to_string()]);
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec!["a".to_string(), "b".to_string()]);
    }
}
