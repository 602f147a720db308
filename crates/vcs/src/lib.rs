// SPDX-License-Identifier: MIT

//! noface-vcs: the `RepoOps` capability (§4.A) — a VCS abstraction the core
//! consumes for workspace isolation and per-worker diffing.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod git;

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::PathBuf;
use thiserror::Error;

/// A repository-relative file path.
pub type FilePath = String;

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("not a repository: {0}")]
    VcsUnavailable(String),
    #[error("git command failed: {0}")]
    CommandFailed(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The three-way classification of dirty paths returned by `list_dirty`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtyPaths {
    pub modified: BTreeSet<FilePath>,
    pub staged_or_added: BTreeSet<FilePath>,
    pub untracked: BTreeSet<FilePath>,
}

impl DirtyPaths {
    /// Flatten into a single set — what `ComplianceChecker` treats as "currently dirty" (§4.I).
    pub fn all(&self) -> BTreeSet<FilePath> {
        self.modified.iter().chain(&self.staged_or_added).chain(&self.untracked).cloned().collect()
    }
}

/// Outcome of [`RepoOps::stage_and_commit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    Nothing,
}

/// Outcome of [`RepoOps::merge_commit_into_main`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Clean,
    Conflict,
}

/// A path to an isolated per-worker workspace (e.g. a git worktree).
pub type WorkspacePath = PathBuf;

/// VCS abstraction the orchestrator core consumes (§4.A). Implementations
/// are expected to wrap a DVCS with worktree support; a workspace-per-worker
/// model (e.g. Jujutsu-style workspaces) is equally acceptable.
#[async_trait]
pub trait RepoOps: Send + Sync {
    /// List dirty paths relative to the repository root.
    async fn list_dirty(&self) -> Result<DirtyPaths, VcsError>;

    /// Produce (or, if it already exists, reset-and-reuse) a detached
    /// checkout of head for `worker_id`. Idempotent for crash recovery.
    async fn create_isolated_workspace(&self, worker_id: usize) -> Result<WorkspacePath, VcsError>;

    /// Best-effort teardown of a workspace and any VCS metadata for it.
    async fn remove_workspace(&self, path: &WorkspacePath);

    /// Enumerate non-default workspaces, for orphan cleanup on startup.
    async fn list_workspaces(&self) -> Result<Vec<WorkspacePath>, VcsError>;

    /// Files changed in `path`'s workspace relative to its parent.
    async fn workspace_diff(&self, path: &WorkspacePath) -> Result<Vec<FilePath>, VcsError>;

    /// Commit all changes in `path`'s workspace with `message`.
    async fn stage_and_commit(
        &self,
        path: &WorkspacePath,
        message: &str,
    ) -> Result<CommitOutcome, VcsError>;

    /// Replay `path`'s workspace head commit into the main working copy
    /// without committing. On conflict, aborts cleanly and leaves main
    /// untouched.
    async fn merge_commit_into_main(&self, path: &WorkspacePath) -> Result<MergeOutcome, VcsError>;

    /// Unstage, restore from head, and remove-if-untracked — regardless of
    /// whether `path` was tracked, staged, or new. Scoped to `workspace`: a
    /// manifest violation is rolled back before anything has merged into
    /// the main working copy, so there is nothing to restore there yet.
    async fn rollback_file(&self, workspace: &WorkspacePath, path: &str) -> Result<(), VcsError>;
}

pub use git::GitRepoOps;

/// The contractual prefix for per-worker workspace directories (§6).
/// Orphan cleanup on startup looks for exactly this prefix.
pub const WORKSPACE_DIR_PREFIX: &str = ".noface-worker-";

pub fn workspace_dir_name(worker_id: usize) -> String {
    format!("{WORKSPACE_DIR_PREFIX}{worker_id}")
}
