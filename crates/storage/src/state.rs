// SPDX-License-Identifier: MIT

//! `OrchestratorState`: the single durable document (§4.E) — issues,
//! workers, batches, the lock table — plus its crash-recovery pass.

use noface_core::{Batch, BatchStatus, Issue, IssueId, IssueStatus, LockTable, Worker, WorkerId, WorkerStatus};
use noface_vcs::RepoOps;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error at {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
    #[error("failed to parse state document: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// The full persisted document (§4.E). Everything here round-trips through
/// a single JSON file; derived/in-memory-only caches live outside this type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorState {
    pub issues: BTreeMap<IssueId, Issue>,
    pub workers: Vec<Worker>,
    pub batches: Vec<Batch>,
    pub locks: LockTable,
}

impl OrchestratorState {
    pub fn fresh(num_workers: usize) -> Self {
        Self {
            issues: BTreeMap::new(),
            workers: (0..num_workers).map(|i| Worker::idle(WorkerId(i))).collect(),
            batches: Vec::new(),
            locks: LockTable::new(),
        }
    }

    /// Load from `path`, tolerating a missing or empty file as fresh state
    /// (§4.E). A present-but-corrupt file is a hard error: we never want to
    /// silently discard a document a human might need to recover.
    pub fn load(path: &Path, num_workers: usize) -> Result<Self, StorageError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::fresh(num_workers));
            }
            Err(source) => return Err(StorageError::Io { path: path.to_path_buf(), source }),
        };
        if bytes.is_empty() {
            return Ok(Self::fresh(num_workers));
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Write-temp + rename (§4.E). The rename is atomic on the same
    /// filesystem, so a crash mid-write never corrupts the previous document.
    pub fn save(&self, path: &Path) -> Result<(), StorageError> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).map_err(|source| StorageError::Io { path: parent.to_path_buf(), source })?;
        let tmp_path = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(self)?;
        {
            use std::io::Write;
            let mut file = std::fs::File::create(&tmp_path)
                .map_err(|source| StorageError::Io { path: tmp_path.clone(), source })?;
            file.write_all(&bytes).map_err(|source| StorageError::Io { path: tmp_path.clone(), source })?;
            file.sync_all().map_err(|source| StorageError::Io { path: tmp_path.clone(), source })?;
        }
        std::fs::rename(&tmp_path, path).map_err(|source| StorageError::Io { path: path.to_path_buf(), source })?;
        Ok(())
    }

    /// Crash-recovery pass (§4.E, S6): any worker left `Running`/`Waiting`
    /// resets to `Idle` and reopens its issue to `Ready`; any `Running`
    /// batch resets to `Pending`; any lock held by a no-longer-live worker
    /// is released; orphan workspaces on disk are torn down.
    pub async fn recover(&mut self, repo: &dyn RepoOps) {
        for worker in &mut self.workers {
            if worker.is_live() {
                if let Some(issue_id) = worker.current_issue.take() {
                    if let Some(issue) = self.issues.get_mut(&issue_id) {
                        issue.status = IssueStatus::Ready;
                    }
                }
                worker.reset_to_idle();
            }
        }

        for batch in &mut self.batches {
            if matches!(batch.status, BatchStatus::Running) {
                batch.status = BatchStatus::Pending;
            }
        }

        // After the reset above no worker is left Running/Waiting in a
        // freshly-restarted process, so every remaining lock is orphaned.
        let live_workers: Vec<WorkerId> =
            self.workers.iter().filter(|w| w.is_live()).map(|w| w.worker_id).collect();
        self.locks.release_orphaned(&live_workers);

        match repo.list_workspaces().await {
            Ok(workspaces) => {
                for workspace in workspaces {
                    tracing::info!(path = %workspace.display(), "pruning orphan workspace on startup");
                    repo.remove_workspace(&workspace).await;
                }
            }
            Err(err) => {
                tracing::warn!(%err, "could not enumerate workspaces for orphan cleanup");
            }
        }
    }
}
