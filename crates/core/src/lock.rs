// SPDX-License-Identifier: MIT

//! Global exclusive-write lock map over `primary` manifest paths (§3, §4.D).
//!
//! `LockTable` is the sole in-process guard against two workers writing the
//! same file concurrently. It is consulted before a worker is dispatched and
//! released when the worker's result is processed.

use crate::issue::IssueId;
use crate::manifest::{FilePath, Manifest};
use crate::worker::WorkerId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One lock entry: who holds the write lock on a path, and since when.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockEntry {
    pub issue_id: IssueId,
    pub worker_id: WorkerId,
    pub acquired_at_ms: u64,
}

/// Result of a [`LockTable::try_acquire`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireResult {
    Acquired,
    /// A path in the requested manifest is already held by a different issue.
    Conflict { file: FilePath, holder_issue: IssueId },
}

/// `FilePath -> LockEntry`. Invariants (§3): at most one entry per path; a
/// locked path is always in the holding issue's `primary` set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LockTable {
    locks: BTreeMap<FilePath, LockEntry>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn holder(&self, path: &str) -> Option<&LockEntry> {
        self.locks.get(path)
    }

    pub fn is_locked(&self, path: &str) -> bool {
        self.locks.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FilePath, &LockEntry)> {
        self.locks.iter()
    }

    /// Atomically attempt to lock every path in `manifest.primary` for
    /// `issue`/`worker`. All-or-nothing: if any path is already held by a
    /// *different* issue, nothing is acquired.
    pub fn try_acquire(
        &mut self,
        issue_id: &IssueId,
        manifest: &Manifest,
        worker_id: WorkerId,
        now_ms: u64,
    ) -> AcquireResult {
        for path in &manifest.primary {
            if let Some(entry) = self.locks.get(path) {
                if &entry.issue_id != issue_id {
                    return AcquireResult::Conflict {
                        file: path.clone(),
                        holder_issue: entry.issue_id.clone(),
                    };
                }
            }
        }

        for path in &manifest.primary {
            self.locks.insert(
                path.clone(),
                LockEntry { issue_id: issue_id.clone(), worker_id, acquired_at_ms: now_ms },
            );
        }
        AcquireResult::Acquired
    }

    /// Release every path held by `issue`.
    pub fn release(&mut self, issue_id: &IssueId) {
        self.locks.retain(|_, entry| &entry.issue_id != issue_id);
    }

    /// Release every lock whose holding worker is not in `live_workers`
    /// (crash recovery, §4.E: "any lock whose holder is no longer a live worker").
    pub fn release_orphaned(&mut self, live_workers: &[WorkerId]) {
        self.locks.retain(|_, entry| live_workers.contains(&entry.worker_id));
    }
}
