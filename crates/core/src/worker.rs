// SPDX-License-Identifier: MIT

//! Worker slot identifier and status.

use crate::issue::IssueId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A worker slot index in `[0, N)`, N being `num_workers` (§3, capped at 8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerId(pub usize);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Runtime status of a worker slot (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Idle,
    Running,
    Waiting,
    Completed,
    Failed,
    Timeout,
}

crate::simple_display! {
    WorkerStatus {
        Idle => "idle",
        Running => "running",
        Waiting => "waiting",
        Completed => "completed",
        Failed => "failed",
        Timeout => "timeout",
    }
}

/// Durable record of one worker slot's current assignment (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub worker_id: WorkerId,
    pub status: WorkerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_issue: Option<IssueId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_on_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_path: Option<String>,
}

impl Worker {
    pub fn idle(worker_id: WorkerId) -> Self {
        Self {
            worker_id,
            status: WorkerStatus::Idle,
            current_issue: None,
            pid: None,
            started_at_ms: None,
            blocked_on_file: None,
            workspace_path: None,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self.status, WorkerStatus::Running | WorkerStatus::Waiting)
    }

    /// Reset this slot to `Idle`, clearing assignment — used both for normal
    /// completion and for crash recovery (§4.E).
    pub fn reset_to_idle(&mut self) {
        self.status = WorkerStatus::Idle;
        self.current_issue = None;
        self.pid = None;
        self.started_at_ms = None;
        self.blocked_on_file = None;
        self.workspace_path = None;
    }
}
