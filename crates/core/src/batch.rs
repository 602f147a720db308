// SPDX-License-Identifier: MIT

//! Batch: a set of issues whose `primary` manifests are write-disjoint (§3).

use crate::issue::IssueId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a batch.
    pub struct BatchId("bch-");
}

/// Lifecycle status of a batch (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    Running,
    Completed,
    Aborted,
}

crate::simple_display! {
    BatchStatus {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Aborted => "aborted",
    }
}

/// A batch: an ordered group of issues safe to run concurrently (§3).
///
/// Batches themselves are totally ordered in [`OrchestratorState`]'s batch
/// list: batch *k* fully quiesces before batch *k+1* begins (§4.H, §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub issue_ids: Vec<IssueId>,
    pub status: BatchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
}

impl Batch {
    pub fn new(issue_ids: Vec<IssueId>) -> Self {
        Self { id: BatchId::new(), issue_ids, status: BatchStatus::Pending, started_at_ms: None, completed_at_ms: None }
    }

    pub fn is_quiesced(&self) -> bool {
        matches!(self.status, BatchStatus::Completed | BatchStatus::Aborted)
    }
}
