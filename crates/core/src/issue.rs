// SPDX-License-Identifier: MIT

//! Issue identifier, status, and the durable per-issue record.

use crate::attempt::Attempt;
use crate::manifest::Manifest;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Identifier for an issue in the external tracker.
///
/// Unlike most IDs in this crate, issue IDs are assigned by the tracker
/// subprocess, not generated here, so this is a plain string newtype rather
/// than a `define_id!` buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IssueId(pub String);

impl IssueId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for IssueId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for IssueId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for IssueId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Lifecycle status of an issue (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Open,
    Ready,
    Running,
    Completed,
    Failed,
    Blocked,
}

crate::simple_display! {
    IssueStatus {
        Open => "open",
        Ready => "ready",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Blocked => "blocked",
    }
}

/// Durable record for one issue: status, manifest (once planned), attempt history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: IssueId,
    pub status: IssueStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<Manifest>,
    #[serde(default)]
    pub attempts: Vec<Attempt>,
}

impl Issue {
    pub fn new(id: IssueId) -> Self {
        Self { id, status: IssueStatus::Open, manifest: None, attempts: Vec::new() }
    }

    /// An issue is dispatchable in a parallel batch only once it has a manifest.
    ///
    /// An issue without one is "legacy/unrestricted" per §3 and must be run
    /// alone (the sequential fallback path), never alongside other issues.
    pub fn has_manifest(&self) -> bool {
        self.manifest.is_some()
    }

    pub fn latest_attempt(&self) -> Option<&Attempt> {
        self.attempts.last()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }

    pub fn record_attempt(&mut self, attempt: Attempt) {
        self.attempts.push(attempt);
    }
}
