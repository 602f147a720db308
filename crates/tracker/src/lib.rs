// SPDX-License-Identifier: MIT

//! noface-tracker: the `IssueTracker` capability (§6) the core depends on —
//! list/show/comment/status operations against an external issue tracker,
//! treated as an opaque subprocess with a JSON stdout contract.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod command;
mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("tracker command failed: {0}")]
    CommandFailed(String),
    #[error("failed to parse tracker output: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("issue not found: {0}")]
    NotFound(String),
}

/// An issue as reported by the tracker (§6 — "list all issues (JSON)").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerIssue {
    pub id: String,
    pub title: String,
    pub status: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// A single comment on an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub body: String,
}

/// Capability boundary between the core and an external issue tracker
/// (§6: "list all issues, list ready issues, show one issue, list one
/// issue's comments, append a comment, update status, close, add
/// dependency"). The specific CLI shape is not part of this crate's
/// contract — only this trait is.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn list_all_issues(&self) -> Result<Vec<TrackerIssue>, TrackerError>;

    /// Issues whose dependencies are all satisfied and whose status is open
    /// (§GLOSSARY "Ready issue"). The tracker computes this predicate, not
    /// the orchestrator — planning always sees a pre-filtered, mutually
    /// unblocked set (§4.F).
    async fn list_ready_issues(&self) -> Result<Vec<TrackerIssue>, TrackerError>;

    async fn show_issue(&self, issue_id: &str) -> Result<TrackerIssue, TrackerError>;

    async fn list_comments(&self, issue_id: &str) -> Result<Vec<Comment>, TrackerError>;

    async fn append_comment(&self, issue_id: &str, body: &str) -> Result<(), TrackerError>;

    async fn update_status(&self, issue_id: &str, status: &str) -> Result<(), TrackerError>;

    async fn close_issue(&self, issue_id: &str) -> Result<(), TrackerError>;

    async fn add_dependency(&self, issue_id: &str, depends_on: &str) -> Result<(), TrackerError>;

    /// Create a sub-issue, used by `Planner::request_breakdown` (SPEC_FULL §4).
    async fn create_issue(&self, title: &str, body: &str) -> Result<TrackerIssue, TrackerError>;
}

/// Lets the engine hold one `&dyn IssueTracker` and share it between the
/// planner and the worker pool without either owning it or needing `Clone`.
#[async_trait]
impl<T: IssueTracker + ?Sized> IssueTracker for &T {
    async fn list_all_issues(&self) -> Result<Vec<TrackerIssue>, TrackerError> {
        (**self).list_all_issues().await
    }

    async fn list_ready_issues(&self) -> Result<Vec<TrackerIssue>, TrackerError> {
        (**self).list_ready_issues().await
    }

    async fn show_issue(&self, issue_id: &str) -> Result<TrackerIssue, TrackerError> {
        (**self).show_issue(issue_id).await
    }

    async fn list_comments(&self, issue_id: &str) -> Result<Vec<Comment>, TrackerError> {
        (**self).list_comments(issue_id).await
    }

    async fn append_comment(&self, issue_id: &str, body: &str) -> Result<(), TrackerError> {
        (**self).append_comment(issue_id, body).await
    }

    async fn update_status(&self, issue_id: &str, status: &str) -> Result<(), TrackerError> {
        (**self).update_status(issue_id, status).await
    }

    async fn close_issue(&self, issue_id: &str) -> Result<(), TrackerError> {
        (**self).close_issue(issue_id).await
    }

    async fn add_dependency(&self, issue_id: &str, depends_on: &str) -> Result<(), TrackerError> {
        (**self).add_dependency(issue_id, depends_on).await
    }

    async fn create_issue(&self, title: &str, body: &str) -> Result<TrackerIssue, TrackerError> {
        (**self).create_issue(title, body).await
    }
}

pub use command::CommandTracker;
pub use memory::InMemoryTracker;
