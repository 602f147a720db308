// SPDX-License-Identifier: MIT

//! In-memory `IssueTracker` fake for tests that don't need a real subprocess.

use crate::{Comment, IssueTracker, TrackerError, TrackerIssue};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;

struct Entry {
    issue: TrackerIssue,
    comments: Vec<Comment>,
}

#[derive(Default)]
pub struct InMemoryTracker {
    entries: Mutex<BTreeMap<String, Entry>>,
    next_id: Mutex<u64>,
}

impl InMemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an issue directly, bypassing `create_issue`'s id generation.
    pub fn seed(&self, issue: TrackerIssue) {
        self.entries.lock().insert(issue.id.clone(), Entry { issue, comments: Vec::new() });
    }

    fn is_ready(entries: &BTreeMap<String, Entry>, issue: &TrackerIssue) -> bool {
        issue.status == "open"
            && issue.depends_on.iter().all(|dep| {
                entries.get(dep).map(|e| e.issue.status == "closed").unwrap_or(false)
            })
    }
}

#[async_trait]
impl IssueTracker for InMemoryTracker {
    async fn list_all_issues(&self) -> Result<Vec<TrackerIssue>, TrackerError> {
        Ok(self.entries.lock().values().map(|e| e.issue.clone()).collect())
    }

    async fn list_ready_issues(&self) -> Result<Vec<TrackerIssue>, TrackerError> {
        let entries = self.entries.lock();
        Ok(entries
            .values()
            .filter(|e| Self::is_ready(&entries, &e.issue))
            .map(|e| e.issue.clone())
            .collect())
    }

    async fn show_issue(&self, issue_id: &str) -> Result<TrackerIssue, TrackerError> {
        self.entries
            .lock()
            .get(issue_id)
            .map(|e| e.issue.clone())
            .ok_or_else(|| TrackerError::NotFound(issue_id.to_string()))
    }

    async fn list_comments(&self, issue_id: &str) -> Result<Vec<Comment>, TrackerError> {
        self.entries
            .lock()
            .get(issue_id)
            .map(|e| e.comments.clone())
            .ok_or_else(|| TrackerError::NotFound(issue_id.to_string()))
    }

    async fn append_comment(&self, issue_id: &str, body: &str) -> Result<(), TrackerError> {
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(issue_id).ok_or_else(|| TrackerError::NotFound(issue_id.to_string()))?;
        entry.comments.push(Comment { author: "agent".to_string(), body: body.to_string() });
        Ok(())
    }

    async fn update_status(&self, issue_id: &str, status: &str) -> Result<(), TrackerError> {
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(issue_id).ok_or_else(|| TrackerError::NotFound(issue_id.to_string()))?;
        entry.issue.status = status.to_string();
        Ok(())
    }

    async fn close_issue(&self, issue_id: &str) -> Result<(), TrackerError> {
        self.update_status(issue_id, "closed").await
    }

    async fn add_dependency(&self, issue_id: &str, depends_on: &str) -> Result<(), TrackerError> {
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(issue_id).ok_or_else(|| TrackerError::NotFound(issue_id.to_string()))?;
        entry.issue.depends_on.push(depends_on.to_string());
        Ok(())
    }

    async fn create_issue(&self, title: &str, body: &str) -> Result<TrackerIssue, TrackerError> {
        let mut next_id = self.next_id.lock();
        *next_id += 1;
        let issue = TrackerIssue {
            id: format!("issue-{next_id}"),
            title: title.to_string(),
            status: "open".to_string(),
            body: body.to_string(),
            depends_on: Vec::new(),
        };
        drop(next_id);
        self.entries.lock().insert(issue.id.clone(), Entry { issue: issue.clone(), comments: Vec::new() });
        Ok(issue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(id: &str, status: &str, depends_on: &[&str]) -> TrackerIssue {
        TrackerIssue {
            id: id.to_string(),
            title: id.to_string(),
            status: status.to_string(),
            body: String::new(),
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn ready_issues_exclude_those_blocked_by_open_dependencies() {
        let tracker = InMemoryTracker::new();
        tracker.seed(issue("a", "open", &[]));
        tracker.seed(issue("b", "open", &["a"]));
        let ready = tracker.list_ready_issues().await.unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].id, "a");

        tracker.close_issue("a").await.unwrap();
        let ready = tracker.list_ready_issues().await.unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].id, "b");
    }

    #[tokio::test]
    async fn create_issue_assigns_unique_ids() {
        let tracker = InMemoryTracker::new();
        let a = tracker.create_issue("first", "").await.unwrap();
        let b = tracker.create_issue("second", "").await.unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn comments_accumulate_in_append_order() {
        let tracker = InMemoryTracker::new();
        tracker.seed(issue("a", "open", &[]));
        tracker.append_comment("a", "first").await.unwrap();
        tracker.append_comment("a", "second").await.unwrap();
        let comments = tracker.list_comments("a").await.unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].body, "first");
        assert_eq!(comments[1].body, "second");
    }
}
