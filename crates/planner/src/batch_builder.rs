// SPDX-License-Identifier: MIT

//! `BatchBuilder` (§4.G): greedy, deterministic grouping of ready,
//! manifest-annotated issues into write-disjoint batches.

use noface_core::{Batch, IssueId, Manifest};

/// A ready issue the planner has produced a manifest for.
#[derive(Debug, Clone)]
pub struct PlannedIssue {
    pub issue_id: IssueId,
    pub manifest: Manifest,
}

/// Build an ordered sequence of batches such that no two issues in the same
/// batch have overlapping `primary` sets (§4.G).
///
/// Deterministic: issues are considered in ascending `issue_id` order, so
/// the same input always produces the same batch assignment regardless of
/// iteration-order noise upstream.
pub fn build_batches(mut planned: Vec<PlannedIssue>) -> Vec<Batch> {
    planned.sort_by(|a, b| a.issue_id.as_str().cmp(b.issue_id.as_str()));

    let mut unassigned: Vec<PlannedIssue> = planned;
    let mut batches = Vec::new();

    while !unassigned.is_empty() {
        let mut current_ids = Vec::new();
        let mut current_manifests: Vec<Manifest> = Vec::new();
        let mut remaining = Vec::new();

        for planned_issue in unassigned {
            let disjoint = current_manifests.iter().all(|m| m.write_disjoint(&planned_issue.manifest));
            if disjoint {
                current_ids.push(planned_issue.issue_id.clone());
                current_manifests.push(planned_issue.manifest);
            } else {
                remaining.push(planned_issue);
            }
        }

        batches.push(Batch::new(current_ids));
        unassigned = remaining;
    }

    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn manifest(paths: &[&str]) -> Manifest {
        let primary: BTreeSet<String> = paths.iter().map(|s| s.to_string()).collect();
        Manifest::new(primary, BTreeSet::new(), BTreeSet::new()).unwrap()
    }

    fn planned(id: &str, paths: &[&str]) -> PlannedIssue {
        PlannedIssue { issue_id: IssueId::new(id), manifest: manifest(paths) }
    }

    #[test]
    fn disjoint_issues_share_one_batch() {
        let batches = build_batches(vec![planned("a", &["x"]), planned("b", &["y"])]);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].issue_ids.len(), 2);
    }

    #[test]
    fn conflicting_issues_split_across_batches() {
        let batches = build_batches(vec![planned("a", &["x"]), planned("b", &["x"])]);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].issue_ids, vec![IssueId::new("a")]);
        assert_eq!(batches[1].issue_ids, vec![IssueId::new("b")]);
    }

    #[test]
    fn assignment_is_deterministic_regardless_of_input_order() {
        let forward = build_batches(vec![planned("a", &["x"]), planned("b", &["x"]), planned("c", &["y"])]);
        let shuffled = build_batches(vec![planned("c", &["y"]), planned("b", &["x"]), planned("a", &["x"])]);
        let forward_ids: Vec<Vec<IssueId>> = forward.iter().map(|b| b.issue_ids.clone()).collect();
        let shuffled_ids: Vec<Vec<IssueId>> = shuffled.iter().map(|b| b.issue_ids.clone()).collect();
        assert_eq!(forward_ids, shuffled_ids);
    }

    #[test]
    fn no_two_issues_in_a_batch_share_a_primary_path() {
        // Property 2 (§8): batch write-disjointness.
        let batches = build_batches(vec![
            planned("a", &["x"]),
            planned("b", &["y"]),
            planned("c", &["x", "z"]),
        ]);
        for batch in &batches {
            assert!(batch.issue_ids.len() <= 2);
        }
        assert_eq!(batches.len(), 2);
    }
}
