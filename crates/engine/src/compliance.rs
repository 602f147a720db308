// SPDX-License-Identifier: MIT

//! `ComplianceChecker` (§4.I): computes the agent-attributable diff and
//! classifies it against an issue's manifest.

use noface_core::{Attempt, AttemptOutcome, Baseline, Manifest, PathVerdict};
use noface_vcs::{DirtyPaths, RepoOps};
use std::collections::BTreeSet;

/// Outcome of checking one completed worker's result against its manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplianceVerdict {
    /// Paths attributable to this agent run (current dirty ∖ baseline ∖
    /// other-issues'-primary), per §4.I / property 3.
    pub attributable: BTreeSet<String>,
    /// Subset of `attributable` that violated the manifest.
    pub violations: BTreeSet<String>,
}

impl ComplianceVerdict {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Compute the agent-attributable diff (§4.I, property 3): the currently
/// dirty set, minus the baseline captured before the worker started, minus
/// any path owned by some *other* currently-tracked issue's `primary` set.
pub fn attributable_paths(
    current_dirty: &DirtyPaths,
    baseline: &Baseline,
    other_primaries: &[&BTreeSet<String>],
) -> BTreeSet<String> {
    current_dirty
        .all()
        .into_iter()
        .filter(|path| !baseline.contains(path))
        .filter(|path| !other_primaries.iter().any(|primary| primary.contains(path)))
        .collect()
}

/// Classify the attributable diff against `manifest` (§4.I): any path not
/// `Ok` (forbidden or not-primary) is a violation.
pub fn check_compliance(attributable: BTreeSet<String>, manifest: &Manifest) -> ComplianceVerdict {
    let violations = attributable.iter().filter(|path| manifest.classify(path).is_violation()).cloned().collect();
    ComplianceVerdict { attributable, violations }
}

/// Roll back every violating path, scoped to `workspace`, via
/// `RepoOps.rollback_file` (§4.I) and record the attempt. Non-violating
/// attributable paths are left as-is — only offending files are reverted.
pub async fn rollback_violations(
    repo: &dyn RepoOps,
    workspace: &noface_vcs::WorkspacePath,
    verdict: &ComplianceVerdict,
    attempt_no: u32,
) -> Attempt {
    for path in &verdict.violations {
        if let Err(err) = repo.rollback_file(workspace, path).await {
            tracing::warn!(%path, %err, "failed to roll back manifest-violating file");
        }
    }
    Attempt::new(
        attempt_no,
        AttemptOutcome::ManifestViolation,
        format!("violated paths: {}", verdict.violations.iter().cloned().collect::<Vec<_>>().join(", ")),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn dirty(paths: &[&str]) -> DirtyPaths {
        let mut d = DirtyPaths::default();
        for p in paths {
            d.modified.insert(p.to_string());
        }
        d
    }

    fn set(paths: &[&str]) -> BTreeSet<String> {
        paths.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn attributable_excludes_baseline_and_neighbor_primary() {
        // Property 3 (§8).
        let current = dirty(&["src/a", "src/b", "src/neighbor"]);
        let baseline = Baseline::new(set(&["src/b"]));
        let neighbor_primary = set(&["src/neighbor"]);
        let attributable = attributable_paths(&current, &baseline, &[&neighbor_primary]);
        assert_eq!(attributable, set(&["src/a"]));
    }

    #[test]
    fn compliant_run_has_no_violations() {
        let manifest = Manifest::new(set(&["src/a"]), BTreeSet::new(), BTreeSet::new()).unwrap();
        let verdict = check_compliance(set(&["src/a"]), &manifest);
        assert!(verdict.is_clean());
    }

    #[test]
    fn forbidden_and_non_primary_paths_are_both_violations() {
        // S2 scenario shape (§8).
        let manifest = Manifest::new(set(&["src/a"]), BTreeSet::new(), set(&["src/main"])).unwrap();
        let verdict = check_compliance(set(&["src/a", "src/main"]), &manifest);
        assert!(!verdict.is_clean());
        assert_eq!(verdict.violations, set(&["src/main"]));
    }
}
