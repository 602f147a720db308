// SPDX-License-Identifier: MIT

//! Manifest: the per-issue file-access policy that makes parallel dispatch safe.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A repository-relative file path, as declared in a manifest.
///
/// Plain `String` rather than `PathBuf`: manifests are written and compared
/// as opaque strings from the reviewer agent's output, never walked or
/// joined against a filesystem root inside this crate.
pub type FilePath = String;

/// Errors constructing a [`Manifest`] that would violate its own invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManifestError {
    #[error("manifest has no primary (writable) files")]
    EmptyPrimary,
    #[error("path {0:?} is listed as both primary and forbidden")]
    PrimaryForbiddenOverlap(FilePath),
}

/// Per-issue declaration of which files an agent may read, write, or must
/// never touch (§3, §4.D).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Files the agent is allowed to write. Locked exclusively during dispatch.
    pub primary: BTreeSet<FilePath>,
    /// Files the agent is allowed to read but never write.
    #[serde(default)]
    pub read: BTreeSet<FilePath>,
    /// Files the agent must never touch, read or write.
    #[serde(default)]
    pub forbidden: BTreeSet<FilePath>,
}

impl Manifest {
    /// Build a manifest, rejecting the invariant violations named in §3:
    /// `primary` must be non-empty (a manifest without primary is rejected
    /// by the planner, §4.F) and `primary ∩ forbidden = ∅`.
    pub fn new(
        primary: BTreeSet<FilePath>,
        read: BTreeSet<FilePath>,
        forbidden: BTreeSet<FilePath>,
    ) -> Result<Self, ManifestError> {
        if primary.is_empty() {
            return Err(ManifestError::EmptyPrimary);
        }
        if let Some(overlap) = primary.intersection(&forbidden).next() {
            return Err(ManifestError::PrimaryForbiddenOverlap(overlap.clone()));
        }
        Ok(Self { primary, read, forbidden })
    }

    /// Writes are permitted iff the path is declared `primary`.
    pub fn allows_write(&self, path: &str) -> bool {
        self.primary.contains(path)
    }

    /// Reads are permitted to `primary ∪ read`.
    pub fn allows_read(&self, path: &str) -> bool {
        self.primary.contains(path) || self.read.contains(path)
    }

    /// `forbidden` is an explicit deny, independent of read/write permission.
    pub fn is_forbidden(&self, path: &str) -> bool {
        self.forbidden.contains(path)
    }

    /// Two manifests' write sets are disjoint — the batch-safety condition (§3, §4.G).
    pub fn write_disjoint(&self, other: &Manifest) -> bool {
        self.primary.is_disjoint(&other.primary)
    }

    /// Classify a touched path against this manifest (§4.I): forbidden and
    /// not-primary are both violations; anything in `primary` is ok.
    pub fn classify(&self, path: &str) -> PathVerdict {
        if self.is_forbidden(path) {
            PathVerdict::Forbidden
        } else if self.allows_write(path) {
            PathVerdict::Ok
        } else {
            PathVerdict::NotPrimary
        }
    }
}

/// Verdict for one agent-touched path, classified against an issue's manifest (§4.I).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathVerdict {
    Ok,
    Forbidden,
    NotPrimary,
}

impl PathVerdict {
    pub fn is_violation(self) -> bool {
        !matches!(self, PathVerdict::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<FilePath> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn rejects_empty_primary() {
        let result = Manifest::new(set(&[]), set(&[]), set(&[]));
        assert_eq!(result.unwrap_err(), ManifestError::EmptyPrimary);
    }

    #[test]
    fn rejects_primary_forbidden_overlap() {
        let result = Manifest::new(set(&["src/a"]), set(&[]), set(&["src/a"]));
        assert!(matches!(result, Err(ManifestError::PrimaryForbiddenOverlap(_))));
    }

    #[test]
    fn write_and_read_and_forbidden_semantics() {
        let m = Manifest::new(set(&["src/a"]), set(&["src/b"]), set(&["src/c"])).unwrap();
        assert!(m.allows_write("src/a"));
        assert!(!m.allows_write("src/b"));
        assert!(m.allows_read("src/a"));
        assert!(m.allows_read("src/b"));
        assert!(!m.allows_read("src/c"));
        assert!(m.is_forbidden("src/c"));
        assert!(!m.is_forbidden("src/a"));
    }

    #[test]
    fn classify_matches_ok_forbidden_not_primary() {
        let m = Manifest::new(set(&["src/a"]), set(&["src/b"]), set(&["src/c"])).unwrap();
        assert_eq!(m.classify("src/a"), PathVerdict::Ok);
        assert_eq!(m.classify("src/c"), PathVerdict::Forbidden);
        assert_eq!(m.classify("src/elsewhere"), PathVerdict::NotPrimary);
        assert!(m.classify("src/c").is_violation());
        assert!(!m.classify("src/a").is_violation());
    }

    #[test]
    fn disjoint_primaries_are_batch_safe() {
        let a = Manifest::new(set(&["src/x"]), set(&[]), set(&[])).unwrap();
        let b = Manifest::new(set(&["src/y"]), set(&[]), set(&[])).unwrap();
        let c = Manifest::new(set(&["src/x"]), set(&[]), set(&[])).unwrap();
        assert!(a.write_disjoint(&b));
        assert!(!a.write_disjoint(&c));
    }
}
