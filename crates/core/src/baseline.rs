// SPDX-License-Identifier: MIT

//! Baseline: the pre-existing dirty/untracked file set captured at worker
//! start, used to exclude pre-existing noise from the agent-attributable
//! diff (§3, §4.I).

use crate::manifest::FilePath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Snapshot of files that were already dirty or untracked immediately before
/// a worker started on an issue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Baseline {
    pub paths: BTreeSet<FilePath>,
}

impl Baseline {
    pub fn new(paths: BTreeSet<FilePath>) -> Self {
        Self { paths }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }
}
