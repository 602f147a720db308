// SPDX-License-Identifier: MIT

//! Progress log: a human-readable, one-line-per-iteration summary written by
//! `AgentLoop` (§9 design notes). An ignorable-error class per §7 — a write
//! failure here never aborts an iteration.

use std::io::Write;
use std::path::{Path, PathBuf};

pub struct ProgressLog {
    path: PathBuf,
}

impl ProgressLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn record(&self, iteration: u64, summary: &str) {
        if let Err(err) = self.try_record(iteration, summary) {
            tracing::warn!(path = %self.path.display(), %err, "failed to write progress log line");
        }
    }

    fn try_record(&self, iteration: u64, summary: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "iteration {iteration}: {summary}")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_appends_one_line_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let log = ProgressLog::new(dir.path().join("progress.log"));
        log.record(0, "dispatched batch bch-1");
        log.record(1, "backlog empty, stopping");
        let contents = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.contains("backlog empty"));
    }
}
