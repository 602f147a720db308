// SPDX-License-Identifier: MIT

//! noface-storage: `OrchestratorState` persistence and crash recovery, the
//! transcript store, and the progress log (§4.E, §6).

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod progress;
pub mod state;
pub mod transcript;

pub use progress::ProgressLog;
pub use state::{OrchestratorState, StorageError};
pub use transcript::{TranscriptEvent, TranscriptStore};

/// Default on-disk layout under a project root, per §6.
pub mod paths {
    use std::path::{Path, PathBuf};

    pub fn dot_noface(project_root: &Path) -> PathBuf {
        project_root.join(".noface")
    }

    pub fn state_json(project_root: &Path) -> PathBuf {
        dot_noface(project_root).join("state.json")
    }

    pub fn transcripts_db(project_root: &Path) -> PathBuf {
        dot_noface(project_root).join("transcripts.db")
    }

    pub fn progress_log(project_root: &Path) -> PathBuf {
        dot_noface(project_root).join("progress.log")
    }

    pub fn codex_approved(project_root: &Path) -> PathBuf {
        dot_noface(project_root).join("codex-approved")
    }
}
