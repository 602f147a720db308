// SPDX-License-Identifier: MIT

//! Attempt record: one completed agent invocation on an issue.

use serde::{Deserialize, Serialize};

/// Outcome of a single agent attempt on an issue (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    AgentFailure,
    ManifestViolation,
    Timeout,
}

crate::simple_display! {
    AttemptOutcome {
        Success => "success",
        AgentFailure => "agent_failure",
        ManifestViolation => "manifest_violation",
        Timeout => "timeout",
    }
}

/// An append-only record of one agent invocation (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub attempt_no: u32,
    pub outcome: AttemptOutcome,
    pub notes: String,
}

impl Attempt {
    pub fn new(attempt_no: u32, outcome: AttemptOutcome, notes: impl Into<String>) -> Self {
        Self { attempt_no, outcome, notes: notes.into() }
    }
}
