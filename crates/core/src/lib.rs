// SPDX-License-Identifier: MIT

//! noface-core: durable data model and shared capability primitives for the
//! autonomous coding-agent orchestrator.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod macros;

pub mod attempt;
pub mod baseline;
pub mod batch;
pub mod cancel;
pub mod clock;
pub mod id;
pub mod issue;
pub mod lock;
pub mod manifest;
pub mod retry;
pub mod worker;

pub use attempt::{Attempt, AttemptOutcome};
pub use baseline::Baseline;
pub use batch::{Batch, BatchId, BatchStatus};
pub use cancel::CancelToken;
pub use clock::{Clock, FakeClock, SystemClock};
pub use issue::{Issue, IssueId, IssueStatus};
pub use lock::{AcquireResult, LockEntry, LockTable};
pub use manifest::{FilePath, Manifest, ManifestError, PathVerdict};
pub use worker::{Worker, WorkerId, WorkerStatus};
