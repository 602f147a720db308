// SPDX-License-Identifier: MIT

//! noface-process: child-process supervision, streaming-JSON event parsing,
//! and the `BLOCKED_BY_FILE` sentinel scanner (§4.B, §4.C).

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod sentinel;
pub mod stream_parser;
pub mod supervisor;
pub mod timeout_run;

pub use sentinel::SentinelScanner;
pub use stream_parser::{parse_line, StreamEvent};
pub use supervisor::{PollOutcome, ProcessSupervisor, SupervisorError};
pub use timeout_run::{run_with_timeout, RunError};
