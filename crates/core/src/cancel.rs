// SPDX-License-Identifier: MIT

//! Cooperative cancellation token (§5, §9).
//!
//! The spec's source uses process-wide signal state; this implementation
//! moves the interrupt flag into an injected, cloneable token instead, per
//! the redesign note in §9 of the spec ("a systems-language reimplementation
//! should move the interrupt flag into an injected `CancelToken`").

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cheaply cloneable, shared cancellation flag.
///
/// Checked at the top of every dispatch-loop iteration and before every
/// long-running operation (§5). Setting it never blocks or panics.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self { cancelled: Arc::new(AtomicBool::new(false)) }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uncancelled_and_is_observed_after_cancel() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
