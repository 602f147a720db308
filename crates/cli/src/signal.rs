// SPDX-License-Identifier: MIT

//! Cooperative shutdown: install `SIGINT`/`SIGTERM` listeners and flip a
//! `CancelToken` (§5 — checked at the top of every dispatch loop iteration).

use noface_core::CancelToken;
use tokio::signal::unix::{signal, SignalKind};

/// Spawns a background task that cancels `cancel` on the first `SIGINT` or
/// `SIGTERM`. A failure to install either handler is logged and otherwise
/// ignored — the run proceeds without cooperative shutdown support.
pub fn install(cancel: CancelToken) {
    tokio::spawn(async move {
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(%e, "failed to install SIGTERM handler");
                return;
            }
        };
        let mut sigint = match signal(SignalKind::interrupt()) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(%e, "failed to install SIGINT handler");
                return;
            }
        };
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
            _ = sigint.recv() => tracing::info!("received SIGINT, shutting down"),
        }
        cancel.cancel();
    });
}
