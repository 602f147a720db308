// SPDX-License-Identifier: MIT

//! Transcript store: `.noface/transcripts.db`, an append-only NDJSON log of
//! parsed agent events, rotated and zstd-compressed once a segment grows
//! past a size threshold (§6, grounded in the teacher's snapshot `.bak`
//! rotation idiom — here applied to log segments instead of state backups).
//!
//! Missing or unwritable ⇒ logging degrades silently (§6): every method
//! here swallows its own I/O errors after logging a warning, rather than
//! propagating a failure that would abort dispatch over a non-essential log.

use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Segments larger than this are rotated out and zstd-compressed.
const ROTATE_THRESHOLD_BYTES: u64 = 8 * 1024 * 1024;
const MAX_ROTATED_SEGMENTS: u32 = 5;

/// One event as written to the transcript (§6: "session id, event seq,
/// event type, tool name, raw line").
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptEvent<'a> {
    pub session_id: &'a str,
    pub seq: u64,
    pub event_type: &'a str,
    pub tool_name: Option<&'a str>,
    pub raw_line: &'a str,
}

/// Appends transcript events to a single active segment file, rotating it
/// out (compressed) once it crosses [`ROTATE_THRESHOLD_BYTES`].
pub struct TranscriptStore {
    path: PathBuf,
}

impl TranscriptStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append one event. Best-effort: a failure is logged and otherwise
    /// ignored, matching §6's "missing ⇒ logging degrades silently".
    pub fn append(&self, event: &TranscriptEvent<'_>) {
        if let Err(err) = self.try_append(event) {
            tracing::warn!(path = %self.path.display(), %err, "failed to append transcript event");
        }
    }

    fn try_append(&self, event: &TranscriptEvent<'_>) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.rotate_if_oversized()?;
        let mut file = std::fs::OpenOptions::new().create(true).append(true).open(&self.path)?;
        let line = serde_json::to_string(event).unwrap_or_default();
        writeln!(file, "{line}")
    }

    fn rotate_if_oversized(&self) -> std::io::Result<()> {
        let size = match std::fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err),
        };
        if size < ROTATE_THRESHOLD_BYTES {
            return Ok(());
        }
        rotate_and_compress(&self.path)
    }
}

/// Shift `.1.zst` .. `.N.zst` up by one (dropping the oldest), then compress
/// the active segment into the freed `.1.zst` slot. Mirrors the teacher's
/// `rotate_bak_path` numbered-backup shuffle, applied to compressed segments.
fn rotate_and_compress(path: &Path) -> std::io::Result<()> {
    let segment_path = |n: u32| path.with_extension(format!("{n}.zst"));

    let oldest = segment_path(MAX_ROTATED_SEGMENTS);
    if oldest.exists() {
        std::fs::remove_file(&oldest)?;
    }
    for n in (1..MAX_ROTATED_SEGMENTS).rev() {
        let src = segment_path(n);
        if src.exists() {
            std::fs::rename(&src, segment_path(n + 1))?;
        }
    }

    let raw = std::fs::read(path)?;
    let compressed = zstd::encode_all(raw.as_slice(), 0)?;
    std::fs::write(segment_path(1), compressed)?;
    std::fs::remove_file(path)?;
    Ok(())
}
