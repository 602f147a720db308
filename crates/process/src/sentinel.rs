// SPDX-License-Identifier: MIT

//! Extraction of the `BLOCKED_BY_FILE:` cooperative-suspension sentinel from
//! agent output (§4.C, §8 properties 6-7).
//!
//! The literal string may appear as plain text or embedded inside a JSON
//! string value. [`SentinelScanner`] scans only the bytes appended since its
//! last scan and, once a match is consumed (valid or not), advances its
//! cursor past it so the same match never refires.

const SENTINEL: &str = "BLOCKED_BY_FILE:";
const STOP_CHARS: [char; 3] = ['\n', '"', '\\'];
/// JSON-syntax characters that disqualify a candidate path — they indicate
/// the agent emitted a placeholder or a raw JSON fragment, not a real path.
const DISQUALIFYING_CHARS: [char; 10] = ['{', '}', '[', ']', ':', ',', '"', '\\', '<', '>'];
const MAX_CANDIDATE_LEN: usize = 512;

/// Scans a growing output buffer for `BLOCKED_BY_FILE:` occurrences.
#[derive(Debug, Default)]
pub struct SentinelScanner {
    scanned_up_to: usize,
}

impl SentinelScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan `buffer` (the full accumulated output so far) for a new,
    /// previously-unconsumed `BLOCKED_BY_FILE:` occurrence.
    ///
    /// Returns `Some(path)` for the first occurrence found with a valid
    /// path candidate; returns `None` if there is no new occurrence, or the
    /// candidate found was invalid (in which case it is still consumed —
    /// the cursor advances past it so it cannot be found again).
    pub fn scan(&mut self, buffer: &str) -> Option<String> {
        if self.scanned_up_to > buffer.len() {
            self.scanned_up_to = buffer.len();
        }
        let new_region = &buffer[self.scanned_up_to..];
        let rel_idx = new_region.find(SENTINEL)?;
        let abs_start = self.scanned_up_to + rel_idx;
        let after_sentinel = abs_start + SENTINEL.len();
        let rest = &buffer[after_sentinel..];

        let stop = rest.find(STOP_CHARS).unwrap_or(rest.len());
        let raw_candidate = rest[..stop].trim();
        // Advance the cursor past this occurrence regardless of validity so
        // it can never be rediscovered on a later scan (property 7).
        self.scanned_up_to = after_sentinel + stop;

        if is_valid_candidate(raw_candidate) {
            Some(raw_candidate.to_string())
        } else {
            None
        }
    }
}

fn is_valid_candidate(candidate: &str) -> bool {
    let len = candidate.len();
    if len < 1 || len > MAX_CANDIDATE_LEN {
        return false;
    }
    if candidate.chars().any(|c| DISQUALIFYING_CHARS.contains(&c)) {
        return false;
    }
    let has_slash = candidate.contains('/');
    let has_dot_extension = match candidate.rsplit_once('.') {
        Some((_, ext)) => !ext.is_empty(),
        None => false,
    };
    if !has_slash && !has_dot_extension {
        return false;
    }
    candidate.chars().any(|c| c.is_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_path_embedded_in_json_string() {
        // Property 6 (§8).
        let buffer = r#"{"type":"text","text":"...BLOCKED_BY_FILE: foo/bar.ext"}"#;
        let mut scanner = SentinelScanner::new();
        assert_eq!(scanner.scan(buffer), Some("foo/bar.ext".to_string()));
    }

    #[test]
    fn rejects_placeholder_angle_bracket_path() {
        let buffer = "BLOCKED_BY_FILE: <path/to/file>";
        let mut scanner = SentinelScanner::new();
        assert_eq!(scanner.scan(buffer), None);
    }

    #[test]
    fn rejects_json_fragment_candidate() {
        let buffer = r#"BLOCKED_BY_FILE: {"nested":"json"}"#;
        let mut scanner = SentinelScanner::new();
        assert_eq!(scanner.scan(buffer), None);
    }

    #[test]
    fn non_refire_after_consumption() {
        // Property 7 (§8): a second scan over the same buffer must not
        // reproduce a sentinel already consumed.
        let buffer = "BLOCKED_BY_FILE: src/a.rs more text";
        let mut scanner = SentinelScanner::new();
        assert_eq!(scanner.scan(buffer), Some("src/a.rs".to_string()));
        assert_eq!(scanner.scan(buffer), None);
    }

    #[test]
    fn finds_second_occurrence_after_new_bytes_appended() {
        let mut scanner = SentinelScanner::new();
        let mut buffer = String::from("BLOCKED_BY_FILE: a/b.rs\n");
        assert_eq!(scanner.scan(&buffer), Some("a/b.rs".to_string()));
        buffer.push_str("some more agent output\nBLOCKED_BY_FILE: c/d.rs\n");
        assert_eq!(scanner.scan(&buffer), Some("c/d.rs".to_string()));
    }

    #[test]
    fn plain_path_without_slash_or_extension_is_rejected() {
        let buffer = "BLOCKED_BY_FILE: justaword";
        let mut scanner = SentinelScanner::new();
        assert_eq!(scanner.scan(&buffer), None);
    }

    #[test]
    fn length_bounds_are_enforced() {
        assert!(!is_valid_candidate(""));
        let too_long = format!("a/{}", "b".repeat(600));
        assert!(!is_valid_candidate(&too_long));
        assert!(is_valid_candidate("src/main.rs"));
    }
}
