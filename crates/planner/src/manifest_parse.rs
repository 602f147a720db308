// SPDX-License-Identifier: MIT

//! Parses the reviewer agent's `MANIFEST:` comment line (§4.F step 3):
//! `MANIFEST: primary=[a,b] read=[c] forbidden=[d]`.

use noface_core::Manifest;
use std::collections::BTreeSet;

const SENTINEL: &str = "MANIFEST:";

/// Locate the most recent `MANIFEST:` line among an issue's comments (read
/// newest-first is the caller's job; this just finds the line within one
/// comment body) and parse it into a [`Manifest`].
///
/// Returns `None` if no `MANIFEST:` line is present, the bracket syntax is
/// malformed, or `primary` is absent/empty — all rejected per §4.F: "a
/// manifest without `primary` is rejected".
pub fn parse_manifest_comment(body: &str) -> Option<Manifest> {
    let line = body.lines().rev().find(|l| l.trim_start().starts_with(SENTINEL))?;
    let rest = line.trim_start().strip_prefix(SENTINEL)?.trim();

    let primary = extract_bracket(rest, "primary")?;
    if primary.is_empty() {
        return None;
    }
    let read = extract_bracket(rest, "read").unwrap_or_default();
    let forbidden = extract_bracket(rest, "forbidden").unwrap_or_default();

    Manifest::new(primary, read, forbidden).ok()
}

fn extract_bracket(rest: &str, key: &str) -> Option<BTreeSet<String>> {
    let needle = format!("{key}=[");
    let start = rest.find(&needle)? + needle.len();
    let end = rest[start..].find(']')? + start;
    let inner = &rest[start..end];
    Some(
        inner
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_manifest_line() {
        let body = "some preamble\nMANIFEST: primary=[a.rs,b.rs] read=[c.rs] forbidden=[d.rs]";
        let manifest = parse_manifest_comment(body).unwrap();
        assert!(manifest.allows_write("a.rs"));
        assert!(manifest.allows_write("b.rs"));
        assert!(manifest.allows_read("c.rs"));
        assert!(manifest.is_forbidden("d.rs"));
    }

    #[test]
    fn read_and_forbidden_are_optional() {
        let body = "MANIFEST: primary=[only.rs]";
        let manifest = parse_manifest_comment(body).unwrap();
        assert!(manifest.allows_write("only.rs"));
    }

    #[test]
    fn missing_primary_is_rejected() {
        assert!(parse_manifest_comment("MANIFEST: read=[a.rs]").is_none());
        assert!(parse_manifest_comment("MANIFEST: primary=[]").is_none());
    }

    #[test]
    fn picks_the_last_manifest_line_when_several_present() {
        let body = "MANIFEST: primary=[old.rs]\nsome notes\nMANIFEST: primary=[new.rs]";
        let manifest = parse_manifest_comment(body).unwrap();
        assert!(manifest.allows_write("new.rs"));
        assert!(!manifest.allows_write("old.rs"));
    }

    #[test]
    fn absent_sentinel_returns_none() {
        assert!(parse_manifest_comment("just a regular comment").is_none());
    }
}
