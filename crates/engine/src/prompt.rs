// SPDX-License-Identifier: MIT

//! Implementer prompt composition (§4.H step 8, §4.I, §4.H step 7).

use noface_core::Manifest;

/// The initial prompt for a freshly dispatched worker, including the
/// owned-files list from its manifest (§4.H step 8).
pub fn implementer_prompt(issue_title: &str, issue_body: &str, manifest: &Manifest) -> String {
    format!(
        "Work on: {issue_title}\n\n{issue_body}\n\n\
         You may write only these files: {}.\n\
         You may read (but not write): {}.\n\
         You must never touch: {}.\n\
         If you need to read or modify a file outside these sets, print a \
         line of the form `BLOCKED_BY_FILE: <path>` and wait.",
        join(&manifest.primary),
        join(&manifest.read),
        join(&manifest.forbidden),
    )
}

/// Prompt prepended when retrying after a manifest violation (§4.I): lists
/// the violated files and reinforces the manifest boundary.
pub fn stricter_prompt(base_prompt: &str, violated_paths: &[String]) -> String {
    format!(
        "Your previous attempt touched files outside your manifest: {}. \
         Those changes have been reverted. Stay strictly within your \
         assigned files this time.\n\n{base_prompt}",
        violated_paths.join(", "),
    )
}

/// Prompt for the single-issue sequential fallback (§4.J): issues without a
/// manifest run alone, so there is no owned-files list to state.
pub fn unrestricted_prompt(issue_title: &str, issue_body: &str) -> String {
    format!("Work on: {issue_title}\n\n{issue_body}")
}

/// Prompt fragment appended when a `Waiting` worker is resumed after the
/// file it was blocked on becomes free (§4.H step 7).
pub fn resume_prompt_fragment(unblocked_path: &str) -> String {
    format!(
        "You were paused waiting for `{unblocked_path}`. It is now free. \
         Inspect the current state of the working copy before continuing — \
         it may have changed since you were paused."
    )
}

fn join(paths: &std::collections::BTreeSet<String>) -> String {
    if paths.is_empty() {
        "(none)".to_string()
    } else {
        paths.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn implementer_prompt_lists_owned_files() {
        let manifest = Manifest::new(
            BTreeSet::from(["src/a.rs".to_string()]),
            BTreeSet::from(["src/b.rs".to_string()]),
            BTreeSet::from(["src/c.rs".to_string()]),
        )
        .unwrap();
        let prompt = implementer_prompt("fix bug", "details", &manifest);
        assert!(prompt.contains("src/a.rs"));
        assert!(prompt.contains("src/b.rs"));
        assert!(prompt.contains("src/c.rs"));
        assert!(prompt.contains("BLOCKED_BY_FILE"));
    }

    #[test]
    fn stricter_prompt_names_violated_paths() {
        let prompt = stricter_prompt("base", &["src/main.rs".to_string()]);
        assert!(prompt.contains("src/main.rs"));
        assert!(prompt.contains("base"));
    }
}
