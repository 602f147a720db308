//! End-to-end CLI specs for the `noface` binary, run as a subprocess through
//! `assert_cmd`. Since no real LLM agent is available in a test environment,
//! these use `true`/`sh` as stand-ins for the tracker/implementer/reviewer
//! commands, the same "fake agent via shell" technique the process-level
//! unit tests use.

use assert_cmd::Command;
use std::path::Path;

fn noface() -> Command {
    Command::cargo_bin("noface").expect("noface binary built by this workspace")
}

fn git_init(dir: &Path) {
    std::process::Command::new("git")
        .args(["init", "--quiet"])
        .current_dir(dir)
        .status()
        .expect("git must be on PATH to run these specs");
    std::process::Command::new("git")
        .args(["config", "user.email", "noface@example.com"])
        .current_dir(dir)
        .status()
        .unwrap();
    std::process::Command::new("git")
        .args(["config", "user.name", "noface"])
        .current_dir(dir)
        .status()
        .unwrap();
}

/// A config whose tracker/implementer/reviewer are all `true`: every call
/// into them exits 0 with empty stdout, so the tracker returns no ready
/// issues and the planner's JSON parse fails (logged, non-fatal). The loop
/// finds no pending batch and no ready issue on the very first iteration.
const NOOP_CONFIG: &str = r#"
num_workers = 1
run_quality = false
implementer_command = ["true"]
reviewer_command = ["true"]
tracker_command = "true"
"#;

fn stderr_of(assert: &assert_cmd::assert::Assert) -> String {
    String::from_utf8_lossy(&assert.get_output().stderr).into_owned()
}

#[test]
fn init_rejects_non_git_directory() {
    let dir = tempfile::tempdir().unwrap();
    let assert = noface().args(["-C", dir.path().to_str().unwrap(), "init"]).assert().failure().code(1);
    assert!(stderr_of(&assert).contains("not a git repository"));
}

#[test]
fn init_creates_dot_noface_and_default_config() {
    let dir = tempfile::tempdir().unwrap();
    git_init(dir.path());

    noface().args(["-C", dir.path().to_str().unwrap(), "init"]).assert().success();

    assert!(dir.path().join(".noface").is_dir());
    assert!(dir.path().join("noface.toml").is_file());
}

#[test]
fn init_leaves_existing_config_untouched() {
    let dir = tempfile::tempdir().unwrap();
    git_init(dir.path());
    std::fs::write(dir.path().join("noface.toml"), "num_workers = 2\n").unwrap();

    noface().args(["-C", dir.path().to_str().unwrap(), "init"]).assert().success();

    let contents = std::fs::read_to_string(dir.path().join("noface.toml")).unwrap();
    assert_eq!(contents, "num_workers = 2\n");
}

#[test]
fn run_rejects_non_git_directory() {
    let dir = tempfile::tempdir().unwrap();
    let assert = noface().args(["-C", dir.path().to_str().unwrap(), "run"]).assert().failure().code(1);
    assert!(stderr_of(&assert).contains("not a git repository"));
}

#[test]
fn run_fails_fast_when_tracker_binary_is_missing() {
    let dir = tempfile::tempdir().unwrap();
    git_init(dir.path());
    // Default config's tracker_command is "bd", not expected to be on PATH.
    let assert =
        noface().args(["-C", dir.path().to_str().unwrap(), "run", "--dry-run"]).assert().failure().code(1);
    assert!(stderr_of(&assert).contains("bd"));
}

#[test]
fn run_dry_run_with_noop_agents_stops_on_empty_backlog() {
    let dir = tempfile::tempdir().unwrap();
    git_init(dir.path());
    std::fs::write(dir.path().join("noface.toml"), NOOP_CONFIG).unwrap();

    noface().args(["-C", dir.path().to_str().unwrap(), "run", "--dry-run"]).assert().success();

    let state_path = dir.path().join(".noface").join("state.json");
    assert!(state_path.is_file());
    let state: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&state_path).unwrap()).unwrap();
    assert_eq!(state["workers"].as_array().unwrap().len(), 1);
    assert_eq!(state["issues"].as_object().unwrap().len(), 0);

    let progress = std::fs::read_to_string(dir.path().join(".noface").join("progress.log")).unwrap();
    assert!(progress.contains("iteration 0"));
}

#[test]
fn run_num_workers_flag_overrides_config_file() {
    let dir = tempfile::tempdir().unwrap();
    git_init(dir.path());
    std::fs::write(dir.path().join("noface.toml"), NOOP_CONFIG).unwrap();

    noface()
        .args(["-C", dir.path().to_str().unwrap(), "run", "--dry-run", "--num-workers", "3"])
        .assert()
        .success();

    let state_path = dir.path().join(".noface").join("state.json");
    let state: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&state_path).unwrap()).unwrap();
    assert_eq!(state["workers"].as_array().unwrap().len(), 3);
}

#[test]
fn run_max_iterations_zero_stops_immediately() {
    let dir = tempfile::tempdir().unwrap();
    git_init(dir.path());
    std::fs::write(dir.path().join("noface.toml"), NOOP_CONFIG).unwrap();

    noface()
        .args(["-C", dir.path().to_str().unwrap(), "run", "--dry-run", "--max-iterations", "0"])
        .assert()
        .success();

    let progress_path = dir.path().join(".noface").join("progress.log");
    assert!(!progress_path.exists(), "no iteration should have run");
}

#[test]
fn serve_is_not_yet_implemented() {
    let dir = tempfile::tempdir().unwrap();
    git_init(dir.path());
    noface().args(["-C", dir.path().to_str().unwrap(), "serve"]).assert().failure().code(1);
}
