// SPDX-License-Identifier: MIT

//! `noface.toml` project configuration (SPEC_FULL §3/§4). CLI flags take
//! precedence over config file values, which take precedence over the
//! defaults below.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
    #[error("{path}: {message}")]
    Parse { path: PathBuf, message: String },
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    pub num_workers: u32,
    pub agent_timeout_seconds: u64,
    pub planner_interval: u64,
    pub quality_interval: u64,
    pub run_planner: bool,
    pub run_quality: bool,
    /// `argv` for the implementer agent; the prompt is appended as the final argument.
    pub implementer_command: Vec<String>,
    /// `argv` for the reviewer agent, used for planning and quality passes.
    pub reviewer_command: Vec<String>,
    /// `argv[0]` of the issue tracker CLI, invoked with the project root as
    /// its working directory (e.g. `"bd"`).
    pub tracker_command: String,
    /// Baseline build command checked at startup; empty means unconfigured.
    pub build_command: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_workers: 4,
            agent_timeout_seconds: 600,
            planner_interval: 5,
            quality_interval: 5,
            run_planner: true,
            run_quality: true,
            implementer_command: Vec::new(),
            reviewer_command: Vec::new(),
            tracker_command: "bd".to_string(),
            build_command: Vec::new(),
        }
    }
}

impl Config {
    /// Load from `path`. A missing file yields defaults, not an error —
    /// `noface run` should work against a freshly `init`ed project.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => return Err(ConfigError::Io { path: path.to_owned(), source }),
        };
        let mut cfg: Self = toml::from_str(&contents)
            .map_err(|e| ConfigError::Parse { path: path.to_owned(), message: e.message().to_owned() })?;
        cfg.num_workers = cfg.num_workers.clamp(1, 8);
        Ok(cfg)
    }
}

pub const DEFAULT_CONFIG_TOML: &str = r#"# noface project configuration.

num_workers = 4
agent_timeout_seconds = 600
planner_interval = 5
quality_interval = 5
run_planner = true
run_quality = true

# argv for the implementer agent; the prompt is appended as the final argument.
implementer_command = []
# argv for the reviewer agent (planning and quality passes).
reviewer_command = []
# argv[0] of the issue tracker CLI, invoked with the project root as its cwd.
tracker_command = "bd"
# baseline build command, checked at startup unless --dry-run is passed.
build_command = []
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = Config::load(Path::new("/nonexistent/noface.toml")).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn clamps_num_workers_above_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noface.toml");
        std::fs::write(&path, "num_workers = 99\n").unwrap();
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.num_workers, 8);
    }

    #[test]
    fn clamps_num_workers_below_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noface.toml");
        std::fs::write(&path, "num_workers = 0\n").unwrap();
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.num_workers, 1);
    }

    #[test]
    fn parses_partial_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noface.toml");
        std::fs::write(&path, "agent_timeout_seconds = 120\n").unwrap();
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.agent_timeout_seconds, 120);
        assert_eq!(cfg.num_workers, 4);
    }

    #[test]
    fn rejects_unknown_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noface.toml");
        std::fs::write(&path, "bogus = true\n").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn default_config_toml_parses_as_defaults() {
        let cfg: Config = toml::from_str(DEFAULT_CONFIG_TOML).unwrap();
        assert_eq!(cfg, Config::default());
    }
}
