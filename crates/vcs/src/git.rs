// SPDX-License-Identifier: MIT

//! Git-backed [`crate::RepoOps`]: worktrees for isolation, plain plumbing
//! commands for everything else.

use crate::{CommitOutcome, DirtyPaths, FilePath, MergeOutcome, RepoOps, VcsError, WorkspacePath};
use async_trait::async_trait;
use noface_process::timeout_run::{run_with_timeout, GIT_WORKTREE_TIMEOUT};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

const PORCELAIN_TIMEOUT: Duration = Duration::from_secs(20);

/// A git repository rooted at `repo_root`, driving worktrees under
/// `workspaces_dir` (normally `<repo_root>/.noface-worker-N`, see
/// [`crate::workspace_dir_name`]).
pub struct GitRepoOps {
    repo_root: PathBuf,
}

impl GitRepoOps {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self { repo_root: repo_root.into() }
    }

    fn git(&self, cwd: &Path) -> Command {
        let mut cmd = Command::new("git");
        cmd.current_dir(cwd);
        cmd
    }

    async fn run(&self, cwd: &Path, args: &[&str], label: &str) -> Result<std::process::Output, VcsError> {
        let mut cmd = self.git(cwd);
        cmd.args(args);
        run_with_timeout(cmd, PORCELAIN_TIMEOUT, label).await.map_err(|e| VcsError::CommandFailed(e.to_string()))
    }

    fn branch_name(worker_id: usize) -> String {
        format!("noface/worker-{worker_id}")
    }
}

#[async_trait]
impl RepoOps for GitRepoOps {
    async fn list_dirty(&self) -> Result<DirtyPaths, VcsError> {
        let out = self.run(&self.repo_root, &["status", "--porcelain=v1"], "git status").await?;
        if !out.status.success() {
            return Err(VcsError::VcsUnavailable(String::from_utf8_lossy(&out.stderr).trim().to_string()));
        }
        let mut dirty = DirtyPaths::default();
        for line in String::from_utf8_lossy(&out.stdout).lines() {
            if line.len() < 4 {
                continue;
            }
            let index_status = line.as_bytes()[0] as char;
            let worktree_status = line.as_bytes()[1] as char;
            let path = line[3..].to_string();
            if index_status == '?' && worktree_status == '?' {
                dirty.untracked.insert(path);
            } else if index_status != ' ' {
                dirty.staged_or_added.insert(path);
            } else {
                dirty.modified.insert(path);
            }
        }
        Ok(dirty)
    }

    async fn create_isolated_workspace(&self, worker_id: usize) -> Result<WorkspacePath, VcsError> {
        let path = self.repo_root.join(crate::workspace_dir_name(worker_id));
        if path.exists() {
            self.remove_workspace(&path).await;
        }
        let branch = Self::branch_name(worker_id);
        // A prior crash may have left the branch registered without a
        // worktree; delete it so `worktree add -b` doesn't refuse to reuse
        // the name (§4.E crash recovery).
        let _ = self.run(&self.repo_root, &["branch", "-D", &branch], "git branch -D (pre-create)").await;

        let path_str = path.display().to_string();
        let mut cmd = self.git(&self.repo_root);
        cmd.args(["worktree", "add", "-b", &branch, &path_str, "HEAD"])
            .env_remove("GIT_DIR")
            .env_remove("GIT_WORK_TREE");
        let out = run_with_timeout(cmd, GIT_WORKTREE_TIMEOUT, "git worktree add")
            .await
            .map_err(|e| VcsError::CommandFailed(e.to_string()))?;
        if !out.status.success() {
            return Err(VcsError::CommandFailed(String::from_utf8_lossy(&out.stderr).trim().to_string()));
        }
        Ok(path)
    }

    async fn remove_workspace(&self, path: &WorkspacePath) {
        let dot_git = path.join(".git");
        let is_worktree = tokio::fs::symlink_metadata(&dot_git).await.map(|m| m.is_file()).unwrap_or(false);

        if is_worktree {
            let mut cmd = self.git(path);
            cmd.args(["worktree", "remove", "--force", "."]);
            let _ = run_with_timeout(cmd, GIT_WORKTREE_TIMEOUT, "git worktree remove").await;

            if let Ok(contents) = tokio::fs::read_to_string(&dot_git).await {
                if let Some(gitdir) = contents.trim().strip_prefix("gitdir: ") {
                    // <repo_root>/.git/worktrees/<name> -> <repo_root>
                    let gitdir_path = Path::new(gitdir);
                    if let Some(repo_root) =
                        gitdir_path.parent().and_then(Path::parent).and_then(Path::parent)
                    {
                        if let Some(branch) = path.file_name().and_then(|n| n.to_str()) {
                            let branch = branch.strip_prefix(crate::WORKSPACE_DIR_PREFIX);
                            if let Some(worker_id) = branch.and_then(|s| s.parse::<usize>().ok()) {
                                let branch_name = Self::branch_name(worker_id);
                                let mut cmd = self.git(repo_root);
                                cmd.args(["branch", "-D", &branch_name])
                                    .env_remove("GIT_DIR")
                                    .env_remove("GIT_WORK_TREE");
                                let _ = run_with_timeout(cmd, GIT_WORKTREE_TIMEOUT, "git branch -D").await;
                            }
                        }
                    }
                }
            }
        }

        if path.exists() {
            if let Err(err) = tokio::fs::remove_dir_all(path).await {
                tracing::warn!(path = %path.display(), %err, "failed to remove workspace directory (best-effort)");
            }
        }
    }

    async fn list_workspaces(&self) -> Result<Vec<WorkspacePath>, VcsError> {
        let mut entries = match tokio::fs::read_dir(&self.repo_root).await {
            Ok(entries) => entries,
            Err(err) => return Err(VcsError::Io(err)),
        };
        let mut found = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if let Some(name) = name.to_str() {
                if name.starts_with(crate::WORKSPACE_DIR_PREFIX) {
                    found.push(entry.path());
                }
            }
        }
        found.sort();
        Ok(found)
    }

    async fn workspace_diff(&self, path: &WorkspacePath) -> Result<Vec<FilePath>, VcsError> {
        let out = self.run(path, &["diff", "--name-only", "HEAD"], "git diff").await?;
        if !out.status.success() {
            return Err(VcsError::CommandFailed(String::from_utf8_lossy(&out.stderr).trim().to_string()));
        }
        let status_out = self.run(path, &["status", "--porcelain=v1"], "git status (workspace)").await?;
        let mut files: Vec<FilePath> =
            String::from_utf8_lossy(&out.stdout).lines().map(str::to_string).collect();
        if status_out.status.success() {
            for line in String::from_utf8_lossy(&status_out.stdout).lines() {
                if line.len() >= 4 {
                    let path = line[3..].to_string();
                    if !files.contains(&path) {
                        files.push(path);
                    }
                }
            }
        }
        Ok(files)
    }

    async fn stage_and_commit(&self, path: &WorkspacePath, message: &str) -> Result<CommitOutcome, VcsError> {
        self.run(path, &["add", "-A"], "git add").await?;
        let out = self.run(path, &["commit", "-m", message, "--allow-empty-message"], "git commit").await?;
        if out.status.success() {
            return Ok(CommitOutcome::Committed);
        }
        let stderr = String::from_utf8_lossy(&out.stderr);
        if stderr.contains("nothing to commit") {
            Ok(CommitOutcome::Nothing)
        } else {
            Err(VcsError::CommandFailed(stderr.trim().to_string()))
        }
    }

    async fn merge_commit_into_main(&self, path: &WorkspacePath) -> Result<MergeOutcome, VcsError> {
        let rev_parse = self.run(path, &["rev-parse", "HEAD"], "git rev-parse").await?;
        if !rev_parse.status.success() {
            return Err(VcsError::CommandFailed(String::from_utf8_lossy(&rev_parse.stderr).trim().to_string()));
        }
        let head = String::from_utf8_lossy(&rev_parse.stdout).trim().to_string();

        let out = self.run(&self.repo_root, &["cherry-pick", "--no-commit", &head], "git cherry-pick").await?;
        if out.status.success() {
            self.run(&self.repo_root, &["reset"], "git reset (post cherry-pick)").await?;
            return Ok(MergeOutcome::Clean);
        }
        let _ = self.run(&self.repo_root, &["cherry-pick", "--abort"], "git cherry-pick --abort").await;
        Ok(MergeOutcome::Conflict)
    }

    async fn rollback_file(&self, workspace: &WorkspacePath, path: &str) -> Result<(), VcsError> {
        let _ = self.run(workspace, &["reset", "--", path], "git reset (rollback)").await;
        let restore = self.run(workspace, &["checkout", "HEAD", "--", path], "git checkout (rollback)").await?;
        if !restore.status.success() {
            // Not tracked at HEAD: treat as untracked-and-remove.
            let full = workspace.join(path);
            if full.exists() {
                tokio::fs::remove_file(&full).await.map_err(VcsError::Io)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::process::Command as TokioCommand;

    async fn init_repo(root: &Path) {
        let run = |args: &'static [&'static str]| {
            let mut cmd = TokioCommand::new("git");
            cmd.current_dir(root).args(args);
            cmd
        };
        run(&["init", "-q"]).status().await.unwrap();
        run(&["config", "user.email", "test@example.com"]).status().await.unwrap();
        run(&["config", "user.name", "test"]).status().await.unwrap();
        tokio::fs::write(root.join("README.md"), "hello\n").await.unwrap();
        run(&["add", "-A"]).status().await.unwrap();
        run(&["commit", "-q", "-m", "init"]).status().await.unwrap();
    }

    #[tokio::test]
    async fn list_dirty_classifies_three_ways() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path()).await;
        tokio::fs::write(dir.path().join("README.md"), "changed\n").await.unwrap();
        tokio::fs::write(dir.path().join("new.txt"), "new\n").await.unwrap();
        let repo = GitRepoOps::new(dir.path());
        let dirty = repo.list_dirty().await.unwrap();
        assert!(dirty.modified.contains("README.md"));
        assert!(dirty.untracked.contains("new.txt"));
    }

    #[tokio::test]
    async fn create_and_remove_isolated_workspace_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path()).await;
        let repo = GitRepoOps::new(dir.path());
        let ws = repo.create_isolated_workspace(0).await.unwrap();
        assert!(ws.join("README.md").exists());
        let workspaces = repo.list_workspaces().await.unwrap();
        assert_eq!(workspaces, vec![ws.clone()]);
        repo.remove_workspace(&ws).await;
        assert!(!ws.exists());
    }

    #[tokio::test]
    async fn stage_and_commit_then_merge_clean() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path()).await;
        let repo = GitRepoOps::new(dir.path());
        let ws = repo.create_isolated_workspace(1).await.unwrap();
        tokio::fs::write(ws.join("feature.txt"), "added\n").await.unwrap();
        let outcome = repo.stage_and_commit(&ws, "add feature").await.unwrap();
        assert_eq!(outcome, CommitOutcome::Committed);
        let merge = repo.merge_commit_into_main(&ws).await.unwrap();
        assert_eq!(merge, MergeOutcome::Clean);
        assert!(dir.path().join("feature.txt").exists());
        repo.remove_workspace(&ws).await;
    }

    #[tokio::test]
    async fn rollback_file_restores_tracked_content() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path()).await;
        let repo = GitRepoOps::new(dir.path());
        tokio::fs::write(dir.path().join("README.md"), "tampered\n").await.unwrap();
        repo.rollback_file(&dir.path().to_path_buf(), "README.md").await.unwrap();
        let content = tokio::fs::read_to_string(dir.path().join("README.md")).await.unwrap();
        assert_eq!(content, "hello\n");
    }
}
