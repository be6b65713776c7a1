//! `git` subcommands used by the stager
//!
//! Every command runs non-interactively (`GIT_TERMINAL_PROMPT=0`) under the
//! configured deadline. Non-zero exits become [`GitError::Failed`] carrying
//! the subcommand name and stderr, never the full argument list, since clone
//! arguments embed credentials.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use triage_core::{CommandRunner, CommandSpec, ProcessError};

/// Git command failures
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    /// Could not run git at all
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// git exited non-zero
    #[error("git {subcommand} failed (exit {code:?}): {stderr}")]
    Failed {
        subcommand: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// Thin async wrapper over the `git` binary
#[derive(Debug, Clone)]
pub struct GitCli {
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl GitCli {
    /// Create wrapper with per-command `timeout`
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, timeout: Duration) -> Self {
        Self { runner, timeout }
    }

    fn spec(&self, cwd: Option<&Path>, args: &[&str]) -> CommandSpec {
        let mut spec = CommandSpec::new("git")
            .args(args.iter().copied())
            .env("GIT_TERMINAL_PROMPT", "0")
            .timeout(self.timeout);
        if let Some(dir) = cwd {
            spec = spec.current_dir(dir);
        }
        spec
    }

    async fn run(&self, cwd: Option<&Path>, args: &[&str]) -> Result<String, GitError> {
        let spec = self.spec(cwd, args);
        let output = self.runner.run(&spec).await?;
        if output.success() {
            Ok(output.stdout)
        } else {
            Err(GitError::Failed {
                subcommand: args.first().copied().unwrap_or_default().to_string(),
                code: output.status,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }

    /// Single-branch clone of `branch` into `dest`
    ///
    /// # Errors
    /// `GitError` when the clone fails.
    pub async fn clone_branch(
        &self,
        url: &str,
        dest: &Path,
        branch: &str,
        depth: Option<u32>,
    ) -> Result<(), GitError> {
        let depth = depth.map(|d| d.to_string());
        let dest = dest.to_string_lossy();
        let mut args = vec!["clone"];
        if let Some(depth) = depth.as_deref() {
            args.extend(["--depth", depth]);
        }
        args.extend(["--single-branch", "--branch", branch, url, &*dest]);
        self.run(None, &args).await.map(drop)
    }

    /// Check out a branch or commit
    ///
    /// # Errors
    /// `GitError` when the checkout fails.
    pub async fn checkout(&self, dir: &Path, rev: &str) -> Result<(), GitError> {
        self.run(Some(dir), &["checkout", "--quiet", rev]).await.map(drop)
    }

    /// Fast-forward `branch` from origin
    ///
    /// # Errors
    /// `GitError` when the pull fails or cannot fast-forward.
    pub async fn pull_ff_only(&self, dir: &Path, branch: &str) -> Result<(), GitError> {
        self.run(Some(dir), &["pull", "--ff-only", "origin", branch])
            .await
            .map(drop)
    }

    /// Fetch all tags from origin
    ///
    /// # Errors
    /// `GitError` when the fetch fails.
    pub async fn fetch_tags(&self, dir: &Path) -> Result<(), GitError> {
        self.run(Some(dir), &["fetch", "--tags", "origin"]).await.map(drop)
    }

    /// Newest tag matching `pattern`, by creation date
    ///
    /// # Errors
    /// `GitError` when listing fails.
    pub async fn latest_tag(&self, dir: &Path, pattern: &str) -> Result<Option<String>, GitError> {
        let stdout = self
            .run(Some(dir), &["tag", "--list", pattern, "--sort=-creatordate"])
            .await?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(ToString::to_string))
    }

    /// Commit a tag points at
    ///
    /// # Errors
    /// `GitError` when the tag cannot be resolved.
    pub async fn commit_for_tag(&self, dir: &Path, tag: &str) -> Result<String, GitError> {
        let stdout = self.run(Some(dir), &["rev-list", "-n", "1", tag]).await?;
        Ok(stdout.trim().to_string())
    }

    /// Commit currently checked out
    ///
    /// # Errors
    /// `GitError` when HEAD cannot be resolved.
    pub async fn head(&self, dir: &Path) -> Result<String, GitError> {
        let stdout = self.run(Some(dir), &["rev-parse", "HEAD"]).await?;
        Ok(stdout.trim().to_string())
    }

    /// Whether HEAD resolves to a commit
    ///
    /// False for a copy whose clone was interrupted before any ref landed.
    pub async fn has_head(&self, dir: &Path) -> bool {
        self.run(Some(dir), &["rev-parse", "--verify", "--quiet", "HEAD"])
            .await
            .is_ok_and(|stdout| !stdout.trim().is_empty())
    }

    /// Detached worktree of the current HEAD at `path`
    ///
    /// # Errors
    /// `GitError` when the worktree cannot be created.
    pub async fn worktree_add(&self, dir: &Path, path: &Path) -> Result<(), GitError> {
        let path = path.to_string_lossy();
        self.run(Some(dir), &["worktree", "add", "--detach", &*path, "HEAD"])
            .await
            .map(drop)
    }

    /// Remove the worktree at `path`
    ///
    /// # Errors
    /// `GitError` when removal fails.
    pub async fn worktree_remove(&self, dir: &Path, path: &Path) -> Result<(), GitError> {
        let path = path.to_string_lossy();
        self.run(Some(dir), &["worktree", "remove", "--force", &*path])
            .await
            .map(drop)
    }

    /// Forget worktrees whose directories are gone
    ///
    /// # Errors
    /// `GitError` when pruning fails.
    pub async fn worktree_prune(&self, dir: &Path) -> Result<(), GitError> {
        self.run(Some(dir), &["worktree", "prune"]).await.map(drop)
    }
}
