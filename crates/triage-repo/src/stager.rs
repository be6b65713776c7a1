//! Repository stager
//!
//! One shared working copy, mutated only while holding the stager's async
//! mutex. Each sync:
//! 1. clones (no `.git` yet) or checks out the branch and fast-forwards it;
//!    a copy left without HEAD by an interrupted clone is removed and cloned again
//! 2. fetches tags
//! 3. checks out the commit of the newest production-release tag, if any
//!
//! With run isolation enabled, a detached worktree of the pinned commit is
//! created per analysis id before the lock is released, so concurrent runs
//! never see the shared copy move underneath them.

use crate::git::{GitCli, GitError};
use crate::remote::RepositoryRemote;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use triage_core::{AnalysisId, CommandRunner, DeployedRevision, RepositoryConfig, TriageError};

/// Result of the pinning step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinningOutcome {
    /// Working copy sits on the deployed commit
    Pinned(DeployedRevision),
    /// No tag matched; working copy stays on the branch tip
    NoReleaseTag,
    /// Pinning failed; working copy is on whatever was last checked out
    Failed(String),
}

impl PinningOutcome {
    /// Deployed revision, when pinned
    #[must_use]
    pub fn deployed(&self) -> Option<&DeployedRevision> {
        match self {
            Self::Pinned(revision) => Some(revision),
            _ => None,
        }
    }

    /// Non-fatal error for a failed pinning
    #[must_use]
    pub fn error(&self) -> Option<TriageError> {
        match self {
            Self::Failed(reason) => Some(TriageError::RevisionPinningFailed(reason.clone())),
            _ => None,
        }
    }
}

/// Synced working copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedRevision {
    /// Shared working copy
    pub codebase_dir: PathBuf,
    /// What pinning achieved
    pub pinning: PinningOutcome,
}

/// Checkout handed to one pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedCheckout {
    /// Directory the analysis reads
    pub path: PathBuf,
    /// Sync result the checkout was taken from
    pub revision: StagedRevision,
    worktree: bool,
}

impl StagedCheckout {
    /// Checkout is a per-run worktree that must be released
    #[inline]
    #[must_use]
    pub fn is_worktree(&self) -> bool {
        self.worktree
    }
}

/// Keeps the working copy in sync and pinned to the deployed revision
#[derive(Debug)]
pub struct RepositoryStager {
    git: GitCli,
    config: RepositoryConfig,
    lock: Mutex<()>,
}

impl RepositoryStager {
    /// Create stager
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, config: RepositoryConfig) -> Self {
        Self {
            git: GitCli::new(runner, config.git_timeout()),
            config,
            lock: Mutex::new(()),
        }
    }

    /// Shared working copy directory
    #[inline]
    #[must_use]
    pub fn codebase_dir(&self) -> &Path {
        &self.config.codebase_dir
    }

    /// Whether a working copy already exists
    #[must_use]
    pub fn has_working_copy(&self) -> bool {
        self.config.codebase_dir.join(".git").exists()
    }

    /// Sync the shared working copy and pin it
    ///
    /// # Errors
    /// `TriageError::RepositoryUnavailable` when clone or update fails.
    /// Pinning problems are reported in [`StagedRevision::pinning`].
    pub async fn ensure_pinned(
        &self,
        remote: &RepositoryRemote,
    ) -> Result<StagedRevision, TriageError> {
        let _guard = self.lock.lock().await;
        self.sync_and_pin(remote).await
    }

    /// Sync, pin and take a checkout for run `id`
    ///
    /// # Errors
    /// `TriageError::RepositoryUnavailable` when clone, update or worktree
    /// creation fails.
    pub async fn stage_for_run(
        &self,
        remote: &RepositoryRemote,
        id: &AnalysisId,
    ) -> Result<StagedCheckout, TriageError> {
        let _guard = self.lock.lock().await;
        let revision = self.sync_and_pin(remote).await?;

        if !self.config.isolate_runs {
            return Ok(StagedCheckout {
                path: revision.codebase_dir.clone(),
                revision,
                worktree: false,
            });
        }

        let path = self.worktree_path(id);
        self.create_worktree(&path).await.map_err(|e| {
            TriageError::RepositoryUnavailable(format!(
                "worktree {} not created: {}",
                path.display(),
                remote.scrub(&e.to_string())
            ))
        })?;
        tracing::info!("Created worktree {} for {}", path.display(), id);

        Ok(StagedCheckout {
            path,
            revision,
            worktree: true,
        })
    }

    /// Remove a run's worktree; shared checkouts are left alone
    ///
    /// Failures are logged, not returned.
    pub async fn release(&self, checkout: &StagedCheckout) {
        if !checkout.worktree {
            return;
        }
        let _guard = self.lock.lock().await;
        let dir = self.codebase_dir();
        if let Err(e) = self.git.worktree_remove(dir, &checkout.path).await {
            tracing::warn!("Worktree removal failed for {}: {}", checkout.path.display(), e);
            if let Err(e) = tokio::fs::remove_dir_all(&checkout.path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Could not delete {}: {}", checkout.path.display(), e);
                }
            }
            if let Err(e) = self.git.worktree_prune(dir).await {
                tracing::warn!("Worktree prune failed: {}", e);
            }
        } else {
            tracing::debug!("Removed worktree {}", checkout.path.display());
        }
    }

    /// Delete worktrees left behind by a previous process
    ///
    /// Run once at startup, before any pipeline is admitted.
    pub async fn sweep_stale_worktrees(&self) {
        let _guard = self.lock.lock().await;
        let root = absolute(&self.config.worktree_dir);
        match tokio::fs::remove_dir_all(&root).await {
            Ok(()) => tracing::info!("Removed stale worktrees under {}", root.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Could not clear {}: {}", root.display(), e),
        }
        if self.has_working_copy() {
            if let Err(e) = self.git.worktree_prune(self.codebase_dir()).await {
                tracing::warn!("Worktree prune failed: {}", e);
            }
        }
    }

    fn worktree_path(&self, id: &AnalysisId) -> PathBuf {
        absolute(&self.config.worktree_dir).join(id.as_str())
    }

    async fn create_worktree(&self, path: &Path) -> Result<(), GitError> {
        let dir = self.codebase_dir();
        self.git.worktree_prune(dir).await?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(triage_core::ProcessError::from)?;
        }
        self.git.worktree_add(dir, path).await
    }

    async fn sync_and_pin(&self, remote: &RepositoryRemote) -> Result<StagedRevision, TriageError> {
        self.sync(remote).await?;
        let pinning = self.pin().await;
        match &pinning {
            PinningOutcome::Pinned(revision) => {
                tracing::info!("Pinned working copy to deployed revision {}", revision);
            }
            PinningOutcome::NoReleaseTag => tracing::warn!(
                "No tag matches {}; analyzing branch tip of {}",
                self.config.release_tag_pattern,
                self.config.branch
            ),
            PinningOutcome::Failed(reason) => {
                tracing::warn!("Revision pinning failed, continuing on current HEAD: {}", reason);
            }
        }
        Ok(StagedRevision {
            codebase_dir: self.config.codebase_dir.clone(),
            pinning,
        })
    }

    async fn sync(&self, remote: &RepositoryRemote) -> Result<(), TriageError> {
        let dir = self.codebase_dir();
        let branch = &self.config.branch;
        let unavailable =
            |e: GitError| TriageError::RepositoryUnavailable(remote.scrub(&e.to_string()));

        if self.has_working_copy() {
            tracing::info!("Updating working copy {} ({})", dir.display(), branch);
            if let Err(e) = self.update(dir, branch).await {
                if self.git.has_head(dir).await {
                    return Err(unavailable(e));
                }
                tracing::warn!(
                    "Working copy {} has no HEAD, cloning again: {}",
                    dir.display(),
                    remote.scrub(&e.to_string())
                );
                tokio::fs::remove_dir_all(dir).await.map_err(|e| {
                    TriageError::RepositoryUnavailable(format!(
                        "broken working copy {} not removed: {}",
                        dir.display(),
                        e
                    ))
                })?;
                self.clone_into(remote, dir, branch).await.map_err(unavailable)?;
            }
        } else {
            self.clone_into(remote, dir, branch).await.map_err(unavailable)?;
        }

        // Local tags still allow pinning when the fetch fails
        if let Err(e) = self.git.fetch_tags(dir).await {
            tracing::warn!("Tag fetch failed: {}", remote.scrub(&e.to_string()));
        }
        Ok(())
    }

    async fn update(&self, dir: &Path, branch: &str) -> Result<(), GitError> {
        self.git.checkout(dir, branch).await?;
        self.git.pull_ff_only(dir, branch).await
    }

    async fn clone_into(
        &self,
        remote: &RepositoryRemote,
        dir: &Path,
        branch: &str,
    ) -> Result<(), GitError> {
        tracing::info!("Cloning {} ({}) into {}", remote, branch, dir.display());
        self.git
            .clone_branch(&remote.clone_url(), dir, branch, self.config.clone_depth)
            .await
    }

    async fn pin(&self) -> PinningOutcome {
        let dir = self.codebase_dir();
        let tag = match self.git.latest_tag(dir, &self.config.release_tag_pattern).await {
            Ok(Some(tag)) => tag,
            Ok(None) => return PinningOutcome::NoReleaseTag,
            Err(e) => return PinningOutcome::Failed(e.to_string()),
        };
        let commit = match self.git.commit_for_tag(dir, &tag).await {
            Ok(commit) if !commit.is_empty() => commit,
            Ok(_) => return PinningOutcome::Failed(format!("tag {tag} resolves to no commit")),
            Err(e) => return PinningOutcome::Failed(e.to_string()),
        };
        if let Err(e) = self.git.checkout(dir, &self.config.branch).await {
            return PinningOutcome::Failed(e.to_string());
        }
        if let Err(e) = self.git.checkout(dir, &commit).await {
            return PinningOutcome::Failed(e.to_string());
        }
        PinningOutcome::Pinned(DeployedRevision { tag, commit })
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
}
