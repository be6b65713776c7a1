//! Triage Repo - staging the analyzed repository
//!
//! Keeps a shared local working copy in sync with the remote and pins it to
//! the most recent production-release tag:
//! - [`RepositoryRemote`]: where to clone from, with credential redaction
//! - [`GitCli`]: the `git` subcommands the stager needs
//! - [`RepositoryStager`]: serialized sync/pin plus per-run worktrees

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod git;
pub mod remote;
pub mod stager;

pub use git::{GitCli, GitError};
pub use remote::RepositoryRemote;
pub use stager::{PinningOutcome, RepositoryStager, StagedCheckout, StagedRevision};
