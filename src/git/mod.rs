//! Remote repository access layer
//!
//! Everything git-promote knows about a channel comes from the remote: the
//! caller's checkout is only used to find the remote URL and, for dev
//! releases, the files to publish.
//!
//! # Overview
//!
//! Two traits split reading from writing:
//!
//! - [RemoteRepository]: read-only queries (which branches exist, tip commits
//!   and their messages)
//! - [RemoteMutator]: the two-phase rewrite that publishes a promotion or a dev
//!   release through an [ephemeral::EphemeralClone]
//!
//! [remote::Git2Remote] and [mutator::Git2Mutator] implement them with `git2`;
//! [mock::MockRemote] implements both in memory for tests.
//!
//! # Usage
//!
//! ```rust,no_run
//! # use git_promote::git::{Git2Remote, RemoteRepository, RepoEndpoint};
//! # use git_promote::git::deadline::CallPolicy;
//! # fn example() -> git_promote::Result<()> {
//! let endpoint = RepoEndpoint::new("https://example.com/project.git", true);
//! let remote = Git2Remote::new(endpoint, CallPolicy::default())?;
//! if let Some(version) = remote.latest_version("beta")? {
//!     println!("beta is at {}", version);
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod deadline;
pub mod ephemeral;
pub mod mock;
pub mod mutator;
pub mod remote;
pub mod snapshot;

pub use mock::MockRemote;
pub use mutator::Git2Mutator;
pub use remote::Git2Remote;
pub use snapshot::WorkingTreeSnapshot;

use crate::domain::{message, PromotionPlan, Version};
use crate::error::{PromoteError, Result};
use git2::Oid;

/// Where the remote lives, as resolved from the caller's checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoEndpoint {
    pub remote_url: String,
    pub is_repo: bool,
}

impl RepoEndpoint {
    pub fn new(remote_url: impl Into<String>, is_repo: bool) -> Self {
        RepoEndpoint {
            remote_url: remote_url.into(),
            is_repo,
        }
    }

    /// Both preconditions for talking to the remote
    pub fn validate(&self) -> Result<()> {
        if !self.is_repo {
            return Err(PromoteError::precondition(
                "Not inside a git repository",
            ));
        }
        if self.remote_url.trim().is_empty() {
            return Err(PromoteError::precondition(
                "No remote URL configured for this repository",
            ));
        }
        Ok(())
    }
}

/// Proof that a publish reached the remote and was verified there
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub branch: String,
    pub commit: Oid,
    /// Tip before the publish; `None` when the branch was created
    pub previous: Option<Oid>,
    pub version: Version,
}

impl PublishReceipt {
    pub fn created_branch(&self) -> bool {
        self.previous.is_none()
    }
}

/// A request to publish the caller's working tree as the next dev version
#[derive(Debug, Clone)]
pub struct DevRelease {
    pub version: Version,
    pub title: String,
    pub description: String,
    pub snapshot: WorkingTreeSnapshot,
}

/// Read-only queries against the remote.
///
/// ## Thread Safety
///
/// All implementors must be `Send + Sync`.
///
/// ## Error Handling
///
/// A branch that does not exist is an ordinary answer (`Ok(None)` or
/// `Ok(false)`), never an error. Transport failures surface as
/// [PromoteError::RemoteUnreachable] or [PromoteError::Timeout].
pub trait RemoteRepository: Send + Sync {
    /// Tip commit of `branch`, or `None` when the remote does not advertise it
    fn branch_tip(&self, branch: &str) -> Result<Option<Oid>>;

    /// True iff the remote advertises `refs/heads/{branch}`
    fn branch_exists(&self, branch: &str) -> Result<bool> {
        Ok(self.branch_tip(branch)?.is_some())
    }

    /// Full message of the tip commit of `branch`, or `None` when it does not exist
    fn latest_commit_message(&self, branch: &str) -> Result<Option<String>>;

    /// Version tag on the first line of `message`, if any
    fn extract_version(&self, message: &str) -> Option<Version> {
        message::extract_version(message)
    }

    /// Version carried by the tip of `branch`
    fn latest_version(&self, branch: &str) -> Result<Option<Version>> {
        Ok(self
            .latest_commit_message(branch)?
            .and_then(|msg| self.extract_version(&msg)))
    }
}

/// Remote-visible changes.
///
/// Implementations stage the new commit away from the caller's checkout and
/// publish it with a single forced ref update. Either the destination ref ends
/// at the new commit or it is left untouched ([PromoteError::MutationAborted]);
/// the only exception is a push whose outcome cannot be confirmed
/// ([PromoteError::MutationPartial]).
pub trait RemoteMutator: Send + Sync {
    /// Rewrite the destination channel of `plan` from its source channel's tip
    fn apply_promotion(&self, plan: &PromotionPlan) -> Result<PublishReceipt>;

    /// Publish a snapshot of the working tree as the next dev version
    fn publish_dev_release(&self, release: &DevRelease) -> Result<PublishReceipt>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_requires_repository() {
        let err = RepoEndpoint::new("git@host:repo.git", false)
            .validate()
            .unwrap_err();
        assert!(matches!(err, PromoteError::Precondition(_)));
    }

    #[test]
    fn test_endpoint_requires_url() {
        assert!(RepoEndpoint::new("  ", true).validate().is_err());
        assert!(RepoEndpoint::new("git@host:repo.git", true)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_receipt_created_branch() {
        let receipt = PublishReceipt {
            branch: "beta".to_string(),
            commit: Oid::from_bytes(&[3; 20]).unwrap(),
            previous: None,
            version: Version::parse("v1.0.0-beta.1").unwrap(),
        };
        assert!(receipt.created_branch());
    }
}
