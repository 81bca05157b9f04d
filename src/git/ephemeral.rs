//! Ephemeral bare clones used to stage a single commit.
//!
//! The clone lives in a fresh temporary directory that is removed when the
//! [`EphemeralClone`] is dropped, whether the promotion succeeded, failed or
//! unwound from a panic. Nothing is ever written to the caller's checkout.

use std::path::Path;

use git2::{AutotagOption, FetchOptions, Oid, PushOptions, Repository};
use tempfile::TempDir;
use tracing::debug;

use super::auth;
use super::deadline::{self, CallPolicy};
use crate::error::{PromoteError, Result};

/// Where fetched branches land inside the clone
pub fn tracking_ref(branch: &str) -> String {
    format!("refs/remotes/origin/{}", branch)
}

pub fn head_ref(branch: &str) -> String {
    format!("refs/heads/{}", branch)
}

/// A temporary bare repository, deleted on drop
pub struct EphemeralClone {
    dir: TempDir,
}

impl EphemeralClone {
    /// Create an empty bare repository in a new temporary directory
    pub fn create() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("git-promote-")
            .tempdir()?;
        Repository::init_bare(dir.path())?;
        debug!(path = %dir.path().display(), "created ephemeral clone");
        Ok(EphemeralClone { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Open the clone for local object work (no network)
    pub fn open(&self) -> Result<Repository> {
        Ok(Repository::open_bare(self.dir.path())?)
    }

    /// Fetch one remote branch and return its tip.
    ///
    /// Fails with `BranchNotFound` when the remote does not advertise it.
    pub fn fetch_branch(&self, url: &str, branch: &str, policy: &CallPolicy) -> Result<Oid> {
        let path = self.dir.path().to_path_buf();
        let url = url.to_string();
        let branch = branch.to_string();
        let operation = format!("fetching '{}'", branch);
        deadline::query(&operation, policy, move || fetch_into(&path, &url, &branch))
    }

    /// Point `refs/heads/{branch}` inside the clone at `commit`
    pub fn set_branch(&self, branch: &str, commit: Oid) -> Result<()> {
        let repo = self.open()?;
        repo.reference(&head_ref(branch), commit, true, "git-promote: stage")?;
        Ok(())
    }

    /// Force-push `refs/heads/{branch}` to the remote.
    ///
    /// Runs under the deadline but is never retried. A ref update the remote
    /// refuses is reported as `MutationAborted`; transport failures as
    /// `RemoteUnreachable`.
    pub fn push_branch(&self, url: &str, branch: &str, policy: &CallPolicy) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        let url = url.to_string();
        let branch = branch.to_string();
        let operation = format!("pushing '{}'", branch);
        deadline::with_deadline(&operation, policy.timeout, move || {
            push_from(&path, &url, &branch)
        })
    }
}

fn fetch_into(path: &Path, url: &str, branch: &str) -> Result<Oid> {
    let repo = Repository::open_bare(path)?;
    let mut remote = repo
        .remote_anonymous(url)
        .map_err(|e| PromoteError::unreachable(format!("{}: {}", url, e.message())))?;

    let mut options = FetchOptions::new();
    options.remote_callbacks(auth::remote_callbacks());
    options.download_tags(AutotagOption::None);

    let refspec = format!("+{}:{}", head_ref(branch), tracking_ref(branch));
    remote
        .fetch(&[refspec.as_str()], Some(&mut options), None)
        .map_err(|e| {
            PromoteError::unreachable(format!(
                "fetch of '{}' from {} failed: {}",
                branch,
                url,
                e.message()
            ))
        })?;

    repo.refname_to_id(&tracking_ref(branch))
        .map_err(|_| PromoteError::BranchNotFound(branch.to_string()))
}

fn push_from(path: &Path, url: &str, branch: &str) -> Result<()> {
    let repo = Repository::open_bare(path)?;
    let mut remote = repo
        .remote_anonymous(url)
        .map_err(|e| PromoteError::unreachable(format!("{}: {}", url, e.message())))?;

    let refspec = format!("+{0}:{0}", head_ref(branch));
    let mut rejection: Option<String> = None;

    let outcome = {
        let mut callbacks = auth::remote_callbacks();
        callbacks.push_update_reference(|refname, status| match status {
            Some(status) => {
                rejection = Some(format!("{}: {}", refname, status));
                Err(git2::Error::from_str(&format!("push rejected for {}", refname)))
            }
            None => Ok(()),
        });

        let mut options = PushOptions::new();
        options.remote_callbacks(callbacks);
        remote.push(&[refspec.as_str()], Some(&mut options))
    };

    match (outcome, rejection) {
        (_, Some(reason)) => Err(PromoteError::aborted("publish", reason)),
        (Err(e), None) => Err(PromoteError::unreachable(format!(
            "push of '{}' to {} failed: {}",
            branch,
            url,
            e.message()
        ))),
        (Ok(()), None) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_removed_on_drop() {
        let clone = EphemeralClone::create().unwrap();
        let path = clone.path().to_path_buf();
        assert!(path.join("HEAD").exists());
        assert!(clone.open().unwrap().is_bare());
        drop(clone);
        assert!(!path.exists());
    }

    #[test]
    fn test_fetch_from_missing_remote_is_unreachable() {
        let clone = EphemeralClone::create().unwrap();
        let missing = clone.path().join("no-such-remote");
        let policy = CallPolicy::new(
            std::time::Duration::from_secs(10),
            0,
            std::time::Duration::from_millis(1),
        );
        let err = clone
            .fetch_branch(missing.to_str().unwrap(), "dev", &policy)
            .unwrap_err();
        assert!(matches!(err, PromoteError::RemoteUnreachable(_)));
    }

    #[test]
    fn test_ref_names() {
        assert_eq!(head_ref("beta"), "refs/heads/beta");
        assert_eq!(tracking_ref("beta"), "refs/remotes/origin/beta");
    }
}
