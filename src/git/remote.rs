use std::collections::HashMap;

use git2::{Direction, Oid, Remote};
use tracing::debug;

use super::auth;
use super::deadline::{self, CallPolicy};
use super::ephemeral::EphemeralClone;
use super::{RemoteRepository, RepoEndpoint};
use crate::error::{PromoteError, Result};

const HEADS_PREFIX: &str = "refs/heads/";

/// Branch heads advertised by the remote at `url`, keyed by short branch name.
///
/// One connection, no objects transferred; the equivalent of
/// `git ls-remote --heads`.
pub(crate) fn list_remote_heads(url: &str) -> Result<HashMap<String, Oid>> {
    let mut remote = Remote::create_detached(url)
        .map_err(|e| PromoteError::unreachable(format!("{}: {}", url, e.message())))?;

    let connection = remote
        .connect_auth(Direction::Fetch, Some(auth::remote_callbacks()), None)
        .map_err(|e| {
            PromoteError::unreachable(format!("cannot connect to {}: {}", url, e.message()))
        })?;

    let heads = connection
        .list()
        .map_err(|e| PromoteError::unreachable(format!("cannot list {}: {}", url, e.message())))?
        .iter()
        .filter_map(|head| {
            head.name()
                .strip_prefix(HEADS_PREFIX)
                .map(|branch| (branch.to_string(), head.oid()))
        })
        .collect();

    Ok(heads)
}

/// [RemoteRepository] backed by libgit2 network calls.
///
/// Each query opens its own connection; nothing is cached between calls, so
/// every answer reflects the remote at the time it was asked.
pub struct Git2Remote {
    endpoint: RepoEndpoint,
    policy: CallPolicy,
}

impl Git2Remote {
    /// Fails with a precondition error when the endpoint is unusable
    pub fn new(endpoint: RepoEndpoint, policy: CallPolicy) -> Result<Self> {
        endpoint.validate()?;
        Ok(Git2Remote { endpoint, policy })
    }

    pub fn url(&self) -> &str {
        &self.endpoint.remote_url
    }

    /// All advertised branch heads, with deadline and retry applied
    pub fn list_heads(&self) -> Result<HashMap<String, Oid>> {
        let url = self.endpoint.remote_url.clone();
        deadline::query("listing remote heads", &self.policy, move || {
            list_remote_heads(&url)
        })
    }
}

impl RemoteRepository for Git2Remote {
    fn branch_tip(&self, branch: &str) -> Result<Option<Oid>> {
        Ok(self.list_heads()?.get(branch).copied())
    }

    /// One fetch into a scratch repository; a branch the remote does not
    /// advertise fetches nothing and reads as `None`.
    fn latest_commit_message(&self, branch: &str) -> Result<Option<String>> {
        let clone = EphemeralClone::create()?;
        let tip = match clone.fetch_branch(self.url(), branch, &self.policy) {
            Ok(tip) => tip,
            Err(PromoteError::BranchNotFound(_)) => {
                debug!(branch, "branch not advertised by remote");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let repo = clone.open()?;
        let commit = repo.find_commit(tip)?;
        let message = String::from_utf8_lossy(commit.message_bytes()).into_owned();
        debug!(branch, tip = %tip, "read tip commit message");
        Ok(Some(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::{Repository, Signature};
    use tempfile::TempDir;

    fn remote_with_branch(branch: &str, message: &str) -> (TempDir, Oid) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init_bare(dir.path()).unwrap();
        let sig = Signature::now("Test", "test@example.com").unwrap();
        let tree_id = repo.treebuilder(None).unwrap().write().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let oid = repo
            .commit(
                Some(&format!("refs/heads/{}", branch)),
                &sig,
                &sig,
                message,
                &tree,
                &[],
            )
            .unwrap();
        (dir, oid)
    }

    fn remote_for(dir: &TempDir) -> Git2Remote {
        let endpoint = RepoEndpoint::new(dir.path().to_str().unwrap(), true);
        Git2Remote::new(endpoint, CallPolicy::default()).unwrap()
    }

    #[test]
    fn test_new_rejects_missing_repo() {
        let endpoint = RepoEndpoint::new("/nowhere", false);
        assert!(Git2Remote::new(endpoint, CallPolicy::default()).is_err());
    }

    #[test]
    fn test_branch_exists_and_tip() {
        let (dir, oid) = remote_with_branch("dev", "v1.0.0-dev.1 first");
        let remote = remote_for(&dir);

        assert!(remote.branch_exists("dev").unwrap());
        assert!(!remote.branch_exists("beta").unwrap());
        assert_eq!(remote.branch_tip("dev").unwrap(), Some(oid));
    }

    #[test]
    fn test_latest_commit_message_and_version() {
        let (dir, _) = remote_with_branch("beta", "v2.0.0-beta.2\n\nupdate from\nv2.0.0-dev.3");
        let remote = remote_for(&dir);

        let message = remote.latest_commit_message("beta").unwrap().unwrap();
        assert!(message.starts_with("v2.0.0-beta.2"));
        assert_eq!(
            remote.latest_version("beta").unwrap().unwrap().to_string(),
            "v2.0.0-beta.2"
        );
    }

    #[test]
    fn test_missing_branch_is_not_an_error() {
        let (dir, _) = remote_with_branch("dev", "v1.0.0-dev.1 first");
        let remote = remote_for(&dir);
        assert_eq!(remote.latest_commit_message("main").unwrap(), None);
        assert_eq!(remote.latest_version("main").unwrap(), None);
    }

    #[test]
    fn test_unreachable_remote_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("gone.git");
        let endpoint = RepoEndpoint::new(missing.to_str().unwrap(), true);
        let policy = CallPolicy::new(
            std::time::Duration::from_secs(10),
            0,
            std::time::Duration::from_millis(1),
        );
        let remote = Git2Remote::new(endpoint, policy).unwrap();
        let err = remote.branch_exists("dev").unwrap_err();
        assert!(matches!(err, PromoteError::RemoteUnreachable(_)));
    }
}
