use crate::domain::{message, ChannelMap, PromotionPlan, StageKind, Version};
use crate::error::{PromoteError, Result};
use crate::git::{DevRelease, PublishReceipt, RemoteMutator, RemoteRepository};
use git2::Oid;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A commit as the mock remote records it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCommit {
    pub id: Oid,
    pub message: String,
    pub tree: Oid,
    pub parents: Vec<Oid>,
}

#[derive(Debug, Default)]
struct MockState {
    branches: HashMap<String, MockCommit>,
    next_id: u32,
    reject_pushes: bool,
    fail_verification: bool,
    unreachable: bool,
    push_count: usize,
}

impl MockState {
    fn fresh_oid(&mut self) -> Oid {
        self.next_id += 1;
        let mut bytes = [0u8; 20];
        bytes[16..].copy_from_slice(&self.next_id.to_be_bytes());
        Oid::from_bytes(&bytes).unwrap_or_else(|_| Oid::zero())
    }
}

/// In-memory remote for testing without network or repositories.
///
/// Clones share state, so a test can keep one handle for inspection while the
/// promoter owns another as both reader and mutator.
#[derive(Debug, Clone, Default)]
pub struct MockRemote {
    state: Arc<Mutex<MockState>>,
    channels: ChannelMap,
}

impl MockRemote {
    /// Create an empty mock remote with default channel branches
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channels(channels: ChannelMap) -> Self {
        MockRemote {
            state: Arc::default(),
            channels,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Builder form of [MockRemote::set_branch]
    pub fn with_branch(self, branch: &str, message: &str) -> Self {
        self.set_branch(branch, message);
        self
    }

    /// Put a new root commit with `message` at the tip of `branch`
    pub fn set_branch(&self, branch: &str, message: &str) -> Oid {
        let mut state = self.lock();
        let id = state.fresh_oid();
        let tree = state.fresh_oid();
        state.branches.insert(
            branch.to_string(),
            MockCommit {
                id,
                message: message.to_string(),
                tree,
                parents: Vec::new(),
            },
        );
        id
    }

    /// Tip commit of `branch`, for assertions
    pub fn commit(&self, branch: &str) -> Option<MockCommit> {
        self.lock().branches.get(branch).cloned()
    }

    /// Make every push fail as a rejected ref update
    pub fn reject_pushes(&self, reject: bool) {
        self.lock().reject_pushes = reject;
    }

    /// Let pushes land but report them as unverifiable
    pub fn fail_verification(&self, fail: bool) {
        self.lock().fail_verification = fail;
    }

    /// Fail every call as a transport error
    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock().unreachable = unreachable;
    }

    /// Number of pushes that reached the remote
    pub fn push_count(&self) -> usize {
        self.lock().push_count
    }

    fn check_reachable(state: &MockState) -> Result<()> {
        if state.unreachable {
            return Err(PromoteError::unreachable("mock remote is offline"));
        }
        Ok(())
    }

    fn push(
        &self,
        state: &mut MockState,
        branch: &str,
        commit: MockCommit,
        version: Version,
    ) -> Result<PublishReceipt> {
        if state.reject_pushes {
            return Err(PromoteError::aborted(
                "publish",
                format!("refs/heads/{}: rejected by mock remote", branch),
            ));
        }

        let id = commit.id;
        let previous = state
            .branches
            .insert(branch.to_string(), commit)
            .map(|old| old.id);
        state.push_count += 1;

        if state.fail_verification {
            return Err(PromoteError::MutationPartial {
                branch: branch.to_string(),
                expected: id.to_string(),
                reason: "mock remote could not be re-read".to_string(),
            });
        }

        Ok(PublishReceipt {
            branch: branch.to_string(),
            commit: id,
            previous,
            version,
        })
    }
}

impl RemoteRepository for MockRemote {
    fn branch_tip(&self, branch: &str) -> Result<Option<Oid>> {
        let state = self.lock();
        Self::check_reachable(&state)?;
        Ok(state.branches.get(branch).map(|commit| commit.id))
    }

    fn latest_commit_message(&self, branch: &str) -> Result<Option<String>> {
        let state = self.lock();
        Self::check_reachable(&state)?;
        Ok(state.branches.get(branch).map(|commit| commit.message.clone()))
    }
}

impl RemoteMutator for MockRemote {
    fn apply_promotion(&self, plan: &PromotionPlan) -> Result<PublishReceipt> {
        let mut state = self.lock();
        Self::check_reachable(&state).map_err(|e| PromoteError::aborted("fetch", e.to_string()))?;

        let source_branch = self.channels.branch(plan.from);
        let source = state.branches.get(source_branch).cloned().ok_or_else(|| {
            PromoteError::aborted("fetch", format!("branch '{}' not found", source_branch))
        })?;

        if message::extract_version(&source.message) != Some(plan.old_version) {
            return Err(PromoteError::aborted(
                "stale-check",
                format!("'{}' no longer carries {}", source_branch, plan.old_version),
            ));
        }

        let commit = MockCommit {
            id: state.fresh_oid(),
            message: message::promotion_message(&plan.new_version, &plan.old_version),
            tree: source.tree,
            parents: source.parents,
        };
        self.push(&mut state, self.channels.branch(plan.to), commit, plan.new_version)
    }

    fn publish_dev_release(&self, release: &DevRelease) -> Result<PublishReceipt> {
        if release.version.stage.map(|stage| stage.kind) != Some(StageKind::Dev) {
            return Err(PromoteError::precondition(format!(
                "{} is not a dev version",
                release.version
            )));
        }

        let mut state = self.lock();
        Self::check_reachable(&state).map_err(|e| PromoteError::aborted("fetch", e.to_string()))?;

        let branch = self.channels.dev.as_str();
        let parents = state
            .branches
            .get(branch)
            .map(|tip| vec![tip.id])
            .unwrap_or_default();
        let commit = MockCommit {
            id: state.fresh_oid(),
            message: message::dev_release_message(
                &release.version,
                &release.title,
                &release.description,
            ),
            tree: state.fresh_oid(),
            parents,
        };
        self.push(&mut state, branch, commit, release.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::planner;
    use crate::git::WorkingTreeSnapshot;

    fn v(text: &str) -> Version {
        Version::parse(text).unwrap()
    }

    #[test]
    fn test_mock_branches() {
        let remote = MockRemote::new().with_branch("dev", "v1.0.0-dev.1 start");
        assert!(remote.branch_exists("dev").unwrap());
        assert!(!remote.branch_exists("beta").unwrap());
        assert_eq!(remote.latest_version("dev").unwrap(), Some(v("v1.0.0-dev.1")));
        assert_eq!(remote.latest_commit_message("beta").unwrap(), None);
    }

    #[test]
    fn test_mock_oids_are_distinct() {
        let remote = MockRemote::new();
        let a = remote.set_branch("dev", "v1.0.0-dev.1");
        let b = remote.set_branch("beta", "v1.0.0-beta.1");
        assert_ne!(a, b);
    }

    #[test]
    fn test_mock_promotion_keeps_tree() {
        let remote = MockRemote::new().with_branch("dev", "v2.0.0-dev.3 work");
        let plan = planner::plan_promotions(Some(&v("v2.0.0-dev.3")), None)
            .unwrap()
            .remove(0);

        let receipt = remote.apply_promotion(&plan).unwrap();
        assert!(receipt.created_branch());

        let beta = remote.commit("beta").unwrap();
        assert_eq!(beta.tree, remote.commit("dev").unwrap().tree);
        assert_eq!(beta.message, "v2.0.0-beta.1\n\nupdate from\nv2.0.0-dev.3");
        assert_eq!(remote.push_count(), 1);
    }

    #[test]
    fn test_mock_rejected_push_leaves_branch() {
        let remote = MockRemote::new()
            .with_branch("dev", "v2.0.0-dev.3 work")
            .with_branch("beta", "v1.0.0-beta.1");
        let before = remote.commit("beta").unwrap();
        remote.reject_pushes(true);

        let plan = planner::plan_promotions(Some(&v("v2.0.0-dev.3")), None)
            .unwrap()
            .remove(0);
        let err = remote.apply_promotion(&plan).unwrap_err();
        assert!(matches!(err, PromoteError::MutationAborted { .. }));
        assert_eq!(remote.commit("beta").unwrap(), before);
        assert_eq!(remote.push_count(), 0);
    }

    #[test]
    fn test_mock_dev_release_chains_parent() {
        let remote = MockRemote::new();
        let first = remote.set_branch("dev", "v1.0.0-dev.1 start");
        let release = DevRelease {
            version: v("v1.0.0-dev.2"),
            title: "Next".to_string(),
            description: String::new(),
            snapshot: WorkingTreeSnapshot::new("/tmp", Vec::new()),
        };

        remote.publish_dev_release(&release).unwrap();
        let tip = remote.commit("dev").unwrap();
        assert_eq!(tip.parents, vec![first]);
        assert_eq!(tip.message, "v1.0.0-dev.2 Next\n\nNo description");
    }

    #[test]
    fn test_mock_unreachable() {
        let remote = MockRemote::new();
        remote.set_unreachable(true);
        assert!(matches!(
            remote.branch_exists("dev").unwrap_err(),
            PromoteError::RemoteUnreachable(_)
        ));
    }
}
