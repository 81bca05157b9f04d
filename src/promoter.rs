//! Promotion facade
//!
//! Ties the read side, the planner and the mutator together. Every call
//! re-reads the remote; nothing is cached between calls, so each promotion is
//! planned and applied against the remote's current state.

use tracing::{debug, info};

use crate::config::PolicyConfig;
use crate::domain::{
    message, planner, transition, Channel, ChannelMap, PromotionPlan, Stage, StageKind, Version,
};
use crate::error::{PromoteError, Result};
use crate::git::{DevRelease, PublishReceipt, RemoteMutator, RemoteRepository};

/// What a channel currently holds on the remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelStatus {
    pub channel: Channel,
    pub branch: String,
    pub exists: bool,
    pub version: Option<Version>,
    /// First line of the tip commit message
    pub first_line: Option<String>,
}

/// First version of a dev line started from `base`
fn first_dev_version(base: &Version) -> Version {
    base.release().with_stage(Stage::first(StageKind::Dev))
}

/// Next dev version for `base_text` given the dev baseline.
///
/// Without a baseline (no dev branch yet) any release-form base starts a new
/// line at `dev.1`.
pub fn derive_dev_version(baseline: Option<&Version>, base_text: &str) -> Result<Version> {
    match baseline {
        Some(current) => transition::next_dev_version(current, base_text),
        None => Ok(first_dev_version(&transition::parse_base(base_text)?)),
    }
}

pub struct Promoter<R, M> {
    remote: R,
    mutator: M,
    channels: ChannelMap,
    policy: PolicyConfig,
}

impl<R: RemoteRepository, M: RemoteMutator> Promoter<R, M> {
    pub fn new(remote: R, mutator: M, channels: ChannelMap, policy: PolicyConfig) -> Self {
        Promoter {
            remote,
            mutator,
            channels,
            policy,
        }
    }

    pub fn channels(&self) -> &ChannelMap {
        &self.channels
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Version on the tip of `channel`'s branch; `None` when the branch is
    /// missing or its tip carries no version tag
    pub fn channel_version(&self, channel: Channel) -> Result<Option<Version>> {
        self.remote.latest_version(self.channels.branch(channel))
    }

    /// Status of every channel, in dev, beta, main order
    pub fn channel_status(&self) -> Result<Vec<ChannelStatus>> {
        Channel::ALL
            .iter()
            .map(|&channel| {
                let branch = self.channels.branch(channel).to_string();
                let tip_message = self.remote.latest_commit_message(&branch)?;
                Ok(ChannelStatus {
                    channel,
                    exists: tip_message.is_some(),
                    version: tip_message
                        .as_deref()
                        .and_then(|msg| self.remote.extract_version(msg)),
                    first_line: tip_message
                        .as_deref()
                        .map(|msg| message::first_line(msg).to_string()),
                    branch,
                })
            })
            .collect()
    }

    /// Every promotion the remote currently allows.
    ///
    /// An empty list means nothing to promote; a missing dev or beta branch is
    /// not an error.
    pub fn list_available_promotions(&self) -> Result<Vec<PromotionPlan>> {
        let dev = self.channel_version(Channel::Dev)?;
        let beta = self.channel_version(Channel::Beta)?;
        debug!(
            dev = ?dev.map(|v| v.to_string()),
            beta = ?beta.map(|v| v.to_string()),
            "resolved channel versions"
        );
        planner::plan_promotions(dev.as_ref(), beta.as_ref())
    }

    /// Refuse a release that does not move main forward
    pub fn check_release_guard(&self, plan: &PromotionPlan) -> Result<()> {
        if plan.to != Channel::Main || !self.policy.require_release_increase {
            return Ok(());
        }
        match self.channel_version(Channel::Main)? {
            Some(current) if plan.new_version <= current => Err(PromoteError::ReleaseRegression {
                candidate: plan.new_version.to_string(),
                current: current.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Publish `plan` on the remote.
    ///
    /// The destination is only modified when the mutator reports success; see
    /// [RemoteMutator] for the failure classes.
    pub fn apply_promotion(&self, plan: &PromotionPlan) -> Result<PublishReceipt> {
        if plan.from.downstream() != Some(plan.to) {
            return Err(PromoteError::precondition(format!(
                "Cannot promote {} to {}",
                plan.from, plan.to
            )));
        }
        self.check_release_guard(plan)?;

        info!(%plan, "applying promotion");
        let receipt = self.mutator.apply_promotion(plan)?;
        info!(branch = %receipt.branch, commit = %receipt.commit, "promotion published");
        Ok(receipt)
    }

    /// Version on the dev channel, required to exist
    pub fn current_dev_version(&self) -> Result<Version> {
        let branch = self.channels.branch(Channel::Dev);
        let tip_message = self
            .remote
            .latest_commit_message(branch)?
            .ok_or_else(|| PromoteError::BranchNotFound(branch.to_string()))?;
        self.remote
            .extract_version(&tip_message)
            .ok_or_else(|| PromoteError::VersionNotFound {
                branch: branch.to_string(),
                first_line: message::first_line(&tip_message).to_string(),
            })
    }

    /// Current dev version, or `None` when the dev branch does not exist yet
    pub fn dev_baseline(&self) -> Result<Option<Version>> {
        match self.current_dev_version() {
            Ok(version) => Ok(Some(version)),
            Err(PromoteError::BranchNotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Derive the next dev version from user-supplied base text
    pub fn next_dev_version(&self, base_text: &str) -> Result<Version> {
        derive_dev_version(self.dev_baseline()?.as_ref(), base_text)
    }

    /// Publish a working-tree snapshot as the next dev version.
    ///
    /// The requested version must still be a legal successor of the remote's
    /// current dev version.
    pub fn publish_dev_release(&self, release: &DevRelease) -> Result<PublishReceipt> {
        let base = release.version.release();
        let expected = match self.dev_baseline()? {
            Some(current) => {
                let relation = transition::validate_base(&current, &base)?;
                transition::derive_next(&current, &base, relation)?
            }
            None => first_dev_version(&base),
        };
        if expected != release.version {
            return Err(PromoteError::precondition(format!(
                "Dev moved since the version was chosen: expected {}, requested {}",
                expected, release.version
            )));
        }

        info!(version = %release.version, title = %release.title, "publishing dev release");
        let receipt = self.mutator.publish_dev_release(release)?;
        info!(branch = %receipt.branch, commit = %receipt.commit, "dev release published");
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::{MockRemote, WorkingTreeSnapshot};

    fn v(text: &str) -> Version {
        Version::parse(text).unwrap()
    }

    fn promoter(remote: &MockRemote) -> Promoter<MockRemote, MockRemote> {
        Promoter::new(
            remote.clone(),
            remote.clone(),
            ChannelMap::default(),
            PolicyConfig::default(),
        )
    }

    fn release(version: &str) -> DevRelease {
        DevRelease {
            version: v(version),
            title: "Work".to_string(),
            description: String::new(),
            snapshot: WorkingTreeSnapshot::new("/tmp", Vec::new()),
        }
    }

    #[test]
    fn test_nothing_to_promote() {
        let remote = MockRemote::new().with_branch("main", "v1.0.0");
        assert!(promoter(&remote).list_available_promotions().unwrap().is_empty());
    }

    #[test]
    fn test_untagged_dev_offers_nothing() {
        let remote = MockRemote::new().with_branch("dev", "Merge branch 'feature'");
        assert!(promoter(&remote).list_available_promotions().unwrap().is_empty());
    }

    #[test]
    fn test_dev_to_beta_end_to_end() {
        let remote = MockRemote::new()
            .with_branch("dev", "v2.0.0-dev.3 work")
            .with_branch("beta", "v2.0.0-beta.1\n\nupdate from\nv2.0.0-dev.1");
        let promoter = promoter(&remote);

        let plans = promoter.list_available_promotions().unwrap();
        assert_eq!(plans.len(), 2);
        let receipt = promoter.apply_promotion(&plans[0]).unwrap();

        assert_eq!(receipt.version, v("v2.0.0-beta.2"));
        let beta = remote.commit("beta").unwrap();
        assert_eq!(beta.message, "v2.0.0-beta.2\n\nupdate from\nv2.0.0-dev.3");
        assert_eq!(beta.tree, remote.commit("dev").unwrap().tree);
        assert_eq!(
            promoter.channel_version(Channel::Beta).unwrap(),
            Some(v("v2.0.0-beta.2"))
        );
    }

    #[test]
    fn test_beta_to_main_creates_branch() {
        let remote = MockRemote::new().with_branch("beta", "v2.0.0-beta.2");
        let promoter = promoter(&remote);

        let plans = promoter.list_available_promotions().unwrap();
        assert_eq!(plans.len(), 1);
        let receipt = promoter.apply_promotion(&plans[0]).unwrap();
        assert!(receipt.created_branch());
        assert_eq!(
            remote.commit("main").unwrap().message,
            "v2.0.0\n\nupdate from\nv2.0.0-beta.2"
        );
    }

    #[test]
    fn test_failed_push_leaves_destination() {
        let remote = MockRemote::new()
            .with_branch("dev", "v2.0.0-dev.3 work")
            .with_branch("beta", "v1.0.0-beta.1");
        let promoter = promoter(&remote);
        let before = remote.commit("beta").unwrap();
        remote.reject_pushes(true);

        let plan = &promoter.list_available_promotions().unwrap()[0];
        let err = promoter.apply_promotion(plan).unwrap_err();
        assert!(matches!(err, PromoteError::MutationAborted { .. }));
        assert_eq!(remote.commit("beta").unwrap(), before);
    }

    #[test]
    fn test_unverified_push_is_partial() {
        let remote = MockRemote::new().with_branch("dev", "v1.1.0-dev.1 work");
        let promoter = promoter(&remote);
        remote.fail_verification(true);

        let plan = &promoter.list_available_promotions().unwrap()[0];
        let err = promoter.apply_promotion(plan).unwrap_err();
        assert!(err.is_partial());
    }

    #[test]
    fn test_stale_plan_aborts() {
        let remote = MockRemote::new().with_branch("dev", "v2.0.0-dev.3 work");
        let promoter = promoter(&remote);
        let plan = promoter.list_available_promotions().unwrap().remove(0);

        remote.set_branch("dev", "v2.0.0-dev.4 more work");
        let err = promoter.apply_promotion(&plan).unwrap_err();
        assert!(matches!(
            err,
            PromoteError::MutationAborted { ref stage, .. } if stage == "stale-check"
        ));
        assert!(remote.commit("beta").is_none());
    }

    #[test]
    fn test_release_guard_blocks_regression() {
        let remote = MockRemote::new()
            .with_branch("beta", "v1.0.0-beta.3")
            .with_branch("main", "v1.2.0");
        let promoter = promoter(&remote);
        let plan = &promoter.list_available_promotions().unwrap()[0];

        let err = promoter.apply_promotion(plan).unwrap_err();
        assert!(matches!(err, PromoteError::ReleaseRegression { .. }));
        assert_eq!(remote.push_count(), 0);
    }

    #[test]
    fn test_release_guard_can_be_disabled() {
        let remote = MockRemote::new()
            .with_branch("beta", "v1.0.0-beta.3")
            .with_branch("main", "v1.0.0");
        let promoter = Promoter::new(
            remote.clone(),
            remote.clone(),
            ChannelMap::default(),
            PolicyConfig {
                require_release_increase: false,
            },
        );
        let plan = &promoter.list_available_promotions().unwrap()[0];
        assert!(promoter.apply_promotion(plan).is_ok());
    }

    #[test]
    fn test_rejects_skipping_channels() {
        let remote = MockRemote::new().with_branch("dev", "v1.0.0-dev.1");
        let plan = PromotionPlan {
            from: Channel::Dev,
            to: Channel::Main,
            old_version: v("v1.0.0-dev.1"),
            new_version: v("v1.0.0"),
        };
        let err = promoter(&remote).apply_promotion(&plan).unwrap_err();
        assert!(matches!(err, PromoteError::Precondition(_)));
    }

    #[test]
    fn test_current_dev_version_errors() {
        let remote = MockRemote::new();
        assert!(matches!(
            promoter(&remote).current_dev_version().unwrap_err(),
            PromoteError::BranchNotFound(_)
        ));

        remote.set_branch("dev", "initial import");
        assert!(matches!(
            promoter(&remote).current_dev_version().unwrap_err(),
            PromoteError::VersionNotFound { .. }
        ));
    }

    #[test]
    fn test_next_dev_version() {
        let remote = MockRemote::new().with_branch("dev", "v1.0.5-dev.2 fix");
        let promoter = promoter(&remote);

        assert_eq!(promoter.next_dev_version("1.0.5").unwrap(), v("v1.0.5-dev.3"));
        assert_eq!(promoter.next_dev_version("v1.1.0").unwrap(), v("v1.1.0-dev.1"));
        assert!(matches!(
            promoter.next_dev_version("2.3.0").unwrap_err(),
            PromoteError::IllegalTransition { .. }
        ));
    }

    #[test]
    fn test_next_dev_version_without_dev_branch() {
        let remote = MockRemote::new();
        assert_eq!(
            promoter(&remote).next_dev_version("0.1.0").unwrap(),
            v("v0.1.0-dev.1")
        );
    }

    #[test]
    fn test_exhausted_counters_are_errors() {
        let remote = MockRemote::new()
            .with_branch("dev", "v1.0.0-dev.18446744073709551615 last")
            .with_branch("beta", "v1.0.0-beta.18446744073709551615");
        let promoter = promoter(&remote);

        assert!(matches!(
            promoter.next_dev_version("1.0.0"),
            Err(PromoteError::Format(_))
        ));
        assert_eq!(promoter.next_dev_version("1.1.0").unwrap(), v("v1.1.0-dev.1"));
        assert!(matches!(
            promoter.list_available_promotions(),
            Err(PromoteError::Format(_))
        ));
    }

    #[test]
    fn test_publish_dev_release() {
        let remote = MockRemote::new().with_branch("dev", "v1.0.5-dev.2 fix");
        let promoter = promoter(&remote);

        let receipt = promoter.publish_dev_release(&release("v1.0.6-dev.1")).unwrap();
        assert_eq!(receipt.version, v("v1.0.6-dev.1"));
        assert_eq!(
            promoter.current_dev_version().unwrap(),
            v("v1.0.6-dev.1")
        );
    }

    #[test]
    fn test_publish_dev_release_rejects_stale_version() {
        let remote = MockRemote::new().with_branch("dev", "v1.0.5-dev.2 fix");
        let promoter = promoter(&remote);

        let err = promoter.publish_dev_release(&release("v1.0.5-dev.2")).unwrap_err();
        assert!(matches!(err, PromoteError::Precondition(_)));
        assert_eq!(remote.push_count(), 0);
    }

    #[test]
    fn test_channel_status() {
        let remote = MockRemote::new()
            .with_branch("dev", "v1.0.0-dev.4 polish\n\nbody")
            .with_branch("main", "initial import");
        let status = promoter(&remote).channel_status().unwrap();

        assert_eq!(status.len(), 3);
        assert_eq!(status[0].version, Some(v("v1.0.0-dev.4")));
        assert_eq!(status[0].first_line.as_deref(), Some("v1.0.0-dev.4 polish"));
        assert!(!status[1].exists);
        assert!(status[2].exists);
        assert_eq!(status[2].version, None);
    }

    #[test]
    fn test_unreachable_remote_surfaces() {
        let remote = MockRemote::new();
        remote.set_unreachable(true);
        assert!(matches!(
            promoter(&remote).list_available_promotions().unwrap_err(),
            PromoteError::RemoteUnreachable(_)
        ));
    }
}
