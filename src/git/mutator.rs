//! Two-phase remote rewrite: stage one commit in an ephemeral clone, then
//! force-push it and confirm the remote took it.
//!
//! Protocol per publish:
//!
//! 1. create an [EphemeralClone] and record the destination's current tip
//! 2. fetch the source branch (promotions) or the dev branch (dev releases)
//! 3. write the new commit with the exact message contract
//! 4. force-push the destination ref
//! 5. list the remote again and require the destination to equal the new commit
//!
//! Anything failing in 1-3 is [PromoteError::MutationAborted]. A failed push is
//! only reported as aborted after the remote is seen unchanged.

use git2::{Commit, Oid, Repository, Signature};
use tracing::{debug, info, warn};

use super::deadline::{self, CallPolicy};
use super::ephemeral::EphemeralClone;
use super::remote::list_remote_heads;
use super::snapshot;
use super::{DevRelease, PublishReceipt, RemoteMutator, RepoEndpoint};
use crate::config::IdentityConfig;
use crate::domain::{message, ChannelMap, PromotionPlan, StageKind, Version};
use crate::error::{PromoteError, Result};

trait AtStage<T> {
    /// Report a failure before the push as an aborted mutation
    fn at_stage(self, stage: &str) -> Result<T>;
}

impl<T> AtStage<T> for Result<T> {
    fn at_stage(self, stage: &str) -> Result<T> {
        self.map_err(|err| match err {
            PromoteError::MutationAborted { .. } | PromoteError::MutationPartial { .. } => err,
            other => PromoteError::aborted(stage, other.to_string()),
        })
    }
}

fn describe_tip(tip: Option<Oid>) -> String {
    match tip {
        Some(oid) => oid.to_string(),
        None => "no such branch".to_string(),
    }
}

/// [RemoteMutator] backed by libgit2 and a temporary bare repository
pub struct Git2Mutator {
    endpoint: RepoEndpoint,
    channels: ChannelMap,
    policy: CallPolicy,
    identity: IdentityConfig,
}

impl Git2Mutator {
    pub fn new(
        endpoint: RepoEndpoint,
        channels: ChannelMap,
        policy: CallPolicy,
        identity: IdentityConfig,
    ) -> Result<Self> {
        endpoint.validate()?;
        channels.validate()?;
        Ok(Git2Mutator {
            endpoint,
            channels,
            policy,
            identity,
        })
    }

    fn url(&self) -> &str {
        &self.endpoint.remote_url
    }

    /// Ambient git identity, or the configured fallback
    fn signature(&self, repo: &Repository) -> Result<Signature<'static>> {
        match repo.signature() {
            Ok(sig) => Ok(sig.to_owned()),
            Err(_) => {
                debug!(name = %self.identity.name, "no git identity configured, using fallback");
                Ok(Signature::now(&self.identity.name, &self.identity.email)?)
            }
        }
    }

    fn current_tip(&self, branch: &str) -> Result<Option<Oid>> {
        let url = self.url().to_string();
        let heads = deadline::query("listing remote heads", &self.policy, move || {
            list_remote_heads(&url)
        })?;
        Ok(heads.get(branch).copied())
    }

    /// Push the staged branch and confirm the remote now points at `commit`
    fn publish(
        &self,
        clone: &EphemeralClone,
        branch: &str,
        commit: Oid,
        previous: Option<Oid>,
        version: Version,
    ) -> Result<PublishReceipt> {
        clone.set_branch(branch, commit).at_stage("stage")?;

        info!(branch, commit = %commit, version = %version, "pushing");
        if let Err(push_err) = clone.push_branch(self.url(), branch, &self.policy) {
            return Err(self.classify_push_failure(branch, commit, previous, push_err));
        }

        match self.current_tip(branch) {
            Ok(Some(tip)) if tip == commit => {
                info!(branch, commit = %commit, "remote verified");
                Ok(PublishReceipt {
                    branch: branch.to_string(),
                    commit,
                    previous,
                    version,
                })
            }
            Ok(tip) => Err(PromoteError::MutationPartial {
                branch: branch.to_string(),
                expected: commit.to_string(),
                reason: format!("remote reports {} after the push", describe_tip(tip)),
            }),
            Err(err) => Err(PromoteError::MutationPartial {
                branch: branch.to_string(),
                expected: commit.to_string(),
                reason: format!("push acknowledged but the remote could not be re-read: {}", err),
            }),
        }
    }

    fn classify_push_failure(
        &self,
        branch: &str,
        commit: Oid,
        previous: Option<Oid>,
        push_err: PromoteError,
    ) -> PromoteError {
        warn!(branch, error = %push_err, "push failed, re-reading remote");

        let partial = |reason: String| PromoteError::MutationPartial {
            branch: branch.to_string(),
            expected: commit.to_string(),
            reason,
        };

        // An expired deadline leaves the push running in the background.
        if matches!(push_err, PromoteError::Timeout { .. }) {
            return partial(format!("{}; the push may still complete", push_err));
        }

        match self.current_tip(branch) {
            Ok(tip) if tip == previous => match push_err {
                PromoteError::MutationAborted { .. } => push_err,
                other => PromoteError::aborted("publish", other.to_string()),
            },
            Ok(tip) => partial(format!(
                "push failed ({}) but the remote now reports {}",
                push_err,
                describe_tip(tip)
            )),
            Err(query_err) => partial(format!(
                "push failed ({}) and the remote could not be re-read: {}",
                push_err, query_err
            )),
        }
    }

    fn commit_promotion(
        &self,
        repo: &Repository,
        source: &Commit<'_>,
        plan: &PromotionPlan,
    ) -> Result<Oid> {
        let found = message::extract_version(&String::from_utf8_lossy(source.message_bytes()));
        if found != Some(plan.old_version) {
            return Err(PromoteError::aborted(
                "stale-check",
                format!(
                    "'{}' now carries {}, expected {}",
                    self.channels.branch(plan.from),
                    found.map_or_else(|| "no version".to_string(), |v| v.to_string()),
                    plan.old_version
                ),
            ));
        }

        let tree = source.tree()?;
        let parents: Vec<Commit<'_>> = source.parents().collect();
        let parent_refs: Vec<&Commit<'_>> = parents.iter().collect();
        let sig = self.signature(repo)?;
        let text = message::promotion_message(&plan.new_version, &plan.old_version);

        Ok(repo.commit(None, &sig, &sig, &text, &tree, &parent_refs)?)
    }
}

impl RemoteMutator for Git2Mutator {
    fn apply_promotion(&self, plan: &PromotionPlan) -> Result<PublishReceipt> {
        if plan.from.downstream() != Some(plan.to) {
            return Err(PromoteError::precondition(format!(
                "Cannot promote {} to {}",
                plan.from, plan.to
            )));
        }

        let source = self.channels.branch(plan.from);
        let destination = self.channels.branch(plan.to);
        info!(%plan, source, destination, "applying promotion");

        let clone = EphemeralClone::create().at_stage("clone")?;
        let previous = self.current_tip(destination).at_stage("inspect")?;
        let source_tip = clone
            .fetch_branch(self.url(), source, &self.policy)
            .at_stage("fetch")?;

        let repo = clone.open().at_stage("open")?;
        let commit = repo
            .find_commit(source_tip)
            .map_err(PromoteError::from)
            .and_then(|source| self.commit_promotion(&repo, &source, plan))
            .at_stage("commit")?;
        debug!(commit = %commit, source_tip = %source_tip, "promotion commit written");

        self.publish(&clone, destination, commit, previous, plan.new_version)
    }

    fn publish_dev_release(&self, release: &DevRelease) -> Result<PublishReceipt> {
        if release.version.stage.map(|stage| stage.kind) != Some(StageKind::Dev) {
            return Err(PromoteError::precondition(format!(
                "{} is not a dev version",
                release.version
            )));
        }
        if release.title.trim().is_empty() {
            return Err(PromoteError::precondition("Release title is empty"));
        }

        let branch = self.channels.dev.as_str();
        info!(branch, version = %release.version, files = release.snapshot.len(), "publishing dev release");

        let clone = EphemeralClone::create().at_stage("clone")?;
        let previous = self.current_tip(branch).at_stage("inspect")?;
        let parent = match previous {
            Some(_) => Some(
                clone
                    .fetch_branch(self.url(), branch, &self.policy)
                    .at_stage("fetch")?,
            ),
            None => None,
        };

        let repo = clone.open().at_stage("open")?;
        let commit = self
            .commit_dev_release(&repo, release, parent)
            .at_stage("commit")?;
        debug!(commit = %commit, orphan = parent.is_none(), "dev release commit written");

        self.publish(&clone, branch, commit, previous, release.version)
    }
}

impl Git2Mutator {
    fn commit_dev_release(
        &self,
        repo: &Repository,
        release: &DevRelease,
        parent: Option<Oid>,
    ) -> Result<Oid> {
        let tree = repo.find_tree(snapshot::write_tree(repo, &release.snapshot)?)?;
        let parent = parent.map(|oid| repo.find_commit(oid)).transpose()?;
        let parents: Vec<&Commit<'_>> = parent.iter().collect();
        let sig = self.signature(repo)?;
        let text =
            message::dev_release_message(&release.version, &release.title, &release.description);

        Ok(repo.commit(None, &sig, &sig, &text, &tree, &parents)?)
    }
}
