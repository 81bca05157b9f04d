use crate::domain::channel::Channel;
use crate::domain::version::{Stage, StageKind, Version};
use crate::error::Result;
use std::fmt;

/// A single promotion from one channel to its downstream channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionPlan {
    pub from: Channel,
    pub to: Channel,
    pub old_version: Version,
    pub new_version: Version,
}

impl fmt::Display for PromotionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} → {} ({} → {})",
            self.from, self.to, self.old_version, self.new_version
        )
    }
}

/// Beta version a dev version promotes to.
///
/// Continues the existing beta counter when beta already carries the same
/// (major, minor, patch); otherwise starts at `beta.1`. A beta counter that
/// cannot be advanced is a format error.
pub fn next_beta_version(dev: &Version, existing_beta: Option<&Version>) -> Result<Version> {
    let stage = match existing_beta
        .filter(|beta| beta.same_line(dev))
        .and_then(|beta| beta.stage_of(StageKind::Beta))
    {
        Some(stage) => stage.next()?,
        None => Stage::first(StageKind::Beta),
    };
    Ok(dev.release().with_stage(stage))
}

/// Release version a beta version promotes to
pub fn next_main_version(beta: &Version) -> Version {
    beta.release()
}

/// Every promotion currently available given the dev and beta versions.
///
/// Main's own version is deliberately not consulted here; the release guard in
/// the promoter handles that. An empty result means nothing to promote.
pub fn plan_promotions(
    dev: Option<&Version>,
    beta: Option<&Version>,
) -> Result<Vec<PromotionPlan>> {
    let mut plans = Vec::new();

    if let Some(dev) = dev {
        plans.push(PromotionPlan {
            from: Channel::Dev,
            to: Channel::Beta,
            old_version: *dev,
            new_version: next_beta_version(dev, beta)?,
        });
    }

    if let Some(beta) = beta {
        plans.push(PromotionPlan {
            from: Channel::Beta,
            to: Channel::Main,
            old_version: *beta,
            new_version: next_main_version(beta),
        });
    }

    Ok(plans)
}
