use std::fmt;

use crate::domain::Channel;
use crate::promoter::ChannelStatus;

/// Conditions at the edges of the channel pipeline.
/// These are non-fatal issues that should be reported to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryWarning {
    /// The channel's branch does not exist on the remote
    MissingBranch { channel: Channel, branch: String },
    /// The tip commit carries no recognizable version tag
    NoVersionOnChannel {
        channel: Channel,
        branch: String,
        first_line: String,
    },
    /// Neither dev nor beta has a version to promote
    NothingToPromote,
    /// The destination branch will be created by the promotion
    DestinationWillBeCreated { branch: String },
    /// Main already carries a release at least as new as the candidate
    ReleaseNotNewer { candidate: String, current: String },
}

impl fmt::Display for BoundaryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryWarning::MissingBranch { channel, branch } => {
                write!(
                    f,
                    "Branch '{}' for channel {} does not exist on the remote",
                    branch, channel
                )
            }
            BoundaryWarning::NoVersionOnChannel {
                channel,
                branch,
                first_line,
            } => {
                let shown = if first_line.chars().count() > 50 {
                    let cut: String = first_line.chars().take(47).collect();
                    format!("{}...", cut)
                } else {
                    first_line.clone()
                };
                write!(
                    f,
                    "No version tag on {} ('{}'): latest commit is \"{}\"",
                    channel, branch, shown
                )
            }
            BoundaryWarning::NothingToPromote => {
                write!(f, "Nothing to promote: neither dev nor beta carries a version")
            }
            BoundaryWarning::DestinationWillBeCreated { branch } => {
                write!(f, "Branch '{}' does not exist yet and will be created", branch)
            }
            BoundaryWarning::ReleaseNotNewer { candidate, current } => {
                write!(
                    f,
                    "Release {} is not newer than {} already on main",
                    candidate, current
                )
            }
        }
    }
}

/// Warnings implied by the current channel states.
///
/// Main is only reported when it carries no version; a missing main branch is
/// the normal state before the first release.
pub fn warnings_for(statuses: &[ChannelStatus]) -> Vec<BoundaryWarning> {
    let mut warnings = Vec::new();

    for status in statuses {
        match (&status.version, &status.first_line) {
            (Some(_), _) => {}
            (None, Some(first_line)) => warnings.push(BoundaryWarning::NoVersionOnChannel {
                channel: status.channel,
                branch: status.branch.clone(),
                first_line: first_line.clone(),
            }),
            (None, None) if status.channel != Channel::Main => {
                warnings.push(BoundaryWarning::MissingBranch {
                    channel: status.channel,
                    branch: status.branch.clone(),
                })
            }
            (None, None) => {}
        }
    }

    let promotable = statuses
        .iter()
        .any(|s| s.channel != Channel::Main && s.version.is_some());
    if !promotable {
        warnings.push(BoundaryWarning::NothingToPromote);
    }

    warnings
}
