use crate::domain::version::StageKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{PromoteError, Result};

/// One of the three promotion stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Dev,
    Beta,
    Main,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Dev, Channel::Beta, Channel::Main];

    pub fn name(&self) -> &'static str {
        match self {
            Channel::Dev => "dev",
            Channel::Beta => "beta",
            Channel::Main => "main",
        }
    }

    /// Stage carried by versions on this channel; `None` means release form
    pub fn stage_policy(&self) -> Option<StageKind> {
        match self {
            Channel::Dev => Some(StageKind::Dev),
            Channel::Beta => Some(StageKind::Beta),
            Channel::Main => None,
        }
    }

    /// The channel a promotion from this one lands on
    pub fn downstream(&self) -> Option<Channel> {
        match self {
            Channel::Dev => Some(Channel::Beta),
            Channel::Beta => Some(Channel::Main),
            Channel::Main => None,
        }
    }
}

impl FromStr for Channel {
    type Err = PromoteError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Channel::Dev),
            "beta" => Ok(Channel::Beta),
            "main" => Ok(Channel::Main),
            other => Err(PromoteError::config(format!(
                "Unknown channel '{}': expected dev, beta or main",
                other
            ))),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Remote branch names bound to each channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMap {
    #[serde(default = "default_dev")]
    pub dev: String,
    #[serde(default = "default_beta")]
    pub beta: String,
    #[serde(default = "default_main")]
    pub main: String,
}

fn default_dev() -> String {
    "dev".to_string()
}

fn default_beta() -> String {
    "beta".to_string()
}

fn default_main() -> String {
    "main".to_string()
}

impl Default for ChannelMap {
    fn default() -> Self {
        ChannelMap {
            dev: default_dev(),
            beta: default_beta(),
            main: default_main(),
        }
    }
}

impl ChannelMap {
    /// Branch name for a channel
    pub fn branch(&self, channel: Channel) -> &str {
        match channel {
            Channel::Dev => &self.dev,
            Channel::Beta => &self.beta,
            Channel::Main => &self.main,
        }
    }

    /// Reject empty or duplicated branch names
    pub fn validate(&self) -> Result<()> {
        for channel in Channel::ALL {
            if self.branch(channel).trim().is_empty() {
                return Err(PromoteError::config(format!(
                    "Branch name for channel '{}' is empty",
                    channel
                )));
            }
        }
        if self.dev == self.beta || self.beta == self.main || self.dev == self.main {
            return Err(PromoteError::config(
                "Each channel must map to a distinct branch",
            ));
        }
        Ok(())
    }
}
