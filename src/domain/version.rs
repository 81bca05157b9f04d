//! Version identifiers of the form `vMAJOR.MINOR.PATCH[-STAGE.N]`
//!
//! Stages are restricted to `dev` and `beta`; a version without a stage is the
//! release form carried by the main channel.

use crate::error::{PromoteError, Result};
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Pre-release qualifier attached to a version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Dev,
    Beta,
}

impl StageKind {
    /// Lowercase name used in the version grammar
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Dev => "dev",
            StageKind::Beta => "beta",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            StageKind::Dev => 0,
            StageKind::Beta => 1,
        }
    }
}

impl FromStr for StageKind {
    type Err = PromoteError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dev" => Ok(StageKind::Dev),
            "beta" => Ok(StageKind::Beta),
            other => Err(PromoteError::format(format!(
                "Invalid stage '{}': expected 'dev' or 'beta'",
                other
            ))),
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stage together with its counter, e.g. `beta.2`
///
/// The counter is always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Stage {
    pub kind: StageKind,
    pub counter: u64,
}

impl Stage {
    /// Create a stage, rejecting a zero counter
    pub fn new(kind: StageKind, counter: u64) -> Result<Self> {
        if counter == 0 {
            return Err(PromoteError::format(format!(
                "Stage counter for '{}' must be at least 1",
                kind
            )));
        }
        Ok(Stage { kind, counter })
    }

    /// Counter 1 of `kind`
    pub fn first(kind: StageKind) -> Self {
        Stage { kind, counter: 1 }
    }

    /// The same stage with its counter advanced by one.
    ///
    /// Fails with a format error once the counter cannot grow any further.
    pub fn next(&self) -> Result<Self> {
        let counter = self.counter.checked_add(1).ok_or_else(|| {
            PromoteError::format(format!(
                "Stage counter of '{}' cannot be advanced past {}",
                self.kind, self.counter
            ))
        })?;
        Ok(Stage {
            kind: self.kind,
            counter,
        })
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind, self.counter)
    }
}

/// Release version identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub stage: Option<Stage>,
}

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^v?(\d+)\.(\d+)\.(\d+)(?:-(dev|beta)\.(\d+))?$")
            .expect("version grammar is a valid regex")
    })
}

fn parse_component(text: &str, raw: &str, name: &str) -> Result<u64> {
    raw.parse::<u64>().map_err(|_| {
        PromoteError::format(format!(
            "Invalid {} component '{}' in version '{}'",
            name, raw, text
        ))
    })
}

impl Version {
    /// Create a release-form version (no stage)
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Version {
            major,
            minor,
            patch,
            stage: None,
        }
    }

    /// Parse a version such as `v1.2.3`, `1.2.3` or `v1.2.3-dev.4`
    pub fn parse(text: &str) -> Result<Self> {
        let caps = version_regex().captures(text).ok_or_else(|| {
            PromoteError::format(format!(
                "Invalid version '{}' - expected vMAJOR.MINOR.PATCH[-(dev|beta).N]",
                text
            ))
        })?;

        let major = parse_component(text, &caps[1], "major")?;
        let minor = parse_component(text, &caps[2], "minor")?;
        let patch = parse_component(text, &caps[3], "patch")?;

        let stage = match (caps.get(4), caps.get(5)) {
            (Some(kind), Some(counter)) => {
                let kind: StageKind = kind.as_str().parse()?;
                let counter = parse_component(text, counter.as_str(), "stage counter")?;
                Some(Stage::new(kind, counter).map_err(|_| {
                    PromoteError::format(format!(
                        "Invalid version '{}': stage counter must be at least 1",
                        text
                    ))
                })?)
            }
            _ => None,
        };

        Ok(Version {
            major,
            minor,
            patch,
            stage,
        })
    }

    /// The (major, minor, patch) triple
    pub fn triple(&self) -> (u64, u64, u64) {
        (self.major, self.minor, self.patch)
    }

    /// Whether both versions share the same (major, minor, patch)
    pub fn same_line(&self, other: &Version) -> bool {
        self.triple() == other.triple()
    }

    /// The release form of this version (stage removed)
    pub fn release(&self) -> Self {
        Version {
            stage: None,
            ..*self
        }
    }

    /// This version's triple with the given stage attached
    pub fn with_stage(&self, stage: Stage) -> Self {
        Version {
            stage: Some(stage),
            ..*self
        }
    }

    /// The stage, when it is of the given kind
    pub fn stage_of(&self, kind: StageKind) -> Option<Stage> {
        self.stage.filter(|stage| stage.kind == kind)
    }

    fn stage_rank(&self) -> (u8, u64) {
        match self.stage {
            Some(stage) => (stage.kind.rank(), stage.counter),
            // A release sorts after every pre-release of the same triple
            None => (u8::MAX, 0),
        }
    }
}

impl FromStr for Version {
    type Err = PromoteError;

    fn from_str(s: &str) -> Result<Self> {
        Version::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(stage) = self.stage {
            write!(f, "-{}", stage)?;
        }
        Ok(())
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.triple()
            .cmp(&other.triple())
            .then_with(|| self.stage_rank().cmp(&other.stage_rank()))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
