//! Dev version state machine
//!
//! States are versions, edges are the four legal relations between the version
//! currently on the dev channel and the base a user asks for next. Validation and
//! derivation are kept as two separate steps so that no version is ever built from
//! an unchecked base.

use crate::domain::version::{Stage, StageKind, Version};
use crate::error::{PromoteError, Result};

/// How a requested base relates to the current dev version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseRelation {
    /// Same (major, minor, patch): continue the current dev line
    SameLine,
    PatchBump,
    MinorBump,
    MajorBump,
}

impl BaseRelation {
    pub fn describe(&self) -> &'static str {
        match self {
            BaseRelation::SameLine => "continue current line",
            BaseRelation::PatchBump => "patch bump",
            BaseRelation::MinorBump => "minor bump",
            BaseRelation::MajorBump => "major bump",
        }
    }
}

/// The four bases reachable from `current`, in edge order.
///
/// An edge whose arithmetic would overflow does not exist.
pub fn legal_bases(current: &Version) -> Vec<(BaseRelation, Version)> {
    let (major, minor, patch) = current.triple();
    let mut bases = vec![(BaseRelation::SameLine, Version::new(major, minor, patch))];

    if let Some(next_patch) = patch.checked_add(1) {
        bases.push((
            BaseRelation::PatchBump,
            Version::new(major, minor, next_patch),
        ));
    }
    if let Some(next_minor) = minor.checked_add(1) {
        bases.push((BaseRelation::MinorBump, Version::new(major, next_minor, 0)));
    }
    if let Some(next_major) = major.checked_add(1) {
        bases.push((BaseRelation::MajorBump, Version::new(next_major, 0, 0)));
    }

    bases
}

/// Classify `base` against `current`, or `None` when no legal edge connects them
pub fn classify(current: &Version, base: &Version) -> Option<BaseRelation> {
    legal_bases(current)
        .into_iter()
        .find(|(_, candidate)| candidate.same_line(base))
        .map(|(relation, _)| relation)
}

/// Parse user-supplied base text; a stage suffix is not accepted here
pub fn parse_base(text: &str) -> Result<Version> {
    let base = Version::parse(text.trim())?;
    if base.stage.is_some() {
        return Err(PromoteError::format(format!(
            "Base version '{}' must not carry a stage suffix",
            text.trim()
        )));
    }
    Ok(base)
}

/// Check that `base` is one of the four legal next steps from `current`
pub fn validate_base(current: &Version, base: &Version) -> Result<BaseRelation> {
    classify(current, base).ok_or_else(|| PromoteError::IllegalTransition {
        base: base.to_string(),
        current: current.to_string(),
    })
}

/// Derive the next dev version once `base` has been validated.
///
/// Continuing the same line advances the dev counter; any bump restarts it at 1.
/// A dev counter that cannot be advanced is a format error.
pub fn derive_next(current: &Version, base: &Version, relation: BaseRelation) -> Result<Version> {
    let stage = match (relation, current.stage_of(StageKind::Dev)) {
        (BaseRelation::SameLine, Some(stage)) => stage.next()?,
        _ => Stage::first(StageKind::Dev),
    };
    Ok(base.release().with_stage(stage))
}

/// Validate `base_text` against `current` and derive the next dev version
pub fn next_dev_version(current: &Version, base_text: &str) -> Result<Version> {
    let base = parse_base(base_text)?;
    let relation = validate_base(current, &base)?;
    derive_next(current, &base, relation)
}
