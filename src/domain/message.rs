//! Commit message contract
//!
//! The first line of a channel's tip commit carries its version tag. Promotions
//! write `"{new}\n\nupdate from\n{old}"`; dev releases write
//! `"{version} {title}\n\n{description}"`.

use crate::domain::version::Version;

/// Body used when a dev release is published without a description
pub const DEFAULT_DESCRIPTION: &str = "No description";

/// First line of a commit message, without the trailing newline
pub fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or("")
}

/// Find the version tag on the first line of a commit message.
///
/// Only tokens with the leading `v` count; a message without a recognizable tag
/// yields `None` rather than an error.
pub fn extract_version(message: &str) -> Option<Version> {
    first_line(message)
        .split_whitespace()
        .filter(|token| token.starts_with('v'))
        .find_map(|token| Version::parse(token).ok())
}

/// Message of the commit a promotion publishes
pub fn promotion_message(new_version: &Version, old_version: &Version) -> String {
    format!("{}\n\nupdate from\n{}", new_version, old_version)
}

/// Message of a dev release commit
pub fn dev_release_message(version: &Version, title: &str, description: &str) -> String {
    let description = if description.trim().is_empty() {
        DEFAULT_DESCRIPTION
    } else {
        description
    };
    format!("{} {}\n\n{}", version, title.trim(), description)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_promotion_message() {
        let message = "v2.0.0-beta.2\n\nupdate from\nv2.0.0-dev.3";
        assert_eq!(
            extract_version(message).unwrap().to_string(),
            "v2.0.0-beta.2"
        );
    }

    #[test]
    fn test_extract_from_titled_message() {
        let message = "v1.4.0-dev.7 Add login screen\n\nSome details";
        assert_eq!(extract_version(message).unwrap().to_string(), "v1.4.0-dev.7");
    }

    #[test]
    fn test_extract_ignores_later_lines() {
        let message = "Merge branch 'feature'\n\nv9.9.9";
        assert_eq!(extract_version(message), None);
    }

    #[test]
    fn test_extract_finds_token_mid_line() {
        let message = "release v3.0.0 finally";
        assert_eq!(extract_version(message), Some(Version::new(3, 0, 0)));
    }

    #[test]
    fn test_extract_requires_prefix_and_grammar() {
        assert_eq!(extract_version("1.2.3 without prefix"), None);
        assert_eq!(extract_version("v1.2.3-rc.1 candidate"), None);
        assert_eq!(extract_version("v1.2.3-dev.0"), None);
        assert_eq!(extract_version(""), None);
    }

    #[test]
    fn test_promotion_message_exact() {
        let message = promotion_message(
            &Version::parse("v2.0.0-beta.2").unwrap(),
            &Version::parse("v2.0.0-dev.3").unwrap(),
        );
        assert_eq!(message, "v2.0.0-beta.2\n\nupdate from\nv2.0.0-dev.3");
    }

    #[test]
    fn test_dev_release_message() {
        let version = Version::parse("v1.2.3-dev.5").unwrap();
        assert_eq!(
            dev_release_message(&version, " Fix crash ", "Details here"),
            "v1.2.3-dev.5 Fix crash\n\nDetails here"
        );
        assert_eq!(
            dev_release_message(&version, "Fix crash", ""),
            "v1.2.3-dev.5 Fix crash\n\nNo description"
        );
    }

    #[test]
    fn test_first_line() {
        assert_eq!(first_line("a\nb"), "a");
        assert_eq!(first_line(""), "");
    }
}
