//! Pure formatting functions for UI output.
//!
//! This module contains all display/formatting logic separated from user interaction.
//! The `format_*` helpers build strings without printing so they can be tested;
//! the `display_*` functions print them.

use console::style;
use git2::Oid;

use crate::boundary::BoundaryWarning;
use crate::domain::{transition, PromotionPlan, Version};
use crate::git::PublishReceipt;
use crate::promoter::ChannelStatus;

/// First seven hex digits of a commit id
pub fn short_oid(oid: Oid) -> String {
    oid.to_string().chars().take(7).collect()
}

/// Format and print an error message in red.
pub fn display_error(message: &str) {
    eprintln!("{} {}", style("ERROR:").red(), message);
}

/// Format and print a success message with green checkmark.
pub fn display_success(message: &str) {
    println!("{} {}", style("✓").green(), message);
}

/// Format and print a status message with yellow arrow.
pub fn display_status(message: &str) {
    println!("{} {}", style("→").yellow(), message);
}

/// Display a boundary warning to the user.
pub fn display_boundary_warning(warning: &BoundaryWarning) {
    eprintln!("{} {}", style("⚠ WARNING:").yellow(), warning);
}

/// A push whose outcome is unknown; shown loudly because nothing rolls it back.
pub fn display_partial_failure(message: &str) {
    eprintln!();
    eprintln!("{}", style("!!! REMOTE STATE UNCERTAIN !!!").red().bold());
    eprintln!("{}", style(message).red());
    eprintln!(
        "{}",
        style("Check the branch on the remote by hand. Do not re-run the promotion blindly.").red()
    );
}

/// One row of the status table
pub fn format_channel_row(status: &ChannelStatus) -> String {
    let version = match (&status.version, status.exists) {
        (Some(version), _) => version.to_string(),
        (None, true) => "(no version)".to_string(),
        (None, false) => "(missing)".to_string(),
    };
    let first_line = status.first_line.as_deref().unwrap_or("");
    format!(
        "{:<6} {:<16} {:<18} {}",
        status.channel.name(),
        status.branch,
        version,
        first_line
    )
}

/// Display the version held by every channel
pub fn display_channel_status(statuses: &[ChannelStatus]) {
    println!(
        "\n{}",
        style(format!(
            "{:<6} {:<16} {:<18} {}",
            "CHAN", "BRANCH", "VERSION", "LATEST COMMIT"
        ))
        .bold()
    );
    for status in statuses {
        println!("{}", format_channel_row(status));
    }
}

/// Display the promotions on offer as a numbered list
pub fn display_plans(plans: &[PromotionPlan]) {
    println!("\n{}", style("Available promotions:").bold());
    for (i, plan) in plans.iter().enumerate() {
        println!("  {}. {}", i + 1, plan);
    }
}

/// Display the proposed version change of a promotion.
pub fn display_proposed_promotion(plan: &PromotionPlan, destination: &str) {
    println!("\n{}", style("Proposed Promotion:").bold());
    println!("  From:   {} {}", plan.from, style(plan.old_version).red());
    println!("  To:     {} {}", plan.to, style(plan.new_version).green());
    println!("  Branch: {} (force-pushed)", destination);
}

/// The four bases the current dev version accepts
pub fn format_legal_bases(current: &Version) -> Vec<String> {
    transition::legal_bases(current)
        .into_iter()
        .map(|(relation, base)| format!("{} ({})", base, relation.describe()))
        .collect()
}

/// Display the current dev version and the bases it accepts
pub fn display_dev_baseline(current: Option<&Version>) {
    match current {
        Some(current) => {
            println!("\n{} {}", style("Current dev version:").bold(), current);
            println!("  Accepted base versions:");
            for line in format_legal_bases(current) {
                println!("    - {}", line);
            }
        }
        None => {
            println!(
                "\n{} none (the dev branch will be created)",
                style("Current dev version:").bold()
            );
        }
    }
}

/// Summarize a verified publish
pub fn format_receipt(receipt: &PublishReceipt) -> String {
    match receipt.previous {
        Some(previous) => format!(
            "{} is now {} ({} → {})",
            receipt.branch,
            receipt.version,
            short_oid(previous),
            short_oid(receipt.commit)
        ),
        None => format!(
            "{} created at {} ({})",
            receipt.branch,
            receipt.version,
            short_oid(receipt.commit)
        ),
    }
}

pub fn display_receipt(receipt: &PublishReceipt) {
    display_success(&format_receipt(receipt));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Channel;

    fn oid(byte: u8) -> Oid {
        Oid::from_bytes(&[byte; 20]).unwrap()
    }

    #[test]
    fn test_display_error() {
        // Visual verification test - output is printed to stderr
        display_error("test error");
    }

    #[test]
    fn test_display_success() {
        // Visual verification test - output is printed to stdout
        display_success("test success");
    }

    #[test]
    fn test_short_oid() {
        assert_eq!(short_oid(oid(0xab)), "abababa");
    }

    #[test]
    fn test_channel_row_states() {
        let mut status = ChannelStatus {
            channel: Channel::Beta,
            branch: "beta".to_string(),
            exists: false,
            version: None,
            first_line: None,
        };
        assert!(format_channel_row(&status).contains("(missing)"));

        status.exists = true;
        status.first_line = Some("hotfix".to_string());
        let row = format_channel_row(&status);
        assert!(row.contains("(no version)"));
        assert!(row.ends_with("hotfix"));

        status.version = Some(Version::parse("v1.0.0-beta.1").unwrap());
        assert!(format_channel_row(&status).contains("v1.0.0-beta.1"));
    }

    #[test]
    fn test_legal_bases_listing() {
        let lines = format_legal_bases(&Version::parse("v1.0.5-dev.2").unwrap());
        assert_eq!(
            lines,
            vec![
                "v1.0.5 (continue current line)",
                "v1.0.6 (patch bump)",
                "v1.1.0 (minor bump)",
                "v2.0.0 (major bump)",
            ]
        );
    }

    #[test]
    fn test_receipt_formats() {
        let version = Version::parse("v2.0.0").unwrap();
        let created = PublishReceipt {
            branch: "main".to_string(),
            commit: oid(1),
            previous: None,
            version,
        };
        assert_eq!(format_receipt(&created), "main created at v2.0.0 (0101010)");

        let moved = PublishReceipt {
            previous: Some(oid(2)),
            ..created
        };
        assert_eq!(
            format_receipt(&moved),
            "main is now v2.0.0 (0202020 → 0101010)"
        );
    }
}
