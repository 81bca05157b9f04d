//! User interface module - interaction (prompts) and formatting.
//!
//! Separates concerns:
//! - `formatter` - Pure formatting functions
//! - This module - Interactive prompts and user input handling

use std::io::{self, Write};

use anyhow::Result;

use crate::domain::{PromotionPlan, Version};

pub mod formatter;

// Re-export formatter functions for convenience
pub use formatter::{
    display_boundary_warning, display_channel_status, display_dev_baseline, display_error,
    display_partial_failure, display_plans, display_proposed_promotion, display_receipt,
    display_status, display_success,
};

/// Read one line from stdin; `None` once input is closed
fn read_line() -> Result<Option<String>> {
    io::stdout().flush()?;
    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        return Ok(None);
    }
    Ok(Some(input.trim().to_string()))
}

fn read_required_line() -> Result<String> {
    read_line()?.ok_or_else(|| anyhow::anyhow!("Input closed"))
}

/// 1-based selection; empty input picks the first entry
pub fn parse_selection(input: &str, count: usize) -> Option<usize> {
    let index = if input.is_empty() {
        1
    } else {
        input.parse::<usize>().ok()?
    };
    (index > 0 && index <= count).then(|| index - 1)
}

/// Accepts "y" or "yes" (case-insensitive); anything else declines
pub fn parse_confirmation(input: &str) -> bool {
    let response = input.trim().to_lowercase();
    response == "y" || response == "yes"
}

/// Prompts user to select a promotion from the available plans.
///
/// If only one plan is available, returns it directly without prompting.
/// Otherwise displays numbered list and accepts 1-based index selection.
/// Default selection is the first plan if user presses Enter.
pub fn select_promotion(plans: &[PromotionPlan]) -> Result<PromotionPlan> {
    match plans {
        [] => Err(anyhow::anyhow!("No promotions available")),
        [only] => Ok(only.clone()),
        _ => {
            display_plans(plans);
            print!("\nSelect a promotion (1-{}) [default: 1]: ", plans.len());
            let input = read_required_line()?;
            parse_selection(&input, plans.len())
                .map(|index| plans[index].clone())
                .ok_or_else(|| anyhow::anyhow!("Invalid selection"))
        }
    }
}

/// Prompts user to confirm an action with a yes/no prompt.
///
/// Default is "no" if user presses Enter or input is closed.
pub fn confirm_action(prompt: &str) -> Result<bool> {
    print!("\n{} (y/N): ", prompt);
    Ok(read_line()?.map_or(false, |input| parse_confirmation(&input)))
}

/// Free-form text; empty when the user just presses Enter
pub fn prompt_text(label: &str) -> Result<String> {
    print!("{}: ", label);
    read_required_line()
}

/// Asks for a commit title until a non-empty one is given
pub fn prompt_title() -> Result<String> {
    loop {
        let title = prompt_text("Title")?;
        if !title.is_empty() {
            return Ok(title);
        }
        display_error("Title must not be empty");
    }
}

/// Asks for a base version until `derive` accepts it.
///
/// Every rejection is shown with the offending value and the prompt repeats;
/// closing input cancels.
pub fn prompt_base_version<F>(derive: F) -> Result<Version>
where
    F: Fn(&str) -> crate::Result<Version>,
{
    loop {
        let input = prompt_text("Base version (X.Y.Z)")?;
        match derive(&input) {
            Ok(version) => return Ok(version),
            Err(err) => display_error(&err.to_string()),
        }
    }
}
