//! Workflow orchestration logic
//!
//! Each CLI subcommand maps to one workflow here. Workflows take their inputs
//! as plain structs so they can be driven programmatically, and fall back to
//! interactive prompts only for values the caller left out.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::boundary::{self, BoundaryWarning};
use crate::config::{self, Config};
use crate::domain::Channel;
use crate::git::deadline::CallPolicy;
use crate::git::{
    DevRelease, Git2Remote, PublishReceipt, RemoteMutator, RemoteRepository, WorkingTreeSnapshot,
};
use crate::promoter::{derive_dev_version, ChannelStatus, Promoter};
use crate::ui;
use crate::workspace::Workspace;

/// Arguments for the promote workflow
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PromoteWorkflowArgs {
    /// Destination channel; `None` asks when several promotions are available
    pub target: Option<Channel>,

    /// Skip confirmation prompts
    pub assume_yes: bool,

    /// Preview mode - plan only, nothing is pushed
    pub dry_run: bool,
}

/// Arguments for the dev push workflow
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PushWorkflowArgs {
    /// Base version `X.Y.Z`; prompted for when absent
    pub base: Option<String>,

    pub title: Option<String>,

    pub description: Option<String>,

    /// Skip confirmation prompts
    pub assume_yes: bool,

    /// Preview mode - nothing is pushed
    pub dry_run: bool,
}

/// Outcome of a workflow that may publish
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowResult {
    /// A promotion was published and verified
    Promoted(PublishReceipt),

    /// A dev release was published and verified
    Published(PublishReceipt),

    /// Neither dev nor beta carries a version
    NothingToPromote,

    /// Dry run: what would have been published
    DryRun { summary: String },

    /// The user declined the confirmation
    Cancelled,
}

/// One line of the `check` report
#[derive(Debug, Clone, PartialEq)]
pub struct CheckItem {
    pub label: String,
    pub ok: bool,
    pub detail: String,
}

impl CheckItem {
    fn new(label: impl Into<String>, ok: bool, detail: impl Into<String>) -> Self {
        CheckItem {
            label: label.into(),
            ok,
            detail: detail.into(),
        }
    }
}

/// Show every channel and the warnings its state implies
pub fn run_status_workflow<R, M>(promoter: &Promoter<R, M>) -> Result<Vec<ChannelStatus>>
where
    R: RemoteRepository,
    M: RemoteMutator,
{
    let statuses = promoter.channel_status()?;
    ui::display_channel_status(&statuses);
    for warning in boundary::warnings_for(&statuses) {
        ui::display_boundary_warning(&warning);
    }
    Ok(statuses)
}

/// Promote workflow
///
/// 1. List the promotions the remote allows
/// 2. Pick one (from `--to`, or by prompting)
/// 3. Check the release guard and show the proposed change
/// 4. Confirm and publish
pub fn run_promote_workflow<R, M>(
    promoter: &Promoter<R, M>,
    args: &PromoteWorkflowArgs,
) -> Result<WorkflowResult>
where
    R: RemoteRepository,
    M: RemoteMutator,
{
    let plans = promoter.list_available_promotions()?;
    if plans.is_empty() {
        ui::display_boundary_warning(&BoundaryWarning::NothingToPromote);
        return Ok(WorkflowResult::NothingToPromote);
    }

    let plan = match args.target {
        Some(target) => plans
            .iter()
            .find(|plan| plan.to == target)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("No promotion to {} is available", target))?,
        None if args.assume_yes && plans.len() > 1 => {
            return Err(anyhow::anyhow!(
                "Several promotions are available; choose one with --to"
            ));
        }
        None => ui::select_promotion(&plans)?,
    };

    let destination = promoter.channels().branch(plan.to).to_string();
    if !promoter.remote().branch_exists(&destination)? {
        ui::display_boundary_warning(&BoundaryWarning::DestinationWillBeCreated {
            branch: destination.clone(),
        });
    }
    promoter.check_release_guard(&plan)?;
    ui::display_proposed_promotion(&plan, &destination);

    if args.dry_run {
        ui::display_status("Dry run: nothing was pushed");
        return Ok(WorkflowResult::DryRun {
            summary: plan.to_string(),
        });
    }

    if !args.assume_yes
        && !ui::confirm_action(&format!(
            "Force-push {} to '{}', replacing its current tip?",
            plan.new_version, destination
        ))?
    {
        ui::display_status("Promotion cancelled");
        return Ok(WorkflowResult::Cancelled);
    }

    let receipt = promoter.apply_promotion(&plan)?;
    ui::display_receipt(&receipt);
    Ok(WorkflowResult::Promoted(receipt))
}

/// Dev push workflow
///
/// 1. Show the current dev version and the bases it accepts
/// 2. Derive the next dev version from the base (re-prompting on bad input)
/// 3. Collect title and description
/// 4. Snapshot the working tree, confirm and publish
pub fn run_push_workflow<R, M, F>(
    promoter: &Promoter<R, M>,
    args: &PushWorkflowArgs,
    snapshot: F,
) -> Result<WorkflowResult>
where
    R: RemoteRepository,
    M: RemoteMutator,
    F: FnOnce() -> crate::Result<WorkingTreeSnapshot>,
{
    let baseline = promoter.dev_baseline()?;
    ui::display_dev_baseline(baseline.as_ref());

    let version = match (&args.base, args.assume_yes) {
        (Some(base), _) => derive_dev_version(baseline.as_ref(), base)?,
        (None, true) => return Err(anyhow::anyhow!("--base is required with --yes")),
        (None, false) => ui::prompt_base_version(|text| {
            derive_dev_version(baseline.as_ref(), text)
        })?,
    };
    ui::display_status(&format!("Will create version {}", version));

    let title = match (&args.title, args.assume_yes) {
        (Some(title), _) if !title.trim().is_empty() => title.trim().to_string(),
        (Some(_), _) => return Err(anyhow::anyhow!("Title must not be empty")),
        (None, true) => return Err(anyhow::anyhow!("--title is required with --yes")),
        (None, false) => ui::prompt_title()?,
    };

    let description = match (&args.description, args.assume_yes) {
        (Some(description), _) => description.clone(),
        (None, true) => String::new(),
        (None, false) => ui::prompt_text("Description (optional)")?,
    };

    let snapshot = snapshot()?;
    ui::display_status(&format!(
        "{} files from {}",
        snapshot.len(),
        snapshot.root.display()
    ));

    let release = DevRelease {
        version,
        title,
        description,
        snapshot,
    };

    if args.dry_run {
        ui::display_status("Dry run: nothing was pushed");
        return Ok(WorkflowResult::DryRun {
            summary: format!("{} {}", release.version, release.title),
        });
    }

    let branch = promoter.channels().branch(Channel::Dev);
    if !args.assume_yes
        && !ui::confirm_action(&format!(
            "Force-push the working tree as {} to '{}'?",
            release.version, branch
        ))?
    {
        ui::display_status("Push cancelled");
        return Ok(WorkflowResult::Cancelled);
    }

    let receipt = promoter.publish_dev_release(&release)?;
    ui::display_receipt(&receipt);
    Ok(WorkflowResult::Published(receipt))
}

/// Environment check: repository, remote, reachability and channel branches.
///
/// Later checks are skipped once an earlier one fails. Missing channel branches
/// are reported but do not fail the check; they are created by the first push
/// or promotion.
pub fn run_check_workflow(path: &Path, config: &Config) -> Vec<CheckItem> {
    let mut items = Vec::new();
    let remote_name = config.remote.name.as_str();

    let workspace = match Workspace::discover(path) {
        Ok(workspace) => workspace,
        Err(_) => {
            items.push(CheckItem::new(
                "git repository",
                false,
                "not inside a git repository",
            ));
            return report(items);
        }
    };
    items.push(CheckItem::new("git repository", true, "found"));

    let endpoint = match workspace.endpoint(remote_name) {
        Ok(endpoint) if !endpoint.remote_url.trim().is_empty() => {
            items.push(CheckItem::new(
                format!("remote '{}'", remote_name),
                true,
                endpoint.remote_url.clone(),
            ));
            endpoint
        }
        _ => {
            items.push(CheckItem::new(
                format!("remote '{}'", remote_name),
                false,
                missing_remote_detail(&workspace),
            ));
            return report(items);
        }
    };

    let heads = Git2Remote::new(endpoint, CallPolicy::from(&config.remote))
        .and_then(|remote| remote.list_heads());
    let heads = match heads {
        Ok(heads) => {
            items.push(CheckItem::new(
                "remote reachable",
                true,
                format!("{} branches", heads.len()),
            ));
            heads
        }
        Err(err) => {
            items.push(CheckItem::new("remote reachable", false, err.to_string()));
            return report(items);
        }
    };

    for channel in Channel::ALL {
        let branch = config.channels.branch(channel);
        let detail = match (heads.contains_key(branch), channel) {
            (true, _) => "present",
            (false, Channel::Dev) => "missing, created by the first push",
            (false, _) => "missing, created on first promotion",
        };
        items.push(CheckItem::new(
            format!("{} branch '{}'", channel, branch),
            true,
            detail,
        ));
    }

    report(items)
}

/// Detail for an unusable remote, naming the remotes that do exist
fn missing_remote_detail(workspace: &Workspace) -> String {
    match workspace.list_remotes() {
        Ok(remotes) if !remotes.is_empty() => format!(
            "not configured; available: {} (use --remote)",
            remotes.join(", ")
        ),
        _ => "not configured".to_string(),
    }
}

fn report(items: Vec<CheckItem>) -> Vec<CheckItem> {
    for item in &items {
        let line = format!("{:<24} {}", item.label, item.detail);
        if item.ok {
            ui::display_success(&line);
        } else {
            ui::display_error(&line);
        }
    }
    items
}

/// Write a default configuration unless one exists, then show it
pub fn run_init_workflow(path: Option<&Path>) -> Result<(PathBuf, Config, bool)> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(config::LOCAL_CONFIG_FILE));
    let (config, created) = config::init_config(&path)?;

    if created {
        ui::display_success(&format!("Wrote default configuration to {}", path.display()));
    } else {
        ui::display_status(&format!("Using existing configuration {}", path.display()));
    }
    println!(
        "  channels: dev={} beta={} main={}",
        config.channels.dev, config.channels.beta, config.channels.main
    );
    println!(
        "  remote:   {} (timeout {}s, {} retries)",
        config.remote.name, config.remote.timeout_secs, config.remote.retries
    );

    Ok((path, config, created))
}
