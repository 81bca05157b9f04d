use std::path::Path;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use git_promote::cli::orchestration::{
    run_check_workflow, run_init_workflow, run_promote_workflow, run_push_workflow,
    run_status_workflow, PromoteWorkflowArgs, PushWorkflowArgs, WorkflowResult,
};
use git_promote::config::{self, Config};
use git_promote::domain::Channel;
use git_promote::git::deadline::CallPolicy;
use git_promote::git::{Git2Mutator, Git2Remote};
use git_promote::promoter::Promoter;
use git_promote::workspace::{self, Workspace};
use git_promote::{ui, PromoteError};

/// Exit code when a push may have landed without being verified
const EXIT_PARTIAL: i32 = 3;

#[derive(clap::Parser)]
#[command(
    name = "git-promote",
    version,
    about = "Promote releases through the dev, beta and main channels of a remote"
)]
struct Args {
    #[arg(short, long, global = true, help = "Custom configuration file path")]
    config: Option<String>,

    #[arg(long, global = true, help = "Git remote to use instead of the configured one")]
    remote: Option<String>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "More log output (-v info, -vv debug)")]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the version carried by each channel
    Status,

    /// Promote dev to beta or beta to main
    Promote {
        #[arg(long, value_parser = parse_target, help = "Destination channel (beta or main)")]
        to: Option<Channel>,

        #[arg(short = 'y', long, help = "Skip confirmation prompts")]
        yes: bool,

        #[arg(long, help = "Preview what would happen without making changes")]
        dry_run: bool,
    },

    /// Publish the working tree as the next dev version
    Push {
        #[arg(long, help = "Base version X.Y.Z for the next dev version")]
        base: Option<String>,

        #[arg(long, help = "Commit title")]
        title: Option<String>,

        #[arg(long, help = "Commit description")]
        description: Option<String>,

        #[arg(short = 'y', long, help = "Skip confirmation prompts")]
        yes: bool,

        #[arg(long, help = "Preview what would happen without making changes")]
        dry_run: bool,
    },

    /// Check the repository, the remote and the channel branches
    Check,

    /// Write a default configuration file
    Init,
}

fn parse_target(text: &str) -> std::result::Result<Channel, String> {
    match text.parse::<Channel>() {
        Ok(Channel::Dev) => Err("dev is not a promotion target".to_string()),
        Ok(channel) => Ok(channel),
        Err(e) => Err(e.to_string()),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("warn,git_promote={}", level))),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Err(err) = run(args) {
        if err
            .downcast_ref::<PromoteError>()
            .is_some_and(PromoteError::is_partial)
        {
            ui::display_partial_failure(&err.to_string());
            std::process::exit(EXIT_PARTIAL);
        }
        ui::display_error(&format!("{:#}", err));
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Init => {
            run_init_workflow(args.config.as_deref().map(Path::new))?;
            Ok(())
        }
        command => {
            let mut config = config::load_config(args.config.as_deref())?;
            if let Some(remote) = args.remote {
                config.remote.name = remote;
            }
            run_command(command, &config)
        }
    }
}

fn run_command(command: Command, config: &Config) -> Result<()> {
    match command {
        Command::Init => {
            run_init_workflow(None)?;
        }
        Command::Check => {
            let items = run_check_workflow(Path::new("."), config);
            if items.iter().any(|item| !item.ok) {
                anyhow::bail!("Environment check failed");
            }
        }
        Command::Status => {
            let promoter = build_promoter(config)?;
            run_status_workflow(&promoter)?;
        }
        Command::Promote { to, yes, dry_run } => {
            let promoter = build_promoter(config)?;
            let workflow_args = PromoteWorkflowArgs {
                target: to,
                assume_yes: yes || config.behavior.assume_yes,
                dry_run,
            };
            report(run_promote_workflow(&promoter, &workflow_args)?);
        }
        Command::Push {
            base,
            title,
            description,
            yes,
            dry_run,
        } => {
            let promoter = build_promoter(config)?;
            let workflow_args = PushWorkflowArgs {
                base,
                title,
                description,
                assume_yes: yes || config.behavior.assume_yes,
                dry_run,
            };
            let result = run_push_workflow(&promoter, &workflow_args, || {
                Workspace::discover(Path::new("."))?.snapshot()
            })?;
            report(result);
        }
    }

    Ok(())
}

fn build_promoter(config: &Config) -> Result<Promoter<Git2Remote, Git2Mutator>> {
    let cwd = std::env::current_dir()?;
    let endpoint = workspace::resolve_endpoint(&cwd, &config.remote.name);
    endpoint.validate()?;

    let policy = CallPolicy::from(&config.remote);
    let remote = Git2Remote::new(endpoint.clone(), policy)?;
    let mutator = Git2Mutator::new(
        endpoint,
        config.channels.clone(),
        policy,
        config.identity.clone(),
    )?;

    Ok(Promoter::new(
        remote,
        mutator,
        config.channels.clone(),
        config.policy.clone(),
    ))
}

fn report(result: WorkflowResult) {
    match result {
        WorkflowResult::Promoted(receipt) | WorkflowResult::Published(receipt) => {
            println!("\n{} published on '{}'\n", receipt.version, receipt.branch);
        }
        WorkflowResult::DryRun { summary } => println!("\nWould publish: {}\n", summary),
        WorkflowResult::NothingToPromote | WorkflowResult::Cancelled => {}
    }
}
