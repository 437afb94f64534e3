use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bmrm::api::BitbucketClient;
use bmrm::cli::{self, BatchContext, TagCreateArgs, WorkflowOptions, WorkflowResult};
use bmrm::config;
use bmrm::ui::{self, TerminalPrompter};

#[derive(Parser)]
#[command(
    name = "bmrm",
    version,
    about = "Create and delete branches and tags across many Bitbucket repositories"
)]
struct Cli {
    #[arg(short, long, global = true, help = "Custom configuration file path")]
    config: Option<PathBuf>,

    #[arg(long, global = true, help = "Custom credentials file path")]
    credentials: Option<PathBuf>,

    #[arg(short = 'y', long, global = true, help = "Skip confirmation prompts")]
    yes: bool,

    #[arg(
        short = 'j',
        long,
        global = true,
        help = "Number of repositories processed at the same time"
    )]
    jobs: Option<usize>,

    #[arg(short, long, global = true, action = ArgAction::Count, help = "Increase log verbosity (-v, -vv, -vvv)")]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Save Bitbucket username and app password
    Init,
    /// Write a default .bmrm.toml in the current directory
    CreateConfig,
    /// Inspect the configured repositories
    Repo {
        #[command(subcommand)]
        command: RepoCommand,
    },
    /// Create or delete a branch in every configured repository
    Branch {
        #[command(subcommand)]
        command: BranchCommand,
    },
    /// Create or delete a tag in every configured repository
    Tag {
        #[command(subcommand)]
        command: TagCommand,
    },
}

#[derive(Subcommand)]
enum RepoCommand {
    /// List the configured repositories
    List,
}

#[derive(Subcommand)]
enum BranchCommand {
    /// Create a branch from an existing branch
    Create {
        from_branch: String,
        branch_name: String,
    },
    /// Delete a branch
    Delete { branch_name: String },
}

#[derive(Subcommand)]
enum TagCommand {
    /// Create a tag from a branch or commit hash
    Create {
        from_branch_or_hash: Option<String>,
        tag_name: Option<String>,
        #[arg(short, long, help = "Choose the tag from versions computed off the current one")]
        interactive: bool,
    },
    /// Delete a tag
    Delete { tag_name: String },
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = if verbose > 0 {
        EnvFilter::new(format!("bmrm={}", default_level))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();
    init_tracing(args.verbose);

    match run(args).await {
        Ok(result) if result.is_success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            ui::display_error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Cli) -> Result<WorkflowResult> {
    let mut prompter = TerminalPrompter::stdio();
    let mut stdout = io::stdout();

    let credentials_path = config::credentials_path(args.credentials.as_deref())
        .context("Could not determine the home directory for the credentials file")?;

    let ref_command = match args.command {
        Command::Init => {
            return cli::init_credentials(&mut prompter, &mut stdout, &credentials_path);
        }
        Command::CreateConfig => {
            let cwd = std::env::current_dir()?;
            return cli::create_config(&mut prompter, &mut stdout, &cwd);
        }
        Command::Repo {
            command: RepoCommand::List,
        } => {
            let config = config::load_config(args.config.as_deref())?;
            return cli::list_repositories(&config, &mut stdout);
        }
        Command::Branch { command } => RefCommand::Branch(command),
        Command::Tag { command } => RefCommand::Tag(command),
    };

    let config = config::load_config(args.config.as_deref())?;
    let credentials = config::load_credentials(&credentials_path)?;
    let client = BitbucketClient::from_config(&config)?;

    let options = WorkflowOptions {
        assume_yes: args.yes,
        concurrency: args.jobs.unwrap_or(config.concurrency),
        listen_for_interrupt: true,
        ..WorkflowOptions::default()
    };

    let mut ctx = BatchContext {
        config: &config,
        credentials: credentials.as_ref(),
        api: &client,
        prompter: &mut prompter,
        out: &mut stdout,
        options,
    };

    match ref_command {
        RefCommand::Branch(BranchCommand::Create {
            from_branch,
            branch_name,
        }) => ctx.create_branch(&from_branch, &branch_name).await,
        RefCommand::Branch(BranchCommand::Delete { branch_name }) => {
            ctx.delete_branch(&branch_name).await
        }
        RefCommand::Tag(TagCommand::Create {
            from_branch_or_hash,
            tag_name,
            interactive,
        }) => {
            ctx.create_tag(TagCreateArgs {
                from: from_branch_or_hash,
                tag_name,
                interactive,
            })
            .await
        }
        RefCommand::Tag(TagCommand::Delete { tag_name }) => ctx.delete_tag(&tag_name).await,
    }
}

enum RefCommand {
    Branch(BranchCommand),
    Tag(TagCommand),
}
