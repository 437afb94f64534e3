//! Command workflow orchestration
//!
//! Every command runs here, separate from CLI argument parsing in main.rs.
//! Batch commands share one flow:
//! 1. Check the repository list and credentials
//! 2. Print the plan summary
//! 3. Ask for confirmation (two questions for a non-semver tag)
//! 4. Run the batch, printing each repository's report as it completes
//! 5. Print the totals
//!
//! All prompts happen before the first network call.

use std::io::{self, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use console::style;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::RefApi;
use crate::batch::{BatchExecutor, BatchReport};
use crate::boundary::BoundaryWarning;
use crate::config::{self, Config, Credentials, CONFIG_FILE_NAME};
use crate::domain::{compute_candidates, is_valid_semver, BatchPlan, RefAction, RefKind};
use crate::error::BmrmError;
use crate::ui::{self, formatter, Prompter};

const APP_PASSWORD_NOTE: &str = "Bitbucket app passwords are created under Personal settings > App passwords \
(https://support.atlassian.com/bitbucket-cloud/docs/app-passwords/). \
The password needs read and write access to repositories.";

/// Options shared by the batch commands
#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    /// Skip confirmation questions
    pub assume_yes: bool,

    /// Repositories processed at the same time (at least 1)
    pub concurrency: usize,

    /// Cancels the running batch
    pub cancel: CancellationToken,

    /// Cancel the batch on Ctrl-C while it runs
    pub listen_for_interrupt: bool,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        WorkflowOptions {
            assume_yes: false,
            concurrency: 1,
            cancel: CancellationToken::new(),
            listen_for_interrupt: false,
        }
    }
}

/// How a command ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowResult {
    /// A batch ran; the report holds one outcome per repository
    Batch(BatchReport),
    /// The operator declined a confirmation; nothing was sent
    Declined,
    /// A non-batch command finished
    Done,
}

impl WorkflowResult {
    /// False only when a batch reported at least one failed repository
    pub fn is_success(&self) -> bool {
        match self {
            WorkflowResult::Batch(report) => !report.has_failures(),
            WorkflowResult::Declined | WorkflowResult::Done => true,
        }
    }
}

/// Arguments of `tag create`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagCreateArgs {
    /// Branch name or commit hash to tag
    pub from: Option<String>,
    pub tag_name: Option<String>,
    /// Pick the tag from versions computed off the current one
    pub interactive: bool,
}

/// Everything a batch command needs
pub struct BatchContext<'a> {
    pub config: &'a Config,
    pub credentials: Option<&'a Credentials>,
    pub api: &'a dyn RefApi,
    pub prompter: &'a mut dyn Prompter,
    pub out: &'a mut dyn Write,
    pub options: WorkflowOptions,
}

impl<'a> BatchContext<'a> {
    /// `branch create <from_branch> <branch_name>`
    pub async fn create_branch(&mut self, from_branch: &str, branch_name: &str) -> Result<WorkflowResult> {
        let question = format!(
            "Create \"{}\" branch from \"{}\" on all configured repositories?",
            style(branch_name).green(),
            style(from_branch).magenta()
        );
        let action = RefAction::create(RefKind::Branch, branch_name, from_branch);
        self.run_batch(action, &question, None).await
    }

    /// `branch delete <branch_name>`
    pub async fn delete_branch(&mut self, branch_name: &str) -> Result<WorkflowResult> {
        let question = format!(
            "Delete \"{}\" branch on all configured repositories?",
            style(branch_name).red()
        );
        self.run_batch(RefAction::delete(RefKind::Branch, branch_name), &question, None)
            .await
    }

    /// `tag create [from] [tag_name] [--interactive]`
    ///
    /// Interactive mode asks for whatever was not given on the command line
    /// and offers the seven computed versions.
    pub async fn create_tag(&mut self, args: TagCreateArgs) -> Result<WorkflowResult> {
        self.check_ready()?;

        let (from, tag_name) = if args.interactive {
            self.resolve_tag_interactively(&args)?
        } else {
            match (args.from, args.tag_name) {
                (Some(from), Some(tag_name)) => (from, tag_name),
                (None, _) => return Err(BmrmError::MissingSourceRef {
                    action: "tag create".to_string(),
                }
                .into()),
                (Some(_), None) => {
                    bail!("A tag name is required. Pass <tag_name> or use --interactive.")
                }
            }
        };

        let non_semver = (!is_valid_semver(&tag_name)).then_some(tag_name.as_str());
        let question = format!(
            "Create tag \"{}\" from \"{}\" on all configured repositories?",
            style(&tag_name).green(),
            style(&from).magenta()
        );
        let action = RefAction::create(RefKind::Tag, tag_name.as_str(), from.as_str());
        self.run_batch(action, &question, non_semver).await
    }

    /// `tag delete <tag_name>`
    pub async fn delete_tag(&mut self, tag_name: &str) -> Result<WorkflowResult> {
        let question = format!(
            "Delete \"{}\" tag on all configured repositories?",
            style(tag_name).red()
        );
        self.run_batch(RefAction::delete(RefKind::Tag, tag_name), &question, None)
            .await
    }

    fn check_ready(&self) -> Result<()> {
        if self.config.repositories.is_empty() {
            return Err(BmrmError::EmptyRepositoryList.into());
        }
        if self.credentials.is_none() {
            return Err(BmrmError::MissingCredentials.into());
        }
        Ok(())
    }

    fn resolve_tag_interactively(&mut self, args: &TagCreateArgs) -> Result<(String, String)> {
        let from = match args.from.as_deref().filter(|f| !f.trim().is_empty()) {
            Some(from) => from.to_string(),
            None => ui::ask_required(
                &mut *self.prompter,
                "Branch or hash to create tag from:",
                "Branch or hash",
                false,
            )?,
        };

        let tag_name = match args.tag_name.as_deref().filter(|t| !t.trim().is_empty()) {
            Some(tag_name) => tag_name.to_string(),
            None => {
                let current = ui::ask_required(
                    &mut *self.prompter,
                    "Current tag / version:",
                    "Current tag / version",
                    false,
                )?;
                let candidates = compute_candidates(
                    &current,
                    self.config.prerelease_identifier(),
                    &self.config.version_prefix,
                )?;
                ui::select_version(&mut *self.prompter, &candidates)?
            }
        };

        Ok((from, tag_name))
    }

    async fn run_batch(
        &mut self,
        action: RefAction,
        question: &str,
        non_semver_tag: Option<&str>,
    ) -> Result<WorkflowResult> {
        self.check_ready()?;
        action.validate()?;

        let plan = BatchPlan::new(self.config.repositories.clone(), action);
        writeln!(self.out, "{}", formatter::format_plan_summary(&plan))?;

        if let Some(tag) = non_semver_tag {
            let warning = BoundaryWarning::NonSemverTag {
                tag: tag.to_string(),
            };
            writeln!(self.out, "\n{}", formatter::format_boundary_warning(&warning))?;
            if !self.options.assume_yes && !ui::confirm_non_semver_tag(&mut *self.prompter, tag)? {
                self.prompter.say("Operation cancelled by user.")?;
                return Ok(WorkflowResult::Declined);
            }
        }

        if self.options.assume_yes {
            let warning = BoundaryWarning::ConfirmationSkipped {
                action: plan.action.kind.to_string(),
            };
            writeln!(self.out, "\n{}", formatter::format_boundary_warning(&warning))?;
        } else if !ui::confirm_batch(&mut *self.prompter, question)? {
            self.prompter.say("Operation cancelled by user.")?;
            return Ok(WorkflowResult::Declined);
        }
        writeln!(self.out)?;

        let listener = self
            .options
            .listen_for_interrupt
            .then(|| spawn_interrupt_listener(self.options.cancel.clone()));

        let executor = BatchExecutor::new(self.options.concurrency)
            .with_cancellation(self.options.cancel.clone());
        let out = &mut *self.out;
        let mut write_error: Option<io::Error> = None;
        let result = executor
            .run_with_api(&plan, self.credentials, self.api, |outcome| {
                if write_error.is_some() {
                    return;
                }
                let block = formatter::format_outcome(&plan.action, outcome);
                if let Err(e) = writeln!(out, "{}\n", block) {
                    write_error = Some(e);
                }
            })
            .await;

        if let Some(listener) = listener {
            listener.abort();
        }
        let report = result?;
        if let Some(e) = write_error {
            return Err(e).context("Failed to write batch report");
        }

        if report.cancelled() > 0 {
            let warning = BoundaryWarning::BatchCancelled {
                unfinished: report.cancelled(),
                total: report.len(),
            };
            writeln!(self.out, "{}", formatter::format_boundary_warning(&warning))?;
        }
        writeln!(self.out, "{}", formatter::format_batch_footer(&report))?;

        Ok(WorkflowResult::Batch(report))
    }
}

fn spawn_interrupt_listener(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling remaining repositories");
            token.cancel();
        }
    })
}

/// `repo list`
pub fn list_repositories(config: &Config, out: &mut dyn Write) -> Result<WorkflowResult> {
    if config.repositories.is_empty() {
        let warning = BoundaryWarning::NoRepositories;
        writeln!(out, "{}", formatter::format_boundary_warning(&warning))?;
    } else {
        writeln!(out, "{}", formatter::format_repository_list(&config.repositories))?;
    }
    Ok(WorkflowResult::Done)
}

/// `init`: ask for the Bitbucket username and app password and store them
pub fn init_credentials(
    prompter: &mut dyn Prompter,
    out: &mut dyn Write,
    path: &Path,
) -> Result<WorkflowResult> {
    if path.exists() {
        let question = format!(
            "Credentials file {} already exists. Overwrite it?",
            path.display()
        );
        if !prompter.confirm(&question, false)? {
            prompter.say("Operation cancelled by user.")?;
            return Ok(WorkflowResult::Declined);
        }
    }

    prompter.say(&formatter::format_status(APP_PASSWORD_NOTE))?;
    let username = ui::ask_required(prompter, "Bitbucket Username:", "Username", false)?;
    let app_password = ui::ask_required(prompter, "App Password:", "App password", true)?;

    config::save_credentials(path, &Credentials::new(username, app_password))
        .with_context(|| format!("Failed to write credentials to {}", path.display()))?;
    info!(path = %path.display(), "credentials saved");

    writeln!(
        out,
        "{}",
        formatter::format_success(&format!("Credentials saved to {}", path.display()))
    )?;
    Ok(WorkflowResult::Done)
}

/// `create-config`: write the default configuration into `dir`
pub fn create_config(
    prompter: &mut dyn Prompter,
    out: &mut dyn Write,
    dir: &Path,
) -> Result<WorkflowResult> {
    let path = dir.join(CONFIG_FILE_NAME);
    if path.exists() {
        let question = format!("{} already exists. Overwrite it?", path.display());
        if !prompter.confirm(&question, false)? {
            prompter.say("Operation cancelled by user.")?;
            return Ok(WorkflowResult::Declined);
        }
    }

    config::write_default_config(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    writeln!(
        out,
        "{}",
        formatter::format_success(&format!("Created {}", path.display()))
    )?;
    writeln!(
        out,
        "{}",
        formatter::format_status("Add repositories (\"workspace/repository-slug\") to the repositories list.")
    )?;
    Ok(WorkflowResult::Done)
}
