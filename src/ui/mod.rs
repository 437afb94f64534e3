//! User interface module - interaction (prompts) and formatting.
//!
//! Separates concerns:
//! - `formatter` - Pure formatting functions
//! - This module - Interactive prompts and user input handling
//!
//! All prompting goes through the [`Prompter`] trait so workflows can be
//! driven by scripted input in tests.

use std::io::{self, BufRead, Write};

use anyhow::{anyhow, bail, Result};
use console::style;

use crate::domain::VersionCandidate;
use crate::error::BmrmError;

pub mod formatter;

// Re-export formatter functions for convenience
pub use formatter::{
    display_error, format_batch_footer, format_outcome, format_plan_summary,
    format_repository_list,
};

/// Warning appended to every destructive batch question
pub const IRREVERSIBLE_WARNING: &str = "Warning: This action cannot be undone.";

/// Number of times a required value is asked for before giving up
const MAX_ATTEMPTS: usize = 3;

/// Operator interaction used by the command workflows
pub trait Prompter {
    /// Print an informational line
    fn say(&mut self, message: &str) -> Result<()>;

    /// Ask a yes/no question; empty input or end of input returns `default`
    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool>;

    /// Ask for a line of text (trimmed)
    fn input(&mut self, prompt: &str) -> Result<String>;

    /// Ask for a secret without echoing it when attached to a terminal
    fn password(&mut self, prompt: &str) -> Result<String>;

    /// Ask to pick one of `options`; returns the 0-based index
    fn select(&mut self, prompt: &str, options: &[String], default: usize) -> Result<usize>;
}

/// Line-based prompter over any reader/writer pair
///
/// `TerminalPrompter::stdio()` is used by the binary; tests feed a `Cursor`.
pub struct TerminalPrompter<R, W> {
    input: R,
    output: W,
    hide_secrets: bool,
}

impl TerminalPrompter<io::StdinLock<'static>, io::Stdout> {
    /// Prompter reading stdin and writing stdout, hiding passwords on a terminal
    pub fn stdio() -> Self {
        TerminalPrompter {
            input: io::stdin().lock(),
            output: io::stdout(),
            hide_secrets: console::user_attended(),
        }
    }
}

impl<R: BufRead, W: Write> TerminalPrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        TerminalPrompter {
            input,
            output,
            hide_secrets: false,
        }
    }

    /// Consume the prompter and return the writer (for inspecting test output)
    pub fn into_output(self) -> W {
        self.output
    }

    fn ask(&mut self, prompt: &str) -> Result<()> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;
        Ok(())
    }

    /// Read one line; `None` at end of input
    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        let read = self.input.read_line(&mut line)?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

impl<R: BufRead, W: Write> Prompter for TerminalPrompter<R, W> {
    fn say(&mut self, message: &str) -> Result<()> {
        writeln!(self.output, "{}", message)?;
        Ok(())
    }

    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool> {
        let hint = if default { "(Y/n)" } else { "(y/N)" };
        self.ask(&format!("\n{} {}: ", prompt, hint))?;

        let response = match self.read_line()? {
            Some(line) => line.to_lowercase(),
            None => return Ok(default),
        };

        if default {
            Ok(!(response == "n" || response == "no"))
        } else {
            Ok(response == "y" || response == "yes")
        }
    }

    fn input(&mut self, prompt: &str) -> Result<String> {
        self.ask(&format!("{} ", prompt))?;
        self.read_line()?
            .ok_or_else(|| input_closed(prompt))
    }

    fn password(&mut self, prompt: &str) -> Result<String> {
        self.ask(&format!("{} ", prompt))?;
        if self.hide_secrets {
            let secret = console::Term::stdout().read_secure_line()?;
            return Ok(secret.trim().to_string());
        }
        self.read_line()?
            .ok_or_else(|| input_closed(prompt))
    }

    fn select(&mut self, prompt: &str, options: &[String], default: usize) -> Result<usize> {
        if options.is_empty() {
            bail!("Nothing to select");
        }
        let default = default.min(options.len() - 1);

        writeln!(self.output, "\n{}", style(prompt).bold())?;
        for (i, option) in options.iter().enumerate() {
            writeln!(self.output, "  {}. {}", i + 1, option)?;
        }
        self.ask(&format!(
            "\nSelect (1-{}) [default: {}]: ",
            options.len(),
            default + 1
        ))?;

        let selection = self.read_line()?.unwrap_or_default();

        // If empty input, use the default
        let index = if selection.is_empty() {
            default + 1
        } else {
            selection.parse::<usize>().unwrap_or(0)
        };

        if index > 0 && index <= options.len() {
            Ok(index - 1)
        } else {
            Err(BmrmError::prompt(format!("Invalid selection: {}", selection)).into())
        }
    }
}

fn input_closed(prompt: &str) -> anyhow::Error {
    BmrmError::prompt(format!("Input closed while waiting for: {}", prompt)).into()
}

/// Asks for a value until a non-empty one is given.
///
/// # Arguments
/// * `prompt` - Prompt text (e.g. "Bitbucket Username:")
/// * `field` - Name used in the retry message (e.g. "Username")
/// * `secret` - Read without echo when true
///
/// # Returns
/// * `Ok(String)` - The trimmed value
/// * `Err` - If input ends or every attempt was empty
pub fn ask_required(
    prompter: &mut dyn Prompter,
    prompt: &str,
    field: &str,
    secret: bool,
) -> Result<String> {
    for _ in 0..MAX_ATTEMPTS {
        let value = if secret {
            prompter.password(prompt)?
        } else {
            prompter.input(prompt)?
        };
        if !value.is_empty() {
            return Ok(value);
        }
        prompter.say(&format!("{} cannot be empty.", field))?;
    }
    bail!("{} cannot be empty", field)
}

/// Asks to approve a destructive batch action, defaulting to no.
///
/// The question is followed by [`IRREVERSIBLE_WARNING`].
///
/// # Examples
/// ```ignore
/// if !confirm_batch(prompter, "Delete \"v1.0.0\" on all configured repositories?")? {
///     return Ok(());
/// }
/// ```
pub fn confirm_batch(prompter: &mut dyn Prompter, question: &str) -> Result<bool> {
    prompter.confirm(
        &format!("{} {}", question, style(IRREVERSIBLE_WARNING).red()),
        false,
    )
}

/// Asks whether to continue with a tag name that is not a semantic version.
pub fn confirm_non_semver_tag(prompter: &mut dyn Prompter, tag: &str) -> Result<bool> {
    prompter.confirm(
        &format!(
            "Tag \"{}\" is not a valid semver version. Do you still wish to proceed?",
            style(tag).green()
        ),
        false,
    )
}

/// Offers the computed versions and returns the chosen tag name.
pub fn select_version(
    prompter: &mut dyn Prompter,
    candidates: &[VersionCandidate],
) -> Result<String> {
    let options: Vec<String> = candidates.iter().map(|c| c.display_label()).collect();
    let index = prompter.select("Which version would you like to create?", &options, 0)?;
    candidates
        .get(index)
        .map(|c| c.version.clone())
        .ok_or_else(|| anyhow!("Invalid selection"))
}
