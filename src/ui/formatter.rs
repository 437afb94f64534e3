//! Pure formatting functions for UI output.
//!
//! This module contains all display/formatting logic separated from user interaction.
//! Functions here return strings (except `display_error`) so callers decide
//! where output goes, and tests can compare text directly.

use console::style;

use crate::batch::BatchReport;
use crate::boundary::BoundaryWarning;
use crate::domain::{BatchPlan, RefAction, RefActionOutcome, RefKind, RepositoryId};

const INDENT: &str = "    ";

/// Format and print an error message in red.
pub fn display_error(message: &str) {
    eprintln!("{} {}", style("ERROR:").red(), message);
}

/// Success line with a green checkmark.
pub fn format_success(message: &str) -> String {
    format!("{} {}", style("✓").green(), message)
}

/// Status line with a yellow arrow.
pub fn format_status(message: &str) -> String {
    format!("{} {}", style("→").yellow(), message)
}

/// Warning line with a yellow warning icon.
pub fn format_boundary_warning(warning: &BoundaryWarning) -> String {
    format!("{} {}", style("⚠ WARNING:").yellow(), warning)
}

/// Summary shown before a batch is confirmed.
///
/// Lists the repositories, then the action parameters:
///
/// ```text
/// Repositories
/// org/a
/// org/b
///
/// Action Info
/// From Branch: main
/// Branch Name: feature/x
/// ```
pub fn format_plan_summary(plan: &BatchPlan) -> String {
    let mut lines = vec![style("Repositories").blue().bold().to_string()];
    lines.extend(
        plan.repositories
            .iter()
            .map(|repo| style(repo.as_str()).yellow().to_string()),
    );

    lines.push(String::new());
    lines.push(style("Action Info").blue().bold().to_string());

    let action = &plan.action;
    let noun = match action.kind.ref_kind() {
        RefKind::Branch => "Branch",
        RefKind::Tag => "Tag",
    };

    if action.kind.is_create() {
        let source_label = match action.kind.ref_kind() {
            RefKind::Branch => "From Branch:",
            RefKind::Tag => "From Branch / Commit Hash:",
        };
        lines.push(format!(
            "{} {}",
            source_label,
            style(action.source_ref.as_deref().unwrap_or("")).magenta()
        ));
        lines.push(format!("{} Name: {}", noun, style(&action.ref_name).green()));
    } else {
        lines.push(format!(
            "{} to delete: {}",
            noun,
            style(&action.ref_name).red()
        ));
    }

    lines.join("\n")
}

/// Report block for one repository.
///
/// Success of a create lists the ref and its commit; success of a delete is
/// the header alone. Failures carry the error message, each line indented.
pub fn format_outcome(action: &RefAction, outcome: &RefActionOutcome) -> String {
    let repository = outcome.repository().as_str();

    if let Some(message) = outcome.error_message() {
        let mut lines = vec![format!(
            "{} {}",
            style("FAILURE").white().on_red().bold(),
            style(repository).yellow()
        )];
        lines.extend(
            message
                .trim()
                .lines()
                .map(|line| format!("{}{}", INDENT, line)),
        );
        return lines.join("\n");
    }

    let mut lines = vec![format!(
        "{} {}",
        style("SUCCESS").black().on_green().bold(),
        style(repository).yellow()
    )];

    if action.kind.is_create() {
        let mut field = |label: &str, value: Option<&str>| {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                lines.push(format!("{}{} {}", INDENT, label, value));
            }
        };

        match action.kind.ref_kind() {
            RefKind::Branch => field("Branch:", Some(action.ref_name.as_str())),
            RefKind::Tag => {
                field("Tag:", Some(action.ref_name.as_str()));
                field("Tag Link:", outcome.tag_link());
            }
        }
        field("Commit Author:", outcome.commit_author());
        field("Commit:", outcome.commit_hash());
        field("Commit Link:", outcome.commit_link());
    }

    lines.join("\n")
}

/// Totals line printed after every batch.
pub fn format_batch_footer(report: &BatchReport) -> String {
    let succeeded = format!("{} succeeded", report.succeeded());
    let failed = format!("{} failed", report.failed());
    if report.has_failures() {
        format!("{}, {}", style(succeeded).green(), style(failed).red().bold())
    } else {
        format!("{}, {}", style(succeeded).green(), failed)
    }
}

/// Configured repositories, one per line.
pub fn format_repository_list(repositories: &[RepositoryId]) -> String {
    let mut lines = vec![style("Configured repositories:").bold().to_string()];
    lines.extend(repositories.iter().map(|repo| format!("  - {}", repo)));
    lines.join("\n")
}
