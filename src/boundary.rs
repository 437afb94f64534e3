use std::fmt;

/// Non-fatal conditions around a batch that should be reported to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryWarning {
    /// Tag name cannot be parsed as a semantic version
    NonSemverTag { tag: String },
    /// Confirmation was skipped with `--yes`
    ConfirmationSkipped { action: String },
    /// The batch was interrupted before every repository finished
    BatchCancelled { unfinished: usize, total: usize },
    /// No repositories are configured
    NoRepositories,
}

impl fmt::Display for BoundaryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryWarning::NonSemverTag { tag } => {
                write!(f, "Tag '{}' is not a valid semver version", tag)
            }
            BoundaryWarning::ConfirmationSkipped { action } => {
                write!(f, "Confirmation skipped for {} (--yes)", action)
            }
            BoundaryWarning::BatchCancelled { unfinished, total } => {
                let noun = if *unfinished == 1 { "repository" } else { "repositories" };
                write!(
                    f,
                    "Interrupted: {} of {} {} did not complete",
                    unfinished, total, noun
                )
            }
            BoundaryWarning::NoRepositories => write!(
                f,
                "No repositories added yet. Run \"bmrm create-config\" and add repositories to the configuration file."
            ),
        }
    }
}
