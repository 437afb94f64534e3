use thiserror::Error;

/// Unified error type for bmrm operations
///
/// Per-repository API failures never appear here; they are captured as
/// failed [`crate::domain::RefActionOutcome`]s by the batch executor.
#[derive(Error, Debug)]
pub enum BmrmError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing credentials. Run \"bmrm init\" and try again.")]
    MissingCredentials,

    #[error("No repositories configured. Run \"bmrm create-config\" and add repositories to the configuration file.")]
    EmptyRepositoryList,

    #[error("Invalid version: '{version}' is not a semantic version")]
    InvalidVersion { version: String },

    #[error("Invalid pre-release identifier: '{identifier}'")]
    InvalidPrereleaseIdentifier { identifier: String },

    #[error("Missing source ref for {action}")]
    MissingSourceRef { action: String },

    #[error("Prompt error: {0}")]
    Prompt(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Failed to write TOML: {0}")]
    TomlWrite(#[from] toml::ser::Error),
}

/// Convenience type alias for Results in bmrm
pub type Result<T> = std::result::Result<T, BmrmError>;

impl BmrmError {
    /// Create a configuration error with context
    pub fn config(msg: impl Into<String>) -> Self {
        BmrmError::Config(msg.into())
    }

    /// Create an invalid version error for the given input
    pub fn invalid_version(version: impl Into<String>) -> Self {
        BmrmError::InvalidVersion {
            version: version.into(),
        }
    }

    /// Create a prompt error with context
    pub fn prompt(msg: impl Into<String>) -> Self {
        BmrmError::Prompt(msg.into())
    }

    /// True for errors detected before any network call that should stop the run
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            BmrmError::Config(_)
                | BmrmError::MissingCredentials
                | BmrmError::EmptyRepositoryList
                | BmrmError::TomlParse(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BmrmError::config("test config issue");
        assert_eq!(err.to_string(), "Configuration error: test config issue");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: BmrmError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_invalid_version_mentions_input() {
        let err = BmrmError::invalid_version("not-a-version");
        assert_eq!(
            err.to_string(),
            "Invalid version: 'not-a-version' is not a semantic version"
        );
    }

    #[test]
    fn test_guard_errors_point_to_commands() {
        assert!(BmrmError::MissingCredentials
            .to_string()
            .contains("bmrm init"));
        assert!(BmrmError::EmptyRepositoryList
            .to_string()
            .contains("create-config"));
    }

    #[test]
    fn test_configuration_error_classification() {
        assert!(BmrmError::MissingCredentials.is_configuration_error());
        assert!(BmrmError::EmptyRepositoryList.is_configuration_error());
        assert!(BmrmError::config("x").is_configuration_error());
        assert!(!BmrmError::invalid_version("x").is_configuration_error());
        assert!(!BmrmError::prompt("x").is_configuration_error());
    }

    #[test]
    fn test_error_messages_are_descriptive() {
        let error_pairs = vec![
            (BmrmError::config("x"), "Configuration error"),
            (BmrmError::invalid_version("x"), "Invalid version"),
            (BmrmError::prompt("x"), "Prompt error"),
            (
                BmrmError::MissingSourceRef {
                    action: "branch create".to_string(),
                },
                "Missing source ref",
            ),
        ];

        for (err, expected_prefix) in error_pairs {
            let msg = err.to_string();
            assert!(
                msg.starts_with(expected_prefix),
                "Error message should start with '{}', but got '{}'",
                expected_prefix,
                msg
            );
        }
    }
}
