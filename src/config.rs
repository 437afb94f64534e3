use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::RepositoryId;
use crate::error::{BmrmError, Result};

/// Project configuration file name, searched from the working directory upward
pub const CONFIG_FILE_NAME: &str = ".bmrm.toml";

/// Credentials file name inside the home directory
pub const CREDENTIALS_FILE_NAME: &str = ".bitbucket-multi-repo-management.toml";

/// Environment variable overriding the credentials file location
pub const CREDENTIALS_ENV_VAR: &str = "BMRM_CREDENTIALS_FILE";

pub const DEFAULT_API_BASE_URL: &str = "https://api.bitbucket.org/2.0";

/// Contents written by `bmrm create-config`
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# Repositories to manage, in "workspace/repository-slug" form.
# Actions run against them in the order listed here.
repositories = []

# Pre-release identifier used for pre-* versions in `tag create --interactive`,
# e.g. "beta" produces 1.3.0-beta.0
# prerelease_identifier = "beta"

# Prefix added to versions picked in `tag create --interactive`
version_prefix = ""

# Number of repositories processed at the same time
concurrency = 1
"#;

/// Represents the project configuration for bmrm.
///
/// Contains the repository list, version selection settings and API options.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub repositories: Vec<RepositoryId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prerelease_identifier: Option<String>,

    #[serde(default)]
    pub version_prefix: String,

    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_concurrency() -> usize {
    1
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Config {
            repositories: Vec::new(),
            prerelease_identifier: None,
            version_prefix: String::new(),
            concurrency: default_concurrency(),
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Config {
    /// Parse configuration from TOML text and validate it
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject duplicate repositories and a zero concurrency
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for repo in &self.repositories {
            if !seen.insert(repo.as_str()) {
                return Err(BmrmError::config(format!(
                    "Repository '{}' is listed more than once",
                    repo
                )));
            }
        }

        if self.concurrency == 0 {
            return Err(BmrmError::config("concurrency must be at least 1"));
        }

        Ok(())
    }

    /// Configured pre-release identifier, treating an empty string as unset
    pub fn prerelease_identifier(&self) -> Option<&str> {
        self.prerelease_identifier
            .as_deref()
            .filter(|id| !id.trim().is_empty())
    }
}

/// Searches `start_dir` and its ancestors for [`CONFIG_FILE_NAME`].
pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
    start_dir
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find(|candidate| candidate.is_file())
}

/// Loads configuration from file or returns defaults.
///
/// Attempts to load configuration in the following order:
/// 1. Custom path provided as parameter
/// 2. `.bmrm.toml` in `start_dir` or the nearest parent directory
/// 3. `bmrm/config.toml` in the user config directory
/// 4. Default configuration (no repositories) if no file found
///
/// # Returns
/// * `Ok(Config)` - Loaded or default configuration
/// * `Err` - If a file exists but cannot be read, parsed or validated
pub fn load_config_from(config_path: Option<&Path>, start_dir: &Path) -> Result<Config> {
    let path = if let Some(path) = config_path {
        if !path.is_file() {
            return Err(BmrmError::config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }
        Some(path.to_path_buf())
    } else if let Some(found) = find_config_file(start_dir) {
        Some(found)
    } else {
        dirs::config_dir()
            .map(|dir| dir.join("bmrm").join("config.toml"))
            .filter(|candidate| candidate.is_file())
    };

    match path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading configuration");
            let text = fs::read_to_string(&path)?;
            Config::from_toml(&text).map_err(|e| match e {
                BmrmError::TomlParse(inner) => {
                    BmrmError::config(format!("{}: {}", path.display(), inner))
                }
                other => other,
            })
        }
        None => {
            tracing::debug!("no configuration file found, using defaults");
            Ok(Config::default())
        }
    }
}

/// Loads configuration relative to the current working directory.
pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let cwd = std::env::current_dir()?;
    load_config_from(config_path, &cwd)
}

/// Writes [`DEFAULT_CONFIG_TEMPLATE`] to `path`, replacing any existing file.
pub fn write_default_config(path: &Path) -> Result<()> {
    fs::write(path, DEFAULT_CONFIG_TEMPLATE)?;
    Ok(())
}

/// Bitbucket username and app password
#[derive(Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub app_password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, app_password: impl Into<String>) -> Self {
        Credentials {
            username: username.into(),
            app_password: app_password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("app_password", &"<redacted>")
            .finish()
    }
}

/// Resolve the credentials file location.
///
/// Order: explicit path, `BMRM_CREDENTIALS_FILE`, `~/.bitbucket-multi-repo-management.toml`.
pub fn credentials_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(value) = std::env::var_os(CREDENTIALS_ENV_VAR).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(value));
    }
    dirs::home_dir().map(|home| home.join(CREDENTIALS_FILE_NAME))
}

/// Load credentials, returning `Ok(None)` when the file does not exist.
pub fn load_credentials(path: &Path) -> Result<Option<Credentials>> {
    if !path.exists() {
        return Ok(None);
    }

    let text = fs::read_to_string(path)?;
    let credentials: Credentials = toml::from_str(&text)?;
    if credentials.username.trim().is_empty() || credentials.app_password.trim().is_empty() {
        return Err(BmrmError::config(format!(
            "Credentials file {} has an empty username or app password",
            path.display()
        )));
    }

    Ok(Some(credentials))
}

/// Save credentials, readable only by the current user on Unix.
pub fn save_credentials(path: &Path, credentials: &Credentials) -> Result<()> {
    let text = toml::to_string(credentials)?;
    fs::write(path, text)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}
