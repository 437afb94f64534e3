// tests/config_test.rs
use bmrm::config::{
    credentials_path, find_config_file, load_config_from, load_credentials, save_credentials,
    write_default_config, Config, Credentials, CONFIG_FILE_NAME, CREDENTIALS_ENV_VAR,
};
use serial_test::serial;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::{NamedTempFile, TempDir};

#[test]
fn test_load_default_config() {
    let config = Config::default();
    assert!(config.repositories.is_empty());
    assert_eq!(config.prerelease_identifier, None);
    assert_eq!(config.version_prefix, "");
    assert_eq!(config.concurrency, 1);
}

#[test]
fn test_load_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();
    let toml_content = r#"
repositories = ["acme/api", "acme/web"]
prerelease_identifier = "beta"
version_prefix = "v"
concurrency = 4
"#;
    temp_file.write_all(toml_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let dir = TempDir::new().unwrap();
    let config = load_config_from(Some(temp_file.path()), dir.path()).unwrap();
    let repos: Vec<&str> = config.repositories.iter().map(|r| r.as_str()).collect();
    assert_eq!(repos, vec!["acme/api", "acme/web"]);
    assert_eq!(config.prerelease_identifier(), Some("beta"));
    assert_eq!(config.version_prefix, "v");
    assert_eq!(config.concurrency, 4);
}

#[test]
fn test_explicit_missing_path_is_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");
    let result = load_config_from(Some(&missing), dir.path());
    assert!(result.unwrap_err().to_string().contains("not found"));
}

#[test]
fn test_discovery_walks_up_from_nested_directory() {
    let root = TempDir::new().unwrap();
    fs::write(
        root.path().join(CONFIG_FILE_NAME),
        r#"repositories = ["org/root"]"#,
    )
    .unwrap();
    let nested = root.path().join("a").join("b");
    fs::create_dir_all(&nested).unwrap();

    assert_eq!(
        find_config_file(&nested),
        Some(root.path().join(CONFIG_FILE_NAME))
    );
    let config = load_config_from(None, &nested).unwrap();
    assert_eq!(config.repositories[0].as_str(), "org/root");
}

#[test]
fn test_discovery_prefers_nearest_file() {
    let root = TempDir::new().unwrap();
    fs::write(
        root.path().join(CONFIG_FILE_NAME),
        r#"repositories = ["org/root"]"#,
    )
    .unwrap();
    let child = root.path().join("child");
    fs::create_dir_all(&child).unwrap();
    fs::write(child.join(CONFIG_FILE_NAME), r#"repositories = ["org/child"]"#).unwrap();

    let config = load_config_from(None, &child).unwrap();
    assert_eq!(config.repositories[0].as_str(), "org/child");
}

#[test]
fn test_invalid_repository_identifier_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    fs::write(&path, r#"repositories = ["org/a", "no-slash"]"#).unwrap();

    let err = load_config_from(Some(&path), dir.path()).unwrap_err();
    assert!(err.to_string().contains("no-slash"));
    assert!(err.is_configuration_error());
}

#[test]
fn test_written_default_config_loads() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    write_default_config(&path).unwrap();

    let config = load_config_from(Some(&path), dir.path()).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_credentials_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("creds.toml");
    let creds = Credentials::new("alice", "app-pass-123");

    save_credentials(&path, &creds).unwrap();
    assert_eq!(load_credentials(&path).unwrap(), Some(creds));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[test]
fn test_missing_credentials_file_is_none() {
    let dir = TempDir::new().unwrap();
    assert_eq!(load_credentials(&dir.path().join("absent.toml")).unwrap(), None);
}

#[test]
fn test_credentials_with_empty_password_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("creds.toml");
    fs::write(&path, "username = \"alice\"\napp_password = \"\"\n").unwrap();
    assert!(load_credentials(&path).is_err());
}

#[test]
#[serial]
fn test_credentials_path_explicit_wins_over_env() {
    std::env::set_var(CREDENTIALS_ENV_VAR, "/tmp/from-env.toml");
    let explicit = Path::new("/tmp/explicit.toml");
    assert_eq!(
        credentials_path(Some(explicit)),
        Some(explicit.to_path_buf())
    );
    std::env::remove_var(CREDENTIALS_ENV_VAR);
}

#[test]
#[serial]
fn test_credentials_path_from_env() {
    std::env::set_var(CREDENTIALS_ENV_VAR, "/tmp/from-env.toml");
    assert_eq!(
        credentials_path(None),
        Some(Path::new("/tmp/from-env.toml").to_path_buf())
    );
    std::env::remove_var(CREDENTIALS_ENV_VAR);
}

#[test]
#[serial]
fn test_credentials_path_defaults_to_home() {
    std::env::remove_var(CREDENTIALS_ENV_VAR);
    if let Some(path) = credentials_path(None) {
        assert!(path.ends_with(".bitbucket-multi-repo-management.toml"));
    }
}
