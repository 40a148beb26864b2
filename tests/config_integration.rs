//! Integration tests for loading configuration from files and the
//! environment.

mod test_helpers;

use std::path::PathBuf;
use std::time::Duration;

use boardsync::config::{BoardsyncConfig, ConfigError};
use rstest::rstest;
use test_helpers::EnvVarGuard;

/// Removes a temporary config file on drop.
struct ConfigFile(PathBuf);

impl ConfigFile {
    #[expect(clippy::expect_used, reason = "a test cannot continue without its file")]
    fn write(contents: &str) -> Self {
        let path = std::env::temp_dir().join(format!("boardsync-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).expect("write config file");
        Self(path)
    }
}

impl Drop for ConfigFile {
    fn drop(&mut self) {
        let _ignored = std::fs::remove_file(&self.0);
    }
}

#[rstest]
fn environment_overrides_the_file() {
    let file = ConfigFile::write(
        r#"
log = "debug"

[backend]
url = "https://board.example.com"
token = "from-file"

[merge]
automatic_retries = 1
automatic_delay = 2.5
"#,
    );
    let _env = EnvVarGuard::overrides(&[
        ("BOARDSYNC_BACKEND_TOKEN", "from-env"),
        ("BOARDSYNC_GITHUB_TOKEN", "ghp_test"),
        ("BOARDSYNC_LOG", "   "),
    ]);

    let config = BoardsyncConfig::load(Some(&file.0)).expect("config loads");

    assert_eq!(config.backend.url, "https://board.example.com");
    assert_eq!(config.backend_token().expect("backend token"), "from-env");
    assert_eq!(config.github_token().expect("github token"), "ghp_test");
    assert_eq!(config.log_directive(), "debug");
    assert_eq!(config.merge.automatic_retries, 1);
    assert_eq!(config.merge.automatic_delay, Duration::from_millis(2500));
    assert_eq!(config.merge.confirmed_delay, Duration::from_secs(5));
    assert!(config.database.url.is_none());
}

#[rstest]
fn missing_file_reports_its_path() {
    let _env = EnvVarGuard::overrides(&[]);
    let path = std::env::temp_dir().join(format!("boardsync-missing-{}.toml", uuid::Uuid::new_v4()));

    let err = BoardsyncConfig::load(Some(&path)).expect_err("missing file");

    assert!(matches!(err, ConfigError::Read { path: ref reported, .. } if *reported == path));
}

#[rstest]
fn database_url_comes_from_the_environment() {
    let _env = EnvVarGuard::overrides(&[(
        "DATABASE_URL",
        "postgres://boardsync@localhost/boardsync",
    )]);

    let config = BoardsyncConfig::load(None).expect("config loads");

    assert_eq!(
        config.database.url.as_deref(),
        Some("postgres://boardsync@localhost/boardsync")
    );
    assert!(config.backend_token().is_err());
}
