//! Configuration management.
//!
//! Two pieces of state live outside the course content directory's files:
//!
//! - **Credentials**: `~/.easelrc`, a JSON file holding the LMS hostname and
//!   API token, written by `easel login`.
//! - **Tracking database**: `.easeldb` in the course content directory.
//!
//! Both are resolved once at command start. The per-command switches
//! (`--dry-run`, `--hidden`) travel in a [`SyncContext`] that is passed by
//! reference to everything that needs them.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the tracking database inside the content directory.
pub const DB_FILE: &str = ".easeldb";

/// File name of the credentials file in the home directory.
pub const CONFIG_FILE: &str = ".easelrc";

/// Hostname and API token for the remote LMS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub hostname: String,
    pub token: String,
}

impl Config {
    /// Build a config, normalizing the hostname.
    #[must_use]
    pub fn new(hostname: &str, token: &str) -> Self {
        Self {
            hostname: normalize_hostname(hostname),
            token: token.trim().to_string(),
        }
    }

    /// Load credentials from [`config_path`], then apply `EASEL_HOSTNAME`
    /// and `EASEL_TOKEN` overrides.
    ///
    /// When both variables are set the file is not required.
    ///
    /// # Errors
    ///
    /// Returns `NotLoggedIn` if no file exists and the environment does not
    /// supply both values, or `Config` if the file cannot be parsed.
    pub fn load() -> Result<Self> {
        let hostname = env_nonempty("EASEL_HOSTNAME");
        let token = env_nonempty("EASEL_TOKEN");
        if let (Some(hostname), Some(token)) = (&hostname, &token) {
            return Ok(Self::new(hostname, token));
        }

        let mut config = Self::load_from(&config_path()?)?;
        if let Some(hostname) = hostname {
            config.hostname = normalize_hostname(&hostname);
        }
        if let Some(token) = token {
            config.token = token;
        }
        Ok(config)
    }

    /// Load credentials from a specific file.
    ///
    /// # Errors
    ///
    /// Returns `NotLoggedIn` if the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::NotLoggedIn {
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?;

        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {e}", path.display())))
    }

    /// Write credentials to a specific file, readable only by the owner.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    Error::Config(format!("Failed to create config directory: {e}"))
                })?;
            }
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

        fs::write(path, content)
            .map_err(|e| Error::Config(format!("Failed to write {}: {e}", path.display())))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))
                .map_err(|e| Error::Config(format!("Failed to restrict {}: {e}", path.display())))?;
        }

        Ok(())
    }

    /// Absolute URL for an API path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("https://{}{path}", self.hostname)
    }
}

/// Strip the scheme and any trailing slash from a hostname.
#[must_use]
pub fn normalize_hostname(hostname: &str) -> String {
    let host = hostname.trim();
    let host = host
        .strip_prefix("https://")
        .or_else(|| host.strip_prefix("http://"))
        .unwrap_or(host);
    host.trim_end_matches('/').to_string()
}

/// Path of the credentials file.
///
/// `EASEL_CONFIG` wins; otherwise `~/.easelrc`.
///
/// # Errors
///
/// Returns `Config` if the home directory cannot be determined.
pub fn config_path() -> Result<PathBuf> {
    if let Some(path) = env_nonempty("EASEL_CONFIG") {
        return Ok(PathBuf::from(path));
    }
    directories::BaseDirs::new()
        .map(|b| b.home_dir().join(CONFIG_FILE))
        .ok_or_else(|| Error::Config("Could not determine home directory".into()))
}

/// Resolve the tracking database path.
///
/// Priority:
/// 1. `explicit_path` from the `--db` flag
/// 2. `EASEL_DB` environment variable
/// 3. `.easeldb` in the current directory
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit_path {
        return path.to_path_buf();
    }

    if let Some(db_path) = env_nonempty("EASEL_DB") {
        return PathBuf::from(db_path);
    }

    PathBuf::from(DB_FILE)
}

/// Get the default actor name recorded in audit events.
///
/// Priority:
/// 1. `EASEL_ACTOR` environment variable
/// 2. Git user name
/// 3. System username
/// 4. "unknown"
#[must_use]
pub fn default_actor() -> String {
    if let Some(actor) = env_nonempty("EASEL_ACTOR") {
        return actor;
    }

    if let Ok(output) = std::process::Command::new("git")
        .args(["config", "user.name"])
        .output()
    {
        if output.status.success() {
            let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !name.is_empty() {
                return name;
            }
        }
    }

    if let Ok(user) = std::env::var("USER") {
        return user;
    }

    "unknown".to_string()
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Per-command switches, built once in `main` and passed by reference.
#[derive(Debug, Clone)]
pub struct SyncContext {
    /// Print what would happen instead of doing it.
    pub dry_run: bool,
    /// Push everything unpublished, whatever the local files say.
    pub hidden: bool,
    /// Recorded as the actor of every tracking database write.
    pub actor: String,
}

impl SyncContext {
    #[must_use]
    pub fn new(dry_run: bool, hidden: bool, actor: impl Into<String>) -> Self {
        Self {
            dry_run,
            hidden,
            actor: actor.into(),
        }
    }
}

impl Default for SyncContext {
    fn default() -> Self {
        Self::new(false, false, "easel")
    }
}
