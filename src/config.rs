use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::ChannelMap;
use crate::error::{PromoteError, Result};

/// File name looked up in the current directory
pub const LOCAL_CONFIG_FILE: &str = "gitpromote.toml";

/// File name looked up in the user config directory
pub const USER_CONFIG_FILE: &str = ".gitpromote.toml";

/// Represents the complete configuration for git-promote.
///
/// Contains channel branch mappings, remote access settings, the fallback commit
/// identity, behavior switches and release policy.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub channels: ChannelMap,

    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub behavior: BehaviorConfig,

    #[serde(default)]
    pub policy: PolicyConfig,
}

fn default_remote_name() -> String {
    "origin".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_retries() -> u32 {
    1
}

fn default_retry_delay_ms() -> u64 {
    500
}

/// Remote access settings: which remote to resolve and how long to wait on it.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RemoteConfig {
    #[serde(default = "default_remote_name")]
    pub name: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra attempts for transient failures of read-only calls
    #[serde(default = "default_retries")]
    pub retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            name: default_remote_name(),
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

fn default_identity_name() -> String {
    "git-promote".to_string()
}

fn default_identity_email() -> String {
    "git-promote@localhost".to_string()
}

/// Committer used when the ambient git configuration provides none.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct IdentityConfig {
    #[serde(default = "default_identity_name")]
    pub name: String,

    #[serde(default = "default_identity_email")]
    pub email: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        IdentityConfig {
            name: default_identity_name(),
            email: default_identity_email(),
        }
    }
}

/// Configuration for behavior customization.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct BehaviorConfig {
    /// Skip confirmation prompts
    #[serde(default)]
    pub assume_yes: bool,
}

fn default_true() -> bool {
    true
}

/// Release policy applied before touching the main channel.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PolicyConfig {
    /// Refuse a release that is not strictly newer than main's current version
    #[serde(default = "default_true")]
    pub require_release_increase: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig {
            require_release_increase: true,
        }
    }
}

impl Config {
    /// Check values that serde cannot
    pub fn validate(&self) -> Result<()> {
        self.channels.validate()?;
        if self.remote.name.trim().is_empty() {
            return Err(PromoteError::config("Remote name is empty"));
        }
        if self.remote.timeout_secs == 0 {
            return Err(PromoteError::config("remote.timeout_secs must be positive"));
        }
        Ok(())
    }
}

/// Path of the per-user configuration file, if a config directory exists
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(USER_CONFIG_FILE))
}

/// Loads configuration from file or returns defaults.
///
/// Attempts to load configuration in the following order:
/// 1. Custom path provided as parameter
/// 2. `gitpromote.toml` in current directory
/// 3. `.gitpromote.toml` in user config directory
/// 4. Default configuration if no file found
///
/// # Returns
/// * `Ok(Config)` - Loaded or default configuration
/// * `Err` - If file exists but cannot be read, parsed or validated
pub fn load_config(config_path: Option<&str>) -> Result<Config> {
    let path = if let Some(path) = config_path {
        Some(PathBuf::from(path))
    } else if Path::new(LOCAL_CONFIG_FILE).exists() {
        Some(PathBuf::from(LOCAL_CONFIG_FILE))
    } else {
        user_config_path().filter(|path| path.exists())
    };

    let config = match path {
        Some(path) => parse_config_file(&path)?,
        None => Config::default(),
    };
    config.validate()?;
    Ok(config)
}

fn parse_config_file(path: &Path) -> Result<Config> {
    let text = fs::read_to_string(path).map_err(|e| {
        PromoteError::config(format!("Cannot read {}: {}", path.display(), e))
    })?;
    toml::from_str(&text)
        .map_err(|e| PromoteError::config(format!("Cannot parse {}: {}", path.display(), e)))
}

/// Write the default configuration to `path` unless a file already exists there.
///
/// Returns the configuration now stored at `path` and whether it was created.
pub fn init_config(path: &Path) -> Result<(Config, bool)> {
    if path.exists() {
        let config = parse_config_file(path)?;
        return Ok((config, false));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let config = Config::default();
    let text = toml::to_string_pretty(&config)
        .map_err(|e| PromoteError::config(format!("Cannot serialize config: {}", e)))?;
    fs::write(path, text)?;
    Ok((config, true))
}
