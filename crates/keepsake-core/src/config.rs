//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/keepsake/config.toml)
//! 3. Environment variables (KEEPSAKE_* prefix)
//!
//! Environment variables take precedence over config file values.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::codec::Compression;
use crate::fetch::FetchPolicy;
use crate::pipeline::MimePolicy;

/// Environment variable prefix
const ENV_PREFIX: &str = "KEEPSAKE";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for data storage (SQLite db)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Largest snapshot accepted, in megabytes
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u64,

    /// Pattern classified MIME types must match (anchored at the start)
    #[serde(default = "default_allowed_mime_regex")]
    pub allowed_mime_regex: String,

    /// Wall-clock budget for one fetch, in seconds
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Redirects followed before giving up
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Compression used when a capture does not ask for one
    #[serde(default)]
    pub default_compression: Compression,

    /// User-Agent sent with snapshot fetches
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Recorded as the creator of new snapshots
    #[serde(default = "default_created_by")]
    pub created_by: String,

    /// Log file path (logs to stderr when unset)
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            max_size_mb: default_max_size_mb(),
            allowed_mime_regex: default_allowed_mime_regex(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_redirects: default_max_redirects(),
            default_compression: Compression::default(),
            user_agent: default_user_agent(),
            created_by: default_created_by(),
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (KEEPSAKE_DATA_DIR, KEEPSAKE_MAX_SIZE_MB, ...)
    /// 2. Config file (~/.config/keepsake/config.toml or KEEPSAKE_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring a path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides()?;
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(val) = env_var("DATA_DIR") {
            self.data_dir = PathBuf::from(val);
        }

        if let Some(val) = env_var("MAX_SIZE_MB") {
            self.max_size_mb = val
                .parse()
                .with_context(|| format!("Invalid {}_MAX_SIZE_MB: {}", ENV_PREFIX, val))?;
        }

        if let Some(val) = env_var("ALLOWED_MIME_REGEX") {
            self.allowed_mime_regex = val;
        }

        if let Some(val) = env_var("FETCH_TIMEOUT_SECS") {
            self.fetch_timeout_secs = val
                .parse()
                .with_context(|| format!("Invalid {}_FETCH_TIMEOUT_SECS: {}", ENV_PREFIX, val))?;
        }

        if let Some(val) = env_var("MAX_REDIRECTS") {
            self.max_redirects = val
                .parse()
                .with_context(|| format!("Invalid {}_MAX_REDIRECTS: {}", ENV_PREFIX, val))?;
        }

        if let Some(val) = env_var("DEFAULT_COMPRESSION") {
            self.default_compression = val.parse()?;
        }

        if let Some(val) = env_var("USER") {
            if !val.is_empty() {
                self.created_by = val;
            }
        }

        Ok(())
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &PathBuf) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with KEEPSAKE_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("keepsake")
            .join("config.toml")
    }

    /// Get the path to the SQLite database
    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join("keepsake.db")
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Fetch limits derived from this configuration
    pub fn fetch_policy(&self) -> FetchPolicy {
        FetchPolicy {
            timeout: self.fetch_timeout(),
            max_redirects: self.max_redirects,
            max_size_bytes: self.max_size_bytes(),
        }
    }

    /// Compile the allowed MIME pattern
    pub fn mime_policy(&self) -> Result<MimePolicy> {
        MimePolicy::new(&self.allowed_mime_regex).with_context(|| {
            format!(
                "Invalid allowed_mime_regex in configuration: {}",
                self.allowed_mime_regex
            )
        })
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(format!("{}_{}", ENV_PREFIX, name)).ok()
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("keepsake")
}

fn default_max_size_mb() -> u64 {
    25
}

fn default_allowed_mime_regex() -> String {
    ".*".to_string()
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_max_redirects() -> usize {
    10
}

fn default_user_agent() -> String {
    format!("keepsake/{}", env!("CARGO_PKG_VERSION"))
}

fn default_created_by() -> String {
    std::env::var("USER")
        .ok()
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| "local".to_string())
}
