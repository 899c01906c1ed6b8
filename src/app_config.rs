//! Module for application configuration settings.
//!
//! User configurations may be specified in a configuration file. Command-line flags are applied
//! on top of whatever the file says.

use secrecy::SecretString;
use thiserror::Error;
use tracing::debug;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_API_URL: &str = "https://api.opensuse.org";

fn obs_fs_runtime_dir() -> Option<PathBuf> {
    let runtime_dir = dirs::runtime_dir();
    if let Some(path) = runtime_dir {
        return Some(path.join("obs-fs"));
    }

    let home_dir = dirs::home_dir();
    if let Some(path) = home_dir {
        return Some(path.join(".local").join("share").join("obs-fs"));
    }

    None
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_owned()
}

fn default_pid_file() -> PathBuf {
    obs_fs_runtime_dir().map_or_else(
        || PathBuf::from("/var/run/obs-fs.pid"),
        |rd| rd.join("obs-fs.pid"),
    )
}

fn default_mount_point() -> PathBuf {
    obs_fs_runtime_dir().map_or_else(|| PathBuf::from("/tmp/obs-fs/mnt"), |rd| rd.join("mnt"))
}

fn current_uid() -> u32 {
    nix::unistd::Uid::current().as_raw()
}

fn current_gid() -> u32 {
    nix::unistd::Gid::current().as_raw()
}

/// Node freshness and handle limits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CacheConfig {
    /// Seconds a refreshed node stays fresh. Zero disables caching.
    pub ttl_secs: u64,

    /// Keep build artifacts in memory once read.
    pub cache_binaries: bool,

    /// Number of file handles that can be open at once.
    pub handle_capacity: usize,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 60 * 60,
            cache_binaries: false,
            handle_capacity: 1024,
        }
    }
}

/// Which kinds of projects are listed at the root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ProjectsConfig {
    /// List `home:` projects.
    pub include_homes: bool,

    /// List `:Maintenance:` projects.
    pub include_maintenance: bool,

    /// List PTF projects.
    pub include_ptf: bool,
}

/// Credentials for the OBS API. Only ever sent over https.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CredentialsConfig {
    /// Account name.
    pub user: Option<String>,

    /// Account password.
    pub password: Option<SecretString>,
}

/// Daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DaemonConfig {
    /// The path to the PID file for the daemon.
    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,

    /// Where a daemonized process writes its log. Discarded if unset.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            pid_file: default_pid_file(),
            log_file: None,
        }
    }
}

/// Application configuration structure.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Base URL of the OBS API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub projects: ProjectsConfig,

    #[serde(default)]
    pub credentials: CredentialsConfig,

    #[serde(default)]
    pub daemon: DaemonConfig,

    /// The mount point for the filesystem.
    #[serde(default = "default_mount_point")]
    pub mount_point: PathBuf,

    /// The user owning every node. If not specified, the current user.
    #[serde(default = "current_uid")]
    pub uid: u32,

    /// The group owning every node. If not specified, the current group.
    #[serde(default = "current_gid")]
    pub gid: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            cache: CacheConfig::default(),
            projects: ProjectsConfig::default(),
            credentials: CredentialsConfig::default(),
            daemon: DaemonConfig::default(),
            mount_point: default_mount_point(),
            uid: current_uid(),
            gid: current_gid(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration validation errors: {0:?}")]
    ValidationErrors(Vec<String>),

    #[error("Deserialization error: {0}")]
    DeserializationError(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl Config {
    /// Validate the correctness of the configuration.
    ///
    /// Returns:
    /// - `Ok(())` if the configuration is valid.
    /// - `Err(Vec<String>)` containing a list of validation error messages otherwise.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !(self.api_url.starts_with("https://") || self.api_url.starts_with("http://")) {
            errors.push(format!(
                "API URL '{}' must start with http:// or https://.",
                self.api_url
            ));
        }

        if self.daemon.pid_file.parent().is_none() {
            errors.push(format!(
                "PID file path '{}' has no parent directory.",
                self.daemon.pid_file.display()
            ));
        }

        if self.cache.handle_capacity == 0 {
            errors.push("Handle capacity must be at least 1.".to_owned());
        }

        if self.credentials.password.is_some() && self.credentials.user.is_none() {
            errors.push("A password was configured without a user.".to_owned());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Returns config file paths in descending priority order.
    /// On macOS, skips `dirs::config_dir()` (resolves to ~/Library/Application Support/).
    fn config_search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        #[cfg(not(target_os = "macos"))]
        if let Some(xdg) = dirs::config_dir() {
            paths.push(xdg.join("obs-fs").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".config").join("obs-fs").join("config.toml"));
        }

        paths.push(PathBuf::from("/etc/obs-fs/config.toml"));

        paths
    }

    /// Finds the first existing config file from search paths.
    fn find_config_file() -> Option<PathBuf> {
        Self::config_search_paths().into_iter().find(|p| p.exists())
    }

    /// Loads config from a single TOML file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = ?path, "Loading configuration file.");
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Loads configuration from the external path if given, else the first file found.
    pub fn load(external_config_path: Option<&Path>) -> Option<Result<Self, ConfigError>> {
        if let Some(path) = external_config_path {
            return Some(Self::load_from_file(path));
        }

        Self::find_config_file().map(|path| Self::load_from_file(&path))
    }

    /// Loads config, falling back to defaults if no file exists.
    /// Errors if a config file exists but is malformed or invalid.
    pub fn load_or_default(external_config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(res) = Self::load(external_config_path) else {
            debug!("No configuration file found, using defaults.");
            return Ok(Self::default());
        };

        let config = res?;
        if let Err(validation_errors) = config.validate() {
            return Err(ConfigError::ValidationErrors(validation_errors));
        }
        debug!("Loaded configuration successfully.");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use secrecy::ExposeSecret as _;

    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.cache, CacheConfig::default());
        assert_eq!(config.cache.ttl(), Duration::from_secs(3600));
        assert!(!config.projects.include_homes);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn kebab_case_keys() {
        let config: Config = toml::from_str(
            r#"
            api-url = "https://api.suse.de"
            mount-point = "/mnt/obs"

            [cache]
            ttl-secs = 0
            cache-binaries = true

            [projects]
            include-homes = true

            [credentials]
            user = "alice"
            password = "secret"
            "#,
        )
        .unwrap();
        assert_eq!(config.api_url, "https://api.suse.de");
        assert_eq!(config.mount_point, PathBuf::from("/mnt/obs"));
        assert_eq!(config.cache.ttl(), Duration::ZERO);
        assert!(config.cache.cache_binaries);
        assert_eq!(config.cache.handle_capacity, 1024);
        assert!(config.projects.include_homes);
        assert!(!config.projects.include_ptf);
        assert_eq!(config.credentials.user.as_deref(), Some("alice"));
        assert_eq!(
            config.credentials.password.unwrap().expose_secret(),
            "secret"
        );
    }

    #[test]
    fn validation_collects_every_problem() {
        let mut config = Config::default();
        config.api_url = "ftp://example.org".to_owned();
        config.cache.handle_capacity = 0;
        config.credentials.password = Some(SecretString::from("x".to_owned()));
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3, "{errors:?}");
    }

    #[test]
    fn explicit_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "api-url = \"http://localhost:3000\"\n").unwrap();
        let config = Config::load_or_default(Some(&path)).unwrap();
        assert_eq!(config.api_url, "http://localhost:3000");

        std::fs::write(&path, "api-url = 3\n").unwrap();
        assert!(matches!(
            Config::load_or_default(Some(&path)),
            Err(ConfigError::DeserializationError(_))
        ));
    }
}
