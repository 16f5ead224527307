//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/tvm/config.toml)
//! 3. Environment variables (TVM_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment variable prefix
const ENV_PREFIX: &str = "TVM";

/// Days ahead of today in which an expected episode raises a status warning
pub const DEFAULT_WARNING_DAYS: u32 = 7;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for data storage (SQLite db, log file)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Sync server base URL (optional)
    #[serde(default)]
    pub sync_url: Option<String>,

    /// Width of the status warning window, in days
    #[serde(default = "default_warning_days")]
    pub status_warning_days: u32,

    /// Log file (defaults to `data_dir/tvm.log`)
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            sync_url: None,
            status_warning_days: DEFAULT_WARNING_DAYS,
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (TVM_DATA_DIR, TVM_SYNC_URL, TVM_WARNING_DAYS, TVM_LOG_FILE)
    /// 2. Config file (~/.config/tvm/config.toml or TVM_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // TVM_DATA_DIR
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        // TVM_SYNC_URL
        if let Ok(val) = std::env::var(format!("{}_SYNC_URL", ENV_PREFIX)) {
            self.sync_url = if val.is_empty() { None } else { Some(val) };
        }

        // TVM_WARNING_DAYS
        if let Ok(val) = std::env::var(format!("{}_WARNING_DAYS", ENV_PREFIX)) {
            match val.parse() {
                Ok(days) => self.status_warning_days = days,
                Err(_) => warn!(value = %val, "Ignoring invalid TVM_WARNING_DAYS"),
            }
        }

        // TVM_LOG_FILE
        if let Ok(val) = std::env::var(format!("{}_LOG_FILE", ENV_PREFIX)) {
            self.log_file = if val.is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
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
    /// Can be overridden with TVM_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tvm")
            .join("config.toml")
    }

    /// Get the path to the SQLite database
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("tvmanager.db")
    }

    /// Get the path to the log file
    pub fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("tvm.log"))
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tvm")
}

fn default_warning_days() -> u32 {
    DEFAULT_WARNING_DAYS
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Locks env access and restores the listed vars on drop
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "TVM_DATA_DIR",
        "TVM_SYNC_URL",
        "TVM_WARNING_DAYS",
        "TVM_LOG_FILE",
        "TVM_CONFIG",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.sync_url.is_none());
        assert_eq!(config.status_warning_days, 7);
        assert!(config.data_dir.ends_with("tvm"));
    }

    #[test]
    fn test_file_paths() {
        let config = Config {
            data_dir: PathBuf::from("/data/tvm"),
            ..Config::default()
        };

        assert_eq!(config.database_path(), PathBuf::from("/data/tvm/tvmanager.db"));
        assert_eq!(config.log_path(), PathBuf::from("/data/tvm/tvm.log"));

        let config = Config {
            log_file: Some(PathBuf::from("/var/log/tvm.log")),
            ..config
        };
        assert_eq!(config.log_path(), PathBuf::from("/var/log/tvm.log"));
    }

    #[test]
    fn test_env_override_data_dir() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("TVM_DATA_DIR", "/tmp/tvm-test");
        config.apply_env_overrides();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/tvm-test"));
    }

    #[test]
    fn test_env_override_warning_days() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("TVM_WARNING_DAYS", "14");
        config.apply_env_overrides();
        assert_eq!(config.status_warning_days, 14);

        // Garbage keeps the previous value
        env::set_var("TVM_WARNING_DAYS", "soon");
        config.apply_env_overrides();
        assert_eq!(config.status_warning_days, 14);
    }

    #[test]
    fn test_env_override_sync_url() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        assert!(config.sync_url.is_none());

        env::set_var("TVM_SYNC_URL", "http://localhost:3000");
        config.apply_env_overrides();
        assert_eq!(config.sync_url, Some("http://localhost:3000".to_string()));

        // Empty string clears it
        env::set_var("TVM_SYNC_URL", "");
        config.apply_env_overrides();
        assert!(config.sync_url.is_none());
    }

    #[test]
    fn test_env_override_config_path() {
        let _guard = EnvGuard::new(ENV_VARS);

        env::set_var("TVM_CONFIG", "/etc/tvm.toml");
        assert_eq!(Config::config_file_path(), PathBuf::from("/etc/tvm.toml"));
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            data_dir = "/custom/data"
            sync_url = "http://example.com"
            status_warning_days = 3
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(config.sync_url, Some("http://example.com".to_string()));
        assert_eq!(config.status_warning_days, 3);
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_save_and_reload() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let config = Config {
            data_dir: PathBuf::from("/data/tvm"),
            sync_url: Some("http://sync.example.com".to_string()),
            status_warning_days: 10,
            log_file: None,
        };
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.data_dir, config.data_dir);
        assert_eq!(loaded.sync_url, config.sync_url);
        assert_eq!(loaded.status_warning_days, 10);
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);

        let path = PathBuf::from("/nonexistent/config.toml");
        let config = Config::load_from_path(&path).unwrap();
        assert!(config.sync_url.is_none());
        assert_eq!(config.status_warning_days, DEFAULT_WARNING_DAYS);
    }
}
