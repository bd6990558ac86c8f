use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

/// Cross-platform configuration directory manager
pub struct ConfigManager;

impl ConfigManager {
    /// Get the main configuration directory path following platform conventions:
    /// - Linux: $XDG_CONFIG_HOME/gitvault or ~/.config/gitvault
    /// - macOS: ~/Library/Application Support/gitvault
    /// - Windows: %APPDATA%\gitvault
    pub fn config_dir() -> Result<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            // Follow XDG Base Directory Specification
            if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
                Ok(PathBuf::from(xdg_config).join("gitvault"))
            } else {
                let home = dirs::home_dir().context("Failed to get home directory")?;
                Ok(home.join(".config").join("gitvault"))
            }
        }

        #[cfg(target_os = "macos")]
        {
            let home = dirs::home_dir().context("Failed to get home directory")?;
            Ok(home.join("Library").join("Application Support").join("gitvault"))
        }

        #[cfg(target_os = "windows")]
        {
            Ok(dirs::config_dir()
                .context("Failed to get Windows config directory")?
                .join("gitvault"))
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
        {
            let home = dirs::home_dir().context("Failed to get home directory")?;
            Ok(home.join(".gitvault"))
        }
    }

    /// Get the vault database path (vault.db)
    pub fn vault_db_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("vault.db"))
    }

    /// Get the app config file path (config.toml)
    pub fn app_config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Get the log file path
    pub fn log_file_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("gitvault.log"))
    }

    /// Ensure the configuration directory exists
    pub fn ensure_config_dir() -> Result<PathBuf> {
        let config_dir = Self::config_dir()?;
        fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create config directory: {}", config_dir.display()))?;
        Ok(config_dir)
    }
}

/// Application settings read from TOML in the config directory. The file is
/// user-authored; the tool never writes it.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Base URL of the GitHub REST API. Overridable for GitHub Enterprise
    /// or local test servers.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Default number of history records shown by `gitvault history`
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_history_limit() -> usize {
    20
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            api_base: default_api_base(),
            request_timeout_secs: default_timeout_secs(),
            history_limit: default_history_limit(),
        }
    }
}

impl AppConfig {
    /// Load settings from a custom path
    /// Returns defaults if the file doesn't exist
    ///
    /// # Arguments
    /// * `path` - Optional custom path to load from. If None, uses default location.
    pub fn from_path(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p,
            None => ConfigManager::app_config_path()?,
        };

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: AppConfig = toml::from_str(&content).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load settings from the default location
    pub fn load() -> Result<Self> {
        Self::from_path(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_paths() {
        // Just ensure they don't panic and return valid paths
        let config_dir = ConfigManager::config_dir().unwrap();
        assert!(config_dir.to_string_lossy().contains("gitvault"));

        let db_path = ConfigManager::vault_db_path().unwrap();
        assert!(db_path.to_string_lossy().contains("vault.db"));

        let config_path = ConfigManager::app_config_path().unwrap();
        assert!(config_path.to_string_lossy().contains("config.toml"));

        let log = ConfigManager::log_file_path().unwrap();
        assert!(log.to_string_lossy().contains("gitvault.log"));
    }

    #[test]
    #[cfg(target_os = "linux")]
    #[serial_test::serial]
    fn test_xdg_config_home_respected() {
        std::env::set_var("XDG_CONFIG_HOME", "/tmp/test-xdg-config");
        let config_dir = ConfigManager::config_dir().unwrap();
        assert!(config_dir
            .to_string_lossy()
            .contains("/tmp/test-xdg-config/gitvault"));
        std::env::remove_var("XDG_CONFIG_HOME");
    }

    #[test]
    fn test_app_config_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.api_base, "https://api.github.com");
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.history_limit, 20);
    }

    #[test]
    fn test_app_config_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::from_path(Some(dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.api_base, default_api_base());
    }

    #[test]
    fn test_app_config_reads_every_field() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            concat!(
                "api_base = \"http://127.0.0.1:9999\"\n",
                "request_timeout_secs = 5\n",
                "history_limit = 3\n",
            ),
        )
        .unwrap();

        let loaded = AppConfig::from_path(Some(path)).unwrap();
        assert_eq!(loaded.api_base, "http://127.0.0.1:9999");
        assert_eq!(loaded.request_timeout_secs, 5);
        assert_eq!(loaded.history_limit, 3);
    }

    #[test]
    fn test_app_config_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "request_timeout_secs = 10\n").unwrap();

        let config = AppConfig::from_path(Some(path)).unwrap();
        assert_eq!(config.request_timeout_secs, 10);
        assert_eq!(config.api_base, default_api_base());
        assert_eq!(config.history_limit, default_history_limit());
    }
}
