use anyhow::{Context, Result};
use log::LevelFilter;
use std::fs::OpenOptions;
use std::io::Write;

use crate::config::ConfigManager;

/// Initialize the logging system
///
/// Sets up logging to both console and a log file in the config directory.
///
/// **Console logging** can be controlled via the `RUST_LOG` environment variable:
/// - `RUST_LOG=error` - Only errors
/// - `RUST_LOG=warn` - Warnings and errors
/// - `RUST_LOG=info` - Info, warnings, and errors (default)
/// - `RUST_LOG=debug` - Debug and above
///
/// **File logging** is stored at:
/// - Linux: ~/.config/gitvault/gitvault.log or $XDG_CONFIG_HOME/gitvault/gitvault.log
/// - macOS: ~/Library/Application Support/gitvault/gitvault.log
/// - Windows: %APPDATA%\gitvault\gitvault.log
///
/// Tokens, passwords, and derived keys are never written to either sink.
pub fn init_logger() -> Result<()> {
    // Ensure config directory exists
    ConfigManager::ensure_config_dir()?;

    // By default, use Info level unless RUST_LOG is set
    let default_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|s| s.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info);

    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{:5}] {}",
                chrono::Local::now().format("%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter_level(default_level)
        .target(env_logger::Target::Stdout)
        .try_init()
        .ok(); // Ignore error if logger is already initialized

    log_to_file(&format!("Logger initialized with level: {default_level:?}"))?;

    Ok(())
}

/// Log to file only (used for raw transport payloads kept out of console output)
pub fn log_to_file(message: &str) -> Result<()> {
    let log_path = ConfigManager::log_file_path()?;

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file: {}", log_path.display()))?;

    writeln!(
        file,
        "[{}] {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        message
    )?;

    Ok(())
}

/// Rotate log file if it exceeds the size limit (default: 10MB)
pub fn rotate_log_if_needed() -> Result<()> {
    const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024; // 10MB

    let log_path = ConfigManager::log_file_path()?;

    if log_path.exists() {
        let metadata = std::fs::metadata(&log_path)?;

        if metadata.len() > MAX_LOG_SIZE {
            // Rotate: rename current log to .old and start fresh
            let old_log_path = log_path.with_extension("log.old");

            if old_log_path.exists() {
                std::fs::remove_file(&old_log_path)?;
            }

            std::fs::rename(&log_path, &old_log_path)?;

            log::info!("Log file rotated to {}", old_log_path.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    #[serial_test::serial]
    fn test_init_logger_succeeds() {
        let result = init_logger();
        assert!(result.is_ok());
    }

    #[test]
    #[serial_test::serial]
    fn test_log_to_file() -> Result<()> {
        ConfigManager::ensure_config_dir()?;
        log_to_file("Test log message")?;

        let log_path = ConfigManager::log_file_path()?;
        assert!(log_path.exists());

        let contents = std::fs::read_to_string(&log_path)?;
        assert!(contents.contains("Test log message"));

        Ok(())
    }

    #[test]
    #[serial_test::serial]
    fn test_rotate_log_creates_backup() -> Result<()> {
        ConfigManager::ensure_config_dir()?;
        let log_path = ConfigManager::log_file_path()?;
        let mut file = File::create(&log_path)?;

        // Write 11MB of data
        let data = vec![b'a'; 11 * 1024 * 1024];
        file.write_all(&data)?;
        drop(file);

        rotate_log_if_needed()?;

        let old_log_path = log_path.with_extension("log.old");
        assert!(old_log_path.exists());

        if log_path.exists() {
            let metadata = std::fs::metadata(&log_path)?;
            assert!(metadata.len() < 11 * 1024 * 1024);
        }

        // Cleanup
        if old_log_path.exists() {
            std::fs::remove_file(&old_log_path)?;
        }

        Ok(())
    }
}
