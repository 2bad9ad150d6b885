#![deny(missing_docs)]
//! Shared logging utilities for the harvester workspace.
//!
//! This crate provides the `engine_*` logging macros used across the codebase,
//! the runner's console + file logger setup, and a minimal test initializer
//! for the global logger.

use std::fs::File;
use std::path::{Path, PathBuf};

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! engine_trace {
    ($($arg:tt)*) => {{
        log::trace!($($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! engine_info {
    ($($arg:tt)*) => {{
        log::info!($($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! engine_debug {
    ($($arg:tt)*) => {{
        log::debug!($($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! engine_warn {
    ($($arg:tt)*) => {{
        log::warn!($($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! engine_error {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
    }};
}

/// Destination for log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogDestination {
    /// Write to the configured log file only.
    File,
    /// Write to terminal only.
    Terminal,
    /// Write to both file and terminal.
    Both,
}

/// Levels and file location used by [`initialize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Path of the log file (created or truncated on start).
    pub file_path: PathBuf,
    /// Minimum level written to the log file.
    pub file_level: LevelFilter,
    /// Minimum level written to the terminal.
    pub terminal_level: LevelFilter,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            file_path: PathBuf::from("LogFile.log"),
            file_level: LevelFilter::Info,
            terminal_level: LevelFilter::Error,
        }
    }
}

/// Initialize the global logger with the specified destination.
///
/// Returns `false` when no logger could be installed, either because the log
/// file could not be created for `LogDestination::File` or because another
/// logger is already registered.
pub fn initialize(destination: LogDestination, settings: &LogSettings) -> bool {
    let config = build_config();

    let loggers: Vec<Box<dyn SharedLogger>> = match destination {
        LogDestination::File => match create_file_logger(settings, config) {
            Some(file_logger) => vec![file_logger],
            None => return false,
        },
        LogDestination::Terminal => vec![terminal_logger(settings.terminal_level, config)],
        LogDestination::Both => {
            let mut loggers: Vec<Box<dyn SharedLogger>> =
                vec![terminal_logger(settings.terminal_level, config.clone())];
            if let Some(file_logger) = create_file_logger(settings, config) {
                loggers.push(file_logger);
            }
            loggers
        }
    };

    CombinedLogger::init(loggers).is_ok()
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build()
}

fn terminal_logger(level: LevelFilter, config: Config) -> Box<TermLogger> {
    TermLogger::new(level, config, TerminalMode::Mixed, ColorChoice::Auto)
}

fn create_file_logger(settings: &LogSettings, config: Config) -> Option<Box<WriteLogger<File>>> {
    match open_log_file(&settings.file_path) {
        Ok(file) => Some(WriteLogger::new(settings.file_level, config, file)),
        Err(err) => {
            eprintln!(
                "Warning: Could not create log file at {:?}: {}",
                settings.file_path, err
            );
            None
        }
    }
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    File::create(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_split_console_and_file_levels() {
        let settings = LogSettings::default();
        assert_eq!(settings.file_level, LevelFilter::Info);
        assert_eq!(settings.terminal_level, LevelFilter::Error);
        assert_eq!(settings.file_path, PathBuf::from("LogFile.log"));
    }

    #[test]
    fn log_file_parent_directories_are_created() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("logs").join("harvest.log");
        open_log_file(&path).unwrap();
        assert!(path.exists());
    }
}
