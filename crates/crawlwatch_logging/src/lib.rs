#![deny(missing_docs)]
//! Shared logging utilities for the crawlwatch workspace.
//!
//! Every crate logs through the `cw_*` macros so that output carries the
//! workspace target and can be filtered in one place. Logger installation
//! lives here too, so the binary and the test suites configure `simplelog`
//! the same way.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Once;

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

/// Log target used by all `cw_*` macros.
pub const LOG_TARGET: &str = "crawlwatch";

/// Logs a trace-level message under the crawlwatch target.
#[macro_export]
macro_rules! cw_trace {
    ($($arg:tt)*) => {{
        log::trace!(target: $crate::LOG_TARGET, $($arg)*);
    }};
}

/// Logs a debug-level message under the crawlwatch target.
#[macro_export]
macro_rules! cw_debug {
    ($($arg:tt)*) => {{
        log::debug!(target: $crate::LOG_TARGET, $($arg)*);
    }};
}

/// Logs an info-level message under the crawlwatch target.
#[macro_export]
macro_rules! cw_info {
    ($($arg:tt)*) => {{
        log::info!(target: $crate::LOG_TARGET, $($arg)*);
    }};
}

/// Logs a warn-level message under the crawlwatch target.
#[macro_export]
macro_rules! cw_warn {
    ($($arg:tt)*) => {{
        log::warn!(target: $crate::LOG_TARGET, $($arg)*);
    }};
}

/// Logs an error-level message under the crawlwatch target.
#[macro_export]
macro_rules! cw_error {
    ($($arg:tt)*) => {{
        log::error!(target: $crate::LOG_TARGET, $($arg)*);
    }};
}

/// Destination for log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogDestination {
    /// Write to the configured log file only.
    File,
    /// Write to the terminal.
    #[default]
    Terminal,
    /// Write to both the terminal and the log file.
    Both,
}

/// Logger settings, usually taken from the application config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Maximum level that is emitted.
    pub level: LevelFilter,
    /// Where records go.
    pub destination: LogDestination,
    /// File used by [`LogDestination::File`] and [`LogDestination::Both`].
    pub file: PathBuf,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: LevelFilter::Info,
            destination: LogDestination::Terminal,
            file: PathBuf::from("./crawlwatch.log"),
        }
    }
}

/// Parses a level name such as `"debug"`; unknown names fall back to `Info`.
pub fn parse_level(name: &str) -> LevelFilter {
    name.trim().parse().unwrap_or(LevelFilter::Info)
}

/// Installs the global logger.
///
/// Returns the loggers that were actually installed; a log file that cannot
/// be created is reported on stderr and skipped. When nothing can be
/// installed, or a logger is already set, this is a no-op.
pub fn init(settings: &LogSettings) -> usize {
    let loggers = build_loggers(settings);
    let count = loggers.len();
    if count == 0 {
        return 0;
    }
    match CombinedLogger::init(loggers) {
        Ok(()) => count,
        Err(_) => 0,
    }
}

fn build_loggers(settings: &LogSettings) -> Vec<Box<dyn SharedLogger>> {
    let config = build_config();
    let terminal = || -> Box<dyn SharedLogger> {
        TermLogger::new(
            settings.level,
            config.clone(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        )
    };

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    if matches!(
        settings.destination,
        LogDestination::Terminal | LogDestination::Both
    ) {
        loggers.push(terminal());
    }
    if matches!(
        settings.destination,
        LogDestination::File | LogDestination::Both
    ) {
        match create_file_logger(settings.level, config.clone(), &settings.file) {
            Some(file_logger) => loggers.push(file_logger),
            None if settings.destination == LogDestination::File => loggers.push(terminal()),
            None => {}
        }
    }
    loggers
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build()
}

fn create_file_logger(
    level: LevelFilter,
    config: Config,
    path: &Path,
) -> Option<Box<WriteLogger<File>>> {
    match File::create(path) {
        Ok(file) => Some(WriteLogger::new(level, config, file)),
        Err(err) => {
            eprintln!("Warning: Could not create log file at {:?}: {}", path, err);
            None
        }
    }
}

/// Initializes a debug-level terminal logger for use in tests.
///
/// Safe to call from every test; only the first call installs anything.
pub fn initialize_for_tests() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let level = if cfg!(debug_assertions) {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        };
        // Another harness may already own the global logger.
        let _ = CombinedLogger::init(vec![TermLogger::new(
            level,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        )]);
    });
}
