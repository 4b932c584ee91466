use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crawlwatch_core::{FilterState, ReconnectPolicy, DEFAULT_PAGE_SIZE};
use crawlwatch_engine::{BatchSettings, ClientSettings, EngineConfig, DEFAULT_API_BASE_URL};
use crawlwatch_logging::{parse_level, LogDestination, LogSettings};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "crawlwatch.ron";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
}

/// Where a loaded config came from. Reported once logging is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    File,
    Defaults,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconnectConfig {
    Fixed { secs: u64 },
    Exponential { initial_secs: u64, max_secs: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogOutput {
    Terminal,
    File,
    Both,
}

/// Contents of `crawlwatch.ron`. Every field may be omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub page_size: u32,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub reconnect: ReconnectConfig,
    pub batch_max_in_flight: usize,
    pub log_level: String,
    pub log_destination: LogOutput,
    pub log_file: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            reconnect: ReconnectConfig::Fixed { secs: 5 },
            batch_max_in_flight: 1,
            log_level: "info".to_string(),
            log_destination: LogOutput::Terminal,
            log_file: PathBuf::from("./crawlwatch.log"),
        }
    }
}

impl AppConfig {
    /// Reads the config at `path`; a missing file means defaults.
    pub fn load(path: &Path) -> Result<(Self, ConfigSource), ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok((Self::default(), ConfigSource::Defaults));
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let config = ron::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok((config, ConfigSource::File))
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            client: ClientSettings {
                base_url: self.base_url.clone(),
                connect_timeout: Duration::from_secs(self.connect_timeout_secs),
                request_timeout: Duration::from_secs(self.request_timeout_secs),
            },
            reconnect: match self.reconnect {
                ReconnectConfig::Fixed { secs } => ReconnectPolicy::Fixed(Duration::from_secs(secs)),
                ReconnectConfig::Exponential {
                    initial_secs,
                    max_secs,
                } => ReconnectPolicy::Exponential {
                    initial: Duration::from_secs(initial_secs),
                    max: Duration::from_secs(max_secs.max(initial_secs)),
                },
            },
            batch: BatchSettings {
                max_in_flight: self.batch_max_in_flight.max(1),
            },
        }
    }

    pub fn log_settings(&self) -> LogSettings {
        LogSettings {
            level: parse_level(&self.log_level),
            destination: match self.log_destination {
                LogOutput::Terminal => LogDestination::Terminal,
                LogOutput::File => LogDestination::File,
                LogOutput::Both => LogDestination::Both,
            },
            file: self.log_file.clone(),
        }
    }

    pub fn initial_filter(&self) -> FilterState {
        FilterState::with_page_size(self.page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::LevelFilter;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (config, source) = AppConfig::load(&dir.path().join("absent.ron")).unwrap();
        assert_eq!(source, ConfigSource::Defaults);
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.initial_filter().page_size, 5);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crawlwatch.ron");
        fs::write(
            &path,
            r#"(
                base_url: "https://crawler.internal/api/v1",
                reconnect: Exponential(initial_secs: 2, max_secs: 60),
                log_level: "debug",
                log_destination: Both,
            )"#,
        )
        .unwrap();

        let (config, source) = AppConfig::load(&path).unwrap();
        assert_eq!(source, ConfigSource::File);
        assert_eq!(config.base_url, "https://crawler.internal/api/v1");
        assert_eq!(config.page_size, 5);

        let engine = config.engine_config();
        assert_eq!(
            engine.reconnect,
            ReconnectPolicy::Exponential {
                initial: Duration::from_secs(2),
                max: Duration::from_secs(60),
            }
        );
        assert_eq!(engine.batch.max_in_flight, 1);

        let logs = config.log_settings();
        assert_eq!(logs.level, LevelFilter::Debug);
        assert_eq!(logs.destination, LogDestination::Both);
    }

    #[test]
    fn default_reconnect_is_five_seconds() {
        assert_eq!(
            AppConfig::default().engine_config().reconnect,
            ReconnectPolicy::Fixed(Duration::from_secs(5))
        );
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crawlwatch.ron");
        fs::write(&path, "(page_size: \"many\")").unwrap();

        let err = AppConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("crawlwatch.ron"));
    }
}
