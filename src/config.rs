//! Host-supplied configuration, loaded from TOML.

use std::path::Path;

use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{ConfigError, Result};

/// Top-level configuration for the orchestration core.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub preload: PreloadConfig,
    pub network: NetworkConfig,
    pub behavior: BehaviorConfig,
    pub logging: LoggingConfig,
}

/// Preload strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PreloadStrategy {
    /// Predictive preloading driven by behavior analysis and network signals.
    #[default]
    Smart,
    /// Preloading disabled entirely.
    Off,
}

/// Network-quality requirement for admitting preload work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NetworkThreshold {
    /// Admit regardless of the monitor's classification.
    #[default]
    Auto,
    /// Admit only while the monitor reports a fast connection.
    Fast,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PreloadConfig {
    pub strategy: PreloadStrategy,
    /// Ceiling on tasks in the loading state at any instant.
    pub max_concurrent: usize,
    pub network_threshold: NetworkThreshold,
    /// Cap on the preloaded-application set (FIFO eviction beyond it).
    pub cache_size: usize,
    pub enable_behavior_prediction: bool,
    /// Delay between a route change and predictive enqueueing.
    pub prefetch_delay_ms: u64,
    /// Interval of the admission tick promoting pending tasks.
    pub tick_interval_ms: u64,
    /// Per-resource prefetch timeout.
    pub resource_timeout_ms: u64,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            strategy: PreloadStrategy::Smart,
            max_concurrent: 2,
            network_threshold: NetworkThreshold::Auto,
            cache_size: 5,
            enable_behavior_prediction: true,
            prefetch_delay_ms: 1_000,
            tick_interval_ms: 5_000,
            resource_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Target for lightweight HEAD probes. Required unless the host installs
    /// its own [`LatencyProbe`](crate::port::probe::LatencyProbe).
    pub probe_url: String,
    pub probe_interval_ms: u64,
    /// Rolling window of round-trip samples used by the fallback classifier.
    pub probe_window: usize,
    /// Rolling average above which the fallback classifier reports slow.
    pub slow_rtt_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            probe_url: String::new(),
            probe_interval_ms: 30_000,
            probe_window: 10,
            slow_rtt_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Most recent records retained in the behavior log.
    pub max_records: usize,
    pub retention_days: i64,
    /// Dwell below this is treated as an accidental navigation and dropped.
    pub min_dwell_ms: u64,
    /// Idle gap beyond which navigations stop counting as one session.
    pub session_timeout_ms: u64,
    /// Key under which history is persisted in the host's key-value store.
    pub storage_key: String,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            max_records: 100,
            retention_days: 30,
            min_dwell_ms: 1_000,
            session_timeout_ms: 30 * 60 * 1_000,
            storage_key: "microweave.behavior".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl LoggingConfig {
    /// Initialize the tracing subscriber with this logging configuration.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.format.as_str() {
            "json" => {
                fmt().json().with_env_filter(filter).init();
            }
            _ => {
                fmt().with_env_filter(filter).init();
            }
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.preload.max_concurrent == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_concurrent",
                reason: "must be at least 1".into(),
            }
            .into());
        }
        if self.preload.cache_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache_size",
                reason: "must be at least 1".into(),
            }
            .into());
        }
        if self.network.probe_window == 0 {
            return Err(ConfigError::InvalidValue {
                field: "probe_window",
                reason: "must be at least 1".into(),
            }
            .into());
        }
        if !self.network.probe_url.is_empty() && url::Url::parse(&self.network.probe_url).is_err()
        {
            return Err(ConfigError::InvalidValue {
                field: "probe_url",
                reason: format!("not an absolute URL: {}", self.network.probe_url),
            }
            .into());
        }
        if self.behavior.max_records == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_records",
                reason: "must be at least 1".into(),
            }
            .into());
        }
        if self.behavior.retention_days <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "retention_days",
                reason: "must be positive".into(),
            }
            .into());
        }
        Ok(())
    }

    pub fn init_logging(&self) {
        self.logging.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.preload.max_concurrent, 2);
        assert_eq!(config.preload.cache_size, 5);
        assert_eq!(config.preload.prefetch_delay_ms, 1_000);
        assert_eq!(config.preload.tick_interval_ms, 5_000);
        assert_eq!(config.network.probe_interval_ms, 30_000);
        assert_eq!(config.network.probe_window, 10);
        assert_eq!(config.network.slow_rtt_ms, 500);
        assert_eq!(config.behavior.max_records, 100);
        assert_eq!(config.behavior.retention_days, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_concurrency() {
        let mut config = Config::default();
        config.preload.max_concurrent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_strategy_and_threshold_from_toml() {
        let config: Config = toml::from_str(
            r#"
            [preload]
            strategy = "off"
            network_threshold = "fast"
            max_concurrent = 4
            "#,
        )
        .expect("parse config");
        assert_eq!(config.preload.strategy, PreloadStrategy::Off);
        assert_eq!(config.preload.network_threshold, NetworkThreshold::Fast);
        assert_eq!(config.preload.max_concurrent, 4);
        // Untouched sections fall back to defaults.
        assert_eq!(config.preload.cache_size, 5);
    }

    #[test]
    fn rejects_relative_probe_url() {
        let mut config = Config::default();
        config.network.probe_url = "/favicon.ico".into();
        assert!(config.validate().is_err());
        config.network.probe_url = "https://example.com/favicon.ico".into();
        assert!(config.validate().is_ok());
    }
}
