//! Configuration for latency runs and throughput tests.
//!
//! Configs are serde structs with humantime durations so they can come from
//! a YAML file, CLI flags, or be built in code via the `with_*` methods.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Default probe target when none is given.
pub const DEFAULT_TARGET: &str = "8.8.8.8";

/// Default inter-probe cadence (500 milliseconds).
pub const DEFAULT_CADENCE: Duration = Duration::from_millis(500);

/// Default per-probe timeout (1 second).
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Minimum allowed cadence (50 milliseconds). Lower values are clamped.
pub const MIN_CADENCE: Duration = Duration::from_millis(50);

/// Default throughput download endpoint.
pub const DEFAULT_DOWNLOAD_URL: &str = "https://speed.cloudflare.com/__down?bytes=10000000";

/// Default throughput upload endpoint.
pub const DEFAULT_UPLOAD_URL: &str = "https://speed.cloudflare.com/__up";

/// Default upload payload size (2 MB).
pub const DEFAULT_UPLOAD_BYTES: usize = 2_000_000;

/// Default overall throughput test timeout (60 seconds).
pub const DEFAULT_THROUGHPUT_TIMEOUT: Duration = Duration::from_secs(60);

fn default_cadence() -> Duration {
    DEFAULT_CADENCE
}

fn default_probe_timeout() -> Duration {
    DEFAULT_PROBE_TIMEOUT
}

fn default_download_url() -> String {
    DEFAULT_DOWNLOAD_URL.to_string()
}

fn default_upload_url() -> String {
    DEFAULT_UPLOAD_URL.to_string()
}

fn default_upload_bytes() -> usize {
    DEFAULT_UPLOAD_BYTES
}

fn default_throughput_timeout() -> Duration {
    DEFAULT_THROUGHPUT_TIMEOUT
}

// =============================================================================
// Errors
// =============================================================================

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse YAML configuration.
    #[error("failed to parse YAML config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Configuration validation failed.
    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Parse duration string using humantime.
///
/// Supports formats like `500ms`, `30s`, `1m`, `1h30m`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("duration string is empty".to_string());
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

// =============================================================================
// Latency Run Configuration
// =============================================================================

/// Configuration for one latency run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyConfig {
    /// Target host (hostname or IP address). Blank falls back to
    /// [`DEFAULT_TARGET`].
    #[serde(default)]
    pub target: String,
    /// Delay between probe cycles (default: 500ms).
    #[serde(default = "default_cadence", with = "humantime_serde")]
    pub cadence: Duration,
    /// Maximum wait per probe (default: 1s).
    #[serde(default = "default_probe_timeout", with = "humantime_serde")]
    pub probe_timeout: Duration,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET)
    }
}

impl LatencyConfig {
    /// Create a configuration for the given target with default timings.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            cadence: DEFAULT_CADENCE,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Set the inter-probe cadence.
    pub fn with_cadence(mut self, cadence: Duration) -> Self {
        self.cadence = cadence;
        self
    }

    /// Set the per-probe timeout.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Normalize the target: trimmed, with blank input replaced by
    /// [`DEFAULT_TARGET`].
    pub fn resolved_target(&self) -> String {
        let trimmed = self.target.trim();
        if trimmed.is_empty() {
            DEFAULT_TARGET.to_string()
        } else {
            trimmed.to_string()
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.probe_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "probe_timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Throughput Test Configuration
// =============================================================================

/// Configuration for the one-shot throughput test.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThroughputConfig {
    /// URL to download from when measuring download speed.
    pub download_url: String,
    /// URL to POST to when measuring upload speed.
    pub upload_url: String,
    /// Upload payload size in bytes.
    pub upload_bytes: usize,
    /// Overall timeout for each measurement phase.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ThroughputConfig {
    fn default() -> Self {
        Self {
            download_url: default_download_url(),
            upload_url: default_upload_url(),
            upload_bytes: default_upload_bytes(),
            timeout: default_throughput_timeout(),
        }
    }
}

impl ThroughputConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.download_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "download_url must not be empty".to_string(),
            ));
        }
        if self.upload_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "upload_url must not be empty".to_string(),
            ));
        }
        if self.upload_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "upload_bytes must be positive".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Latency run settings.
    pub latency: LatencyConfig,
    /// Throughput test settings.
    pub throughput: ThroughputConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.latency.validate()?;
        self.throughput.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_config_defaults() {
        let config = LatencyConfig::default();
        assert_eq!(config.target, DEFAULT_TARGET);
        assert_eq!(config.cadence, DEFAULT_CADENCE);
        assert_eq!(config.probe_timeout, DEFAULT_PROBE_TIMEOUT);
    }

    #[test]
    fn test_latency_config_builder() {
        let config = LatencyConfig::new("1.1.1.1")
            .with_cadence(Duration::from_secs(1))
            .with_probe_timeout(Duration::from_secs(2));

        assert_eq!(config.target, "1.1.1.1");
        assert_eq!(config.cadence, Duration::from_secs(1));
        assert_eq!(config.probe_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_resolved_target_blank_defaults() {
        assert_eq!(LatencyConfig::new("").resolved_target(), DEFAULT_TARGET);
        assert_eq!(LatencyConfig::new("   ").resolved_target(), DEFAULT_TARGET);
        assert_eq!(
            LatencyConfig::new(" example.com ").resolved_target(),
            "example.com"
        );
    }

    #[test]
    fn test_latency_config_rejects_zero_timeout() {
        let config = LatencyConfig::default().with_probe_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_latency_config_yaml_defaults() {
        let config: LatencyConfig = serde_yaml::from_str("target: 1.1.1.1").unwrap();
        assert_eq!(config.target, "1.1.1.1");
        assert_eq!(config.cadence, DEFAULT_CADENCE);
        assert_eq!(config.probe_timeout, DEFAULT_PROBE_TIMEOUT);
    }

    #[test]
    fn test_latency_config_yaml_humantime() {
        let yaml = "target: example.com\ncadence: 250ms\nprobe_timeout: 2s\n";
        let config: LatencyConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.cadence, Duration::from_millis(250));
        assert_eq!(config.probe_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_throughput_config_validation() {
        assert!(ThroughputConfig::default().validate().is_ok());

        let config = ThroughputConfig {
            upload_bytes: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_app_config_yaml() {
        let yaml = "latency:\n  target: 9.9.9.9\n";
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.latency.target, "9.9.9.9");
        assert_eq!(config.throughput.upload_bytes, DEFAULT_UPLOAD_BYTES);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
    }
}
