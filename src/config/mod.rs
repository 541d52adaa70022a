//! YAML configuration with environment variable interpolation.

mod vars;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use tracing::debug;

use crate::error::{
    AddressParseSnafu, ConfigError, ReadFileSnafu, YamlParseSnafu,
};
use crate::schema::Schema;

pub use vars::{InterpolationResult, interpolate};

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Configured sources, keyed by source name.
    pub sources: IndexMap<String, SourceConfig>,

    /// Bronze destination settings.
    pub destination: DestinationConfig,

    /// Alerting thresholds.
    #[serde(default)]
    pub alerts: AlertConfig,

    /// Metrics exporter settings.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Per-source extraction settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Source kind, e.g. `ndjson`.
    pub kind: String,

    /// Source-specific location (directory for `ndjson`).
    pub path: PathBuf,

    /// Requests per minute budget.
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,

    /// Retry attempts per page for transient failures.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Base retry delay in seconds; scaled linearly by attempt number.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Records requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Records per load batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Timeout for a single page fetch, in seconds.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// API version stamped onto extraction metadata.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Validation schema for records from this source.
    pub schema: Schema,
}

fn default_rate_limit() -> u32 {
    100
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    5
}

fn default_page_size() -> usize {
    100
}

fn default_batch_size() -> usize {
    100
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_api_version() -> String {
    "1.0".to_string()
}

/// Bronze destination settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DestinationConfig {
    /// Root directory for partitioned bronze output.
    pub path: PathBuf,
}

/// Alerting thresholds and dispatch settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlertConfig {
    /// Windowed error rate above which an error alert fires.
    #[serde(default = "default_error_rate_threshold")]
    pub error_rate_threshold: f64,

    /// Average batch latency in seconds above which a warning fires.
    #[serde(default = "default_latency_threshold_secs")]
    pub latency_threshold_secs: f64,

    /// Average quality score below which a warning fires.
    #[serde(default = "default_quality_score_threshold")]
    pub quality_score_threshold: f64,

    /// CPU usage fraction above which a warning fires.
    #[serde(default = "default_cpu_threshold")]
    pub cpu_threshold: f64,

    /// Memory usage fraction above which a warning fires.
    #[serde(default = "default_memory_threshold")]
    pub memory_threshold: f64,

    /// Disk usage fraction above which a warning fires.
    #[serde(default = "default_disk_threshold")]
    pub disk_threshold: f64,

    /// Whether alerts are dispatched to notification sinks.
    #[serde(default)]
    pub enable_notifications: bool,

    /// Minimum seconds between repeat alerts for the same source and
    /// metric.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            error_rate_threshold: default_error_rate_threshold(),
            latency_threshold_secs: default_latency_threshold_secs(),
            quality_score_threshold: default_quality_score_threshold(),
            cpu_threshold: default_cpu_threshold(),
            memory_threshold: default_memory_threshold(),
            disk_threshold: default_disk_threshold(),
            enable_notifications: false,
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

fn default_error_rate_threshold() -> f64 {
    0.05
}

fn default_latency_threshold_secs() -> f64 {
    2.0
}

fn default_quality_score_threshold() -> f64 {
    0.8
}

fn default_cpu_threshold() -> f64 {
    0.8
}

fn default_memory_threshold() -> f64 {
    0.85
}

fn default_disk_threshold() -> f64 {
    0.85
}

fn default_cooldown_secs() -> u64 {
    300
}

/// Metrics exporter settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    /// Address the Prometheus exporter binds to.
    #[serde(default = "default_metrics_address")]
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            address: default_metrics_address(),
        }
    }
}

fn default_metrics_address() -> String {
    "0.0.0.0:9090".to_string()
}

impl MetricsConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.address.parse().context(AddressParseSnafu)
    }
}

impl Config {
    /// Load configuration from a YAML file, interpolating environment
    /// variables before parsing.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = tokio::fs::read_to_string(path.as_ref())
            .await
            .context(ReadFileSnafu)?;
        let config = Self::parse(&raw)?;
        debug!(
            path = %path.as_ref().display(),
            sources = config.sources.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse configuration from YAML text.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let interpolated = vars::interpolate(raw);
        if !interpolated.is_ok() {
            return Err(ConfigError::EnvInterpolation {
                message: interpolated.errors.join("\n"),
            });
        }

        let config: Config =
            serde_yaml::from_str(&interpolated.text).context(YamlParseSnafu)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::NoSources);
        }

        for (name, source) in &self.sources {
            for (field, value) in [
                ("rate_limit", source.rate_limit as u64),
                ("retry_attempts", source.retry_attempts as u64),
                ("page_size", source.page_size as u64),
                ("batch_size", source.batch_size as u64),
                ("fetch_timeout_secs", source.fetch_timeout_secs),
            ] {
                if value == 0 {
                    return Err(ConfigError::ZeroTunable {
                        name: field,
                        source_name: name.clone(),
                    });
                }
            }
        }

        for (name, value) in [
            ("error_rate_threshold", self.alerts.error_rate_threshold),
            (
                "quality_score_threshold",
                self.alerts.quality_score_threshold,
            ),
            ("cpu_threshold", self.alerts.cpu_threshold),
            ("memory_threshold", self.alerts.memory_threshold),
            ("disk_threshold", self.alerts.disk_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ThresholdOutOfRange { name, value });
            }
        }

        if self.destination.path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDestinationPath);
        }

        Ok(())
    }

    /// Look up a configured source by name.
    pub fn source(&self, name: &str) -> Result<&SourceConfig, ConfigError> {
        self.sources
            .get(name)
            .ok_or_else(|| ConfigError::UnknownSource {
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
impl SourceConfig {
    pub(crate) fn for_tests() -> Self {
        Self {
            kind: "ndjson".to_string(),
            path: PathBuf::from("/tmp/smelter-test"),
            rate_limit: default_rate_limit(),
            retry_attempts: default_retry_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
            page_size: default_page_size(),
            batch_size: default_batch_size(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            api_version: default_api_version(),
            schema: Schema::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_YAML: &str = r#"
sources:
  events:
    kind: ndjson
    path: /data/raw/events
    rate_limit: 120
    schema:
      required: [id, timestamp]
      properties:
        id:
          type: string
        value:
          type: number
          minimum: 0
destination:
  path: /data/bronze
alerts:
  error_rate_threshold: 0.1
"#;

    #[test]
    fn test_parse_valid_config() {
        let config = Config::parse(VALID_YAML).unwrap();

        let source = config.source("events").unwrap();
        assert_eq!(source.kind, "ndjson");
        assert_eq!(source.rate_limit, 120);
        // Unspecified tunables take their defaults.
        assert_eq!(source.retry_attempts, 3);
        assert_eq!(source.page_size, 100);
        assert_eq!(source.batch_size, 100);
        assert_eq!(source.schema.required, vec!["id", "timestamp"]);
        assert!((config.alerts.error_rate_threshold - 0.1).abs() < f64::EPSILON);
        assert!((config.alerts.quality_score_threshold - 0.8).abs() < f64::EPSILON);
        assert_eq!(config.metrics.address, "0.0.0.0:9090");
    }

    #[test]
    fn test_no_sources_rejected() {
        let yaml = r#"
sources: {}
destination:
  path: /data/bronze
"#;
        let error = Config::parse(yaml).unwrap_err();
        assert!(matches!(error, ConfigError::NoSources));
    }

    #[test]
    fn test_zero_tunable_rejected() {
        let yaml = r#"
sources:
  events:
    kind: ndjson
    path: /data/raw/events
    rate_limit: 0
    schema:
      required: []
destination:
  path: /data/bronze
"#;
        let error = Config::parse(yaml).unwrap_err();
        assert!(matches!(
            error,
            ConfigError::ZeroTunable {
                name: "rate_limit",
                ..
            }
        ));
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let yaml = r#"
sources:
  events:
    kind: ndjson
    path: /data/raw/events
    schema:
      required: []
destination:
  path: /data/bronze
alerts:
  error_rate_threshold: 1.5
"#;
        let error = Config::parse(yaml).unwrap_err();
        assert!(matches!(
            error,
            ConfigError::ThresholdOutOfRange {
                name: "error_rate_threshold",
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_source_lookup() {
        let config = Config::parse(VALID_YAML).unwrap();
        let error = config.source("nope").unwrap_err();
        assert!(matches!(error, ConfigError::UnknownSource { .. }));
    }
}
