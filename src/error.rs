//! Error types for the smelter ingestion pipeline.
//!
//! The taxonomy matches the propagation policy: per-record conditions
//! (`SinkError::Record`, schema violations) are collected into result
//! structures and never cross a batch boundary; transport and
//! configuration errors propagate and terminate the run.

use snafu::prelude::*;

/// Errors that can occur while fetching pages from a source.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ExtractError {
    /// Transient transport failure; subject to the retry policy.
    #[snafu(display("Transport failure fetching page {page} for {date}: {message}"))]
    Transport {
        date: chrono::NaiveDate,
        page: u32,
        message: String,
    },

    /// Page fetch exceeded its timeout; treated as transient.
    #[snafu(display("Page fetch timed out after {seconds}s"))]
    Timeout { seconds: u64 },

    /// Malformed response; never retried.
    #[snafu(display("Malformed response from source: {message}"))]
    Malformed { message: String },

    /// Retries exhausted for a page; aborts the whole extraction.
    #[snafu(display("Giving up on page {page} for {date} after {attempts} attempts: {message}"))]
    RetriesExhausted {
        date: chrono::NaiveDate,
        page: u32,
        attempts: u32,
        message: String,
    },
}

impl ExtractError {
    /// Whether the retry policy applies to this failure.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ExtractError::Transport { .. } | ExtractError::Timeout { .. }
        )
    }
}

/// Errors raised by a bronze destination.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SinkError {
    /// A single insert failed. Isolated per record; the batch continues.
    #[snafu(display("Record insert failed: {message}"))]
    Record { message: String },

    /// The transaction scope failed. Aborts the remainder of the batch.
    #[snafu(display("Transaction failure: {message}"))]
    Transaction { message: String },
}

/// Errors that can occur during configuration parsing and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[snafu(display("Failed to read configuration file"))]
    ReadFile { source: std::io::Error },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML configuration"))]
    YamlParse { source: serde_yaml::Error },

    /// Environment variable interpolation failed.
    #[snafu(display("Environment variable interpolation failed:\n{message}"))]
    EnvInterpolation { message: String },

    /// No sources configured.
    #[snafu(display("At least one source must be configured"))]
    NoSources,

    /// Requested source is not configured.
    #[snafu(display("Unknown source '{name}'"))]
    UnknownSource { name: String },

    /// Unknown source kind in configuration.
    #[snafu(display("Unknown source kind '{kind}' for source '{name}'"))]
    UnknownSourceKind { name: String, kind: String },

    /// A tunable that must be positive was zero.
    #[snafu(display("'{name}' must be greater than zero for source '{source_name}'"))]
    ZeroTunable {
        name: &'static str,
        source_name: String,
    },

    /// An alert threshold outside its valid range.
    #[snafu(display("Alert threshold '{name}' must be within [0, 1], got {value}"))]
    ThresholdOutOfRange { name: &'static str, value: f64 },

    /// Destination path is empty.
    #[snafu(display("Destination path cannot be empty"))]
    EmptyDestinationPath,

    /// Failed to parse metrics address.
    #[snafu(display("Failed to parse metrics address"))]
    AddressParse { source: std::net::AddrParseError },
}

/// Errors that can occur during metrics initialization.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MetricsError {
    /// Failed to initialize Prometheus recorder.
    #[snafu(display("Failed to initialize Prometheus recorder"))]
    PrometheusInit {
        source: metrics_exporter_prometheus::BuildError,
    },

    /// Metrics already initialized.
    #[snafu(display("Metrics subsystem already initialized"))]
    AlreadyInitialized,

    /// Metrics not initialized.
    #[snafu(display("Metrics subsystem not initialized"))]
    NotInitialized,
}

/// Errors raised by a notification sink. Always swallowed by the
/// alert manager after logging.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum NotifyError {
    /// Dispatch to the sink failed.
    #[snafu(display("Failed to send notification: {message}"))]
    Send { message: String },
}

/// Top-level pipeline errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    /// Configuration error; fatal before extraction starts.
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },

    /// Extraction failed after exhausting its own retries.
    #[snafu(display("Extraction failed: {source}"))]
    Extract { source: ExtractError },

    /// Metrics error.
    #[snafu(display("Metrics error: {source}"))]
    Metrics { source: MetricsError },

    /// Task join error.
    #[snafu(display("Task join error: {source}"))]
    TaskJoin { source: tokio::task::JoinError },
}

impl From<ConfigError> for PipelineError {
    fn from(source: ConfigError) -> Self {
        PipelineError::Config { source }
    }
}

impl From<ExtractError> for PipelineError {
    fn from(source: ExtractError) -> Self {
        PipelineError::Extract { source }
    }
}

impl From<MetricsError> for PipelineError {
    fn from(source: MetricsError) -> Self {
        PipelineError::Metrics { source }
    }
}
