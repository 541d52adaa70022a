//! Smelter: bronze-layer ingestion for paginated raw sources.
//!
//! This crate handles:
//! - Rate-limited, retrying extraction of paginated records per day
//! - Schema and quality validation with per-record scoring
//! - Batched loading into date-partitioned bronze storage
//! - Windowed run metrics with threshold alerting

pub mod config;
pub mod error;
pub mod metrics;
pub mod monitor;
pub mod pipeline;
pub mod record;
pub mod schema;
pub mod signal;
pub mod sink;
pub mod source;
pub mod tracing;
pub mod validate;

// Re-export commonly used items
pub use config::{Config, SourceConfig};
pub use error::PipelineError;
pub use monitor::{AlertManager, MetricsCollector};
pub use pipeline::{IngestionPipeline, RunState, RunSummary};
pub use record::{DateRange, LoadResult, RawRecord, ValidatedRecord};
pub use schema::Schema;
pub use signal::shutdown_signal;
pub use sink::{BronzeDestination, LocalDestination, PartitionedLoader};
pub use source::{DataSource, NdjsonSource, RateLimitedExtractor, SourceRegistry};
pub use tracing::init_tracing;
pub use validate::Validator;
