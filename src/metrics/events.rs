//! Internal events for metrics emission.
//!
//! Each event struct represents a measurable occurrence in the
//! pipeline. Events implement the `InternalEvent` trait which emits
//! the corresponding Prometheus metric.
//!
//! All metrics carry a `source` label so multi-source deployments can
//! be observed per source.

use metrics::{counter, histogram};
use std::time::Duration;
use tracing::trace;

use crate::record::ValidationStatus;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Event emitted when records are pulled from a source page.
pub struct RecordsExtracted {
    pub count: u64,
    pub source: String,
}

impl InternalEvent for RecordsExtracted {
    fn emit(self) {
        trace!(count = self.count, source = %self.source, "Records extracted");
        counter!("smelter_records_extracted_total", "source" => self.source).increment(self.count);
    }
}

/// Event emitted when a page fetch completes successfully.
pub struct PageFetchCompleted {
    pub duration: Duration,
    pub source: String,
}

impl InternalEvent for PageFetchCompleted {
    fn emit(self) {
        trace!(
            duration_ms = self.duration.as_millis(),
            source = %self.source,
            "Page fetch completed"
        );
        histogram!("smelter_page_fetch_duration_seconds", "source" => self.source)
            .record(self.duration.as_secs_f64());
    }
}

/// Event emitted when a page fetch is retried after a transient failure.
pub struct PageRetried {
    pub source: String,
}

impl InternalEvent for PageRetried {
    fn emit(self) {
        trace!(source = %self.source, "Page retried");
        counter!("smelter_page_retries_total", "source" => self.source).increment(1);
    }
}

/// Event emitted when records finish validation.
pub struct RecordsValidated {
    pub count: u64,
    pub status: ValidationStatus,
    pub source: String,
}

impl InternalEvent for RecordsValidated {
    fn emit(self) {
        trace!(
            count = self.count,
            status = self.status.as_str(),
            source = %self.source,
            "Records validated"
        );
        counter!(
            "smelter_records_validated_total",
            "status" => self.status.as_str(),
            "source" => self.source
        )
        .increment(self.count);
    }
}

/// Event emitted when records are written to the bronze destination.
pub struct RecordsLoaded {
    pub count: u64,
    pub source: String,
}

impl InternalEvent for RecordsLoaded {
    fn emit(self) {
        trace!(count = self.count, source = %self.source, "Records loaded");
        counter!("smelter_records_loaded_total", "source" => self.source).increment(self.count);
    }
}

/// Event emitted when a single record fails to load.
pub struct RecordLoadFailed {
    pub source: String,
}

impl InternalEvent for RecordLoadFailed {
    fn emit(self) {
        trace!(source = %self.source, "Record load failed");
        counter!("smelter_record_load_failures_total", "source" => self.source).increment(1);
    }
}

/// Event emitted when a load batch completes.
pub struct BatchLoadCompleted {
    pub duration: Duration,
    pub source: String,
}

impl InternalEvent for BatchLoadCompleted {
    fn emit(self) {
        trace!(
            duration_ms = self.duration.as_millis(),
            source = %self.source,
            "Batch load completed"
        );
        histogram!("smelter_batch_load_duration_seconds", "source" => self.source)
            .record(self.duration.as_secs_f64());
    }
}

/// Event emitted when an alert fires.
pub struct AlertRaised {
    pub level: &'static str,
    pub source: String,
}

impl InternalEvent for AlertRaised {
    fn emit(self) {
        trace!(level = self.level, source = %self.source, "Alert raised");
        counter!(
            "smelter_alerts_raised_total",
            "level" => self.level,
            "source" => self.source
        )
        .increment(1);
    }
}

/// Event emitted when a pipeline run completes.
pub struct RunCompleted {
    pub status: &'static str,
    pub duration: Duration,
    pub source: String,
}

impl InternalEvent for RunCompleted {
    fn emit(self) {
        trace!(
            status = self.status,
            duration_ms = self.duration.as_millis(),
            source = %self.source,
            "Run completed"
        );
        counter!(
            "smelter_runs_total",
            "status" => self.status,
            "source" => self.source.clone()
        )
        .increment(1);
        histogram!("smelter_run_duration_seconds", "source" => self.source)
            .record(self.duration.as_secs_f64());
    }
}
