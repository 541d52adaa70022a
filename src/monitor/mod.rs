//! Run-level metrics aggregation and threshold alerting.
//!
//! The collector keeps per-source counters plus a sliding window of
//! recent batch samples. Error rate and latency are computed over the
//! window rather than cumulatively, so a long-running deployment
//! recovers its health signal once a bad patch has aged out.

pub mod alerts;

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

pub use alerts::{Alert, AlertLevel, AlertManager, NotificationSink, ResourceUsage};

/// Number of recent batch samples kept per source.
const SAMPLE_WINDOW: usize = 100;

/// One batch's worth of ingestion outcomes.
#[derive(Debug, Clone, Copy)]
pub struct IngestionSample {
    pub records: usize,
    pub errors: usize,
    pub latency_secs: f64,
    /// Average validation quality score for the batch, when known.
    pub avg_quality_score: Option<f64>,
}

#[derive(Default)]
struct SourceMetrics {
    total_records: usize,
    error_count: usize,
    last_updated: Option<DateTime<Utc>>,
    samples: VecDeque<(usize, usize)>,
    latencies: VecDeque<f64>,
}

impl SourceMetrics {
    fn push(&mut self, sample: &IngestionSample) {
        self.total_records += sample.records;
        self.error_count += sample.errors;
        self.last_updated = Some(Utc::now());

        if self.samples.len() == SAMPLE_WINDOW {
            self.samples.pop_front();
        }
        self.samples.push_back((sample.records, sample.errors));

        if self.latencies.len() == SAMPLE_WINDOW {
            self.latencies.pop_front();
        }
        self.latencies.push_back(sample.latency_secs);
    }

    /// Error rate over the sample window, 0.0 when no records seen.
    fn error_rate(&self) -> f64 {
        let (records, errors) = self
            .samples
            .iter()
            .fold((0usize, 0usize), |(r, e), (sr, se)| (r + sr, e + se));
        if records == 0 {
            0.0
        } else {
            errors as f64 / records as f64
        }
    }

    fn avg_latency(&self) -> f64 {
        if self.latencies.is_empty() {
            0.0
        } else {
            self.latencies.iter().sum::<f64>() / self.latencies.len() as f64
        }
    }
}

/// Point-in-time view of one source's metrics.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total_records: usize,
    pub error_count: usize,
    pub error_rate: f64,
    pub avg_latency_secs: f64,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Aggregates ingestion metrics per source and feeds the alert manager.
pub struct MetricsCollector {
    metrics: Mutex<HashMap<String, SourceMetrics>>,
    alerts: AlertManager,
}

impl MetricsCollector {
    pub fn new(alerts: AlertManager) -> Self {
        Self {
            metrics: Mutex::new(HashMap::new()),
            alerts,
        }
    }

    pub fn alerts(&self) -> &AlertManager {
        &self.alerts
    }

    /// Record one batch outcome and run threshold checks against the
    /// windowed view.
    pub async fn record_ingestion(&self, source: &str, sample: IngestionSample) {
        let (error_rate, avg_latency) = {
            let mut metrics = self.metrics.lock().unwrap();
            let entry = metrics.entry(source.to_string()).or_default();
            entry.push(&sample);
            (entry.error_rate(), entry.avg_latency())
        };

        debug!(
            source,
            records = sample.records,
            errors = sample.errors,
            error_rate,
            "Ingestion sample recorded"
        );

        self.alerts
            .check_ingestion(source, error_rate, avg_latency, sample.avg_quality_score)
            .await;
    }

    /// Snapshot of a source's metrics, if any have been recorded.
    pub fn get_metrics(&self, source: &str) -> Option<MetricsSnapshot> {
        let metrics = self.metrics.lock().unwrap();
        metrics.get(source).map(|m| MetricsSnapshot {
            total_records: m.total_records,
            error_count: m.error_count,
            error_rate: m.error_rate(),
            avg_latency_secs: m.avg_latency(),
            last_updated: m.last_updated,
        })
    }

    /// Discard all recorded metrics for a source.
    pub fn reset_metrics(&self, source: &str) {
        self.metrics.lock().unwrap().remove(source);
    }
}
