//! End-to-end ingestion run: extract, validate, load, report.
//!
//! A run is a one-shot state machine per source. Failures after
//! extraction starts never abort the process; they land in the run
//! summary so partial progress is preserved and observable.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::emit;
use crate::metrics::events::{RecordsValidated, RunCompleted};
use crate::monitor::{Alert, IngestionSample, MetricsCollector};
use crate::record::{DateRange, LoadResult, ValidationStatus};
use crate::sink::PartitionedLoader;
use crate::source::RateLimitedExtractor;
use crate::validate::Validator;

/// Phase of an ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Extracting,
    Validating,
    Loading,
    Reporting,
    Done,
    Failed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Extracting => "extracting",
            RunState::Validating => "validating",
            RunState::Loading => "loading",
            RunState::Reporting => "reporting",
            RunState::Done => "done",
            RunState::Failed => "failed",
        }
    }
}

/// Outcome of one ingestion run.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub source: String,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub records_extracted: usize,
    pub records_valid: usize,
    pub records_invalid: usize,
    pub load: LoadResult,
    /// Alerts raised during this run.
    pub alerts: Vec<Alert>,
    /// Set when the run ended in [`RunState::Failed`].
    pub error: Option<String>,
}

/// Drives one source through extraction, validation, loading, and
/// reporting.
pub struct IngestionPipeline {
    source_name: String,
    extractor: RateLimitedExtractor,
    validator: Validator,
    loader: PartitionedLoader,
    collector: Arc<MetricsCollector>,
}

impl IngestionPipeline {
    pub fn new(
        source_name: &str,
        extractor: RateLimitedExtractor,
        validator: Validator,
        loader: PartitionedLoader,
        collector: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            source_name: source_name.to_string(),
            extractor,
            validator,
            loader,
            collector,
        }
    }

    /// Run the pipeline over the given date range, defaulting to
    /// yesterday. Cancellation yields a summary over the partial
    /// progress, not an error.
    pub async fn run(&self, range: Option<DateRange>, shutdown: &CancellationToken) -> RunSummary {
        let range = range.unwrap_or_else(|| DateRange::last_days(1));
        let started_at = Utc::now();
        let run_timer = tokio::time::Instant::now();

        info!(
            source = %self.source_name,
            start = %range.start,
            end = %range.end,
            state = RunState::Extracting.as_str(),
            "Run started"
        );

        let records = match self.extractor.fetch_range(range, shutdown).await {
            Ok(records) => records,
            Err(e) => {
                error!(source = %self.source_name, error = %e, "Extraction failed");
                return self.finish(
                    started_at,
                    run_timer,
                    RunState::Failed,
                    0,
                    0,
                    0,
                    LoadResult::default(),
                    Some(e.to_string()),
                );
            }
        };
        let records_extracted = records.len();

        info!(
            source = %self.source_name,
            records = records_extracted,
            state = RunState::Validating.as_str(),
            "Validating extracted records"
        );
        let validated: Vec<_> = records
            .into_iter()
            .map(|record| self.validator.validate(record))
            .collect();
        let records_valid = validated.iter().filter(|v| v.is_valid).count();
        let records_invalid = validated.len() - records_valid;
        emit!(RecordsValidated {
            count: records_valid as u64,
            status: ValidationStatus::Valid,
            source: self.source_name.clone(),
        });
        emit!(RecordsValidated {
            count: records_invalid as u64,
            status: ValidationStatus::Invalid,
            source: self.source_name.clone(),
        });

        info!(
            source = %self.source_name,
            valid = records_valid,
            invalid = records_invalid,
            state = RunState::Loading.as_str(),
            "Loading records"
        );
        // Invalid records load too, flagged by their persisted status.
        let load_timer = tokio::time::Instant::now();
        let load = self.loader.load(&validated, shutdown).await;
        let load_secs = load_timer.elapsed().as_secs_f64();

        let avg_quality = if validated.is_empty() {
            None
        } else {
            Some(validated.iter().map(|v| v.quality_score).sum::<f64>() / validated.len() as f64)
        };
        info!(
            source = %self.source_name,
            state = RunState::Reporting.as_str(),
            "Reporting run metrics"
        );
        self.collector
            .record_ingestion(
                &self.source_name,
                IngestionSample {
                    records: load.total_records,
                    errors: load.failed_records,
                    latency_secs: load_secs,
                    avg_quality_score: avg_quality,
                },
            )
            .await;

        self.finish(
            started_at,
            run_timer,
            RunState::Done,
            records_extracted,
            records_valid,
            records_invalid,
            load,
            None,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        started_at: DateTime<Utc>,
        run_timer: tokio::time::Instant,
        state: RunState,
        records_extracted: usize,
        records_valid: usize,
        records_invalid: usize,
        load: LoadResult,
        error: Option<String>,
    ) -> RunSummary {
        let alerts = self
            .collector
            .alerts()
            .history(Some(started_at), None, None)
            .into_iter()
            .filter(|a| a.source == self.source_name)
            .collect();

        emit!(RunCompleted {
            status: state.as_str(),
            duration: run_timer.elapsed(),
            source: self.source_name.clone(),
        });
        info!(
            source = %self.source_name,
            state = state.as_str(),
            extracted = records_extracted,
            loaded = load.successful_records,
            failed = load.failed_records,
            "Run finished"
        );

        RunSummary {
            source: self.source_name.clone(),
            state,
            started_at,
            finished_at: Utc::now(),
            records_extracted,
            records_valid,
            records_invalid,
            load,
            alerts,
            error,
        }
    }
}
