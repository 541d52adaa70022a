//! Rate-limited, retrying page extraction over a date range.
//!
//! One extraction walks the days of a half-open range, pulling pages
//! sequentially until a page comes back empty. The inter-request delay
//! derived from the requests-per-minute budget applies before every
//! page fetch, success or failure. Transient failures retry the same
//! page with linear backoff; non-transient failures abort immediately.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::error::ExtractError;
use crate::metrics::events::{PageFetchCompleted, PageRetried, RecordsExtracted};
use crate::record::{DateRange, ExtractMetadata, RawRecord};
use crate::emit;
use crate::source::DataSource;

/// Pulls raw records from a [`DataSource`] with pagination, rate
/// limiting, and per-page retries.
///
/// Restartable from scratch on failure, not resumable mid-stream:
/// exhausting retries on any page aborts the whole extraction.
pub struct RateLimitedExtractor {
    source: Arc<dyn DataSource>,
    source_name: String,
    api_version: String,
    page_size: usize,
    retry_attempts: u32,
    retry_delay: Duration,
    request_interval: Duration,
    fetch_timeout: Duration,
}

impl RateLimitedExtractor {
    pub fn new(source: Arc<dyn DataSource>, source_name: &str, config: &SourceConfig) -> Self {
        // 60s / requests-per-minute = minimum inter-request interval.
        let request_interval = Duration::from_secs_f64(60.0 / config.rate_limit as f64);
        Self {
            source,
            source_name: source_name.to_string(),
            api_version: config.api_version.clone(),
            page_size: config.page_size,
            retry_attempts: config.retry_attempts,
            retry_delay: Duration::from_secs(config.retry_delay_secs),
            request_interval,
            fetch_timeout: Duration::from_secs(config.fetch_timeout_secs),
        }
    }

    /// Fetch all records for the range, stamping extraction metadata.
    ///
    /// Cancellation is honored between pages; the records accumulated
    /// up to that point are returned.
    pub async fn fetch_range(
        &self,
        range: DateRange,
        shutdown: &CancellationToken,
    ) -> Result<Vec<RawRecord>, ExtractError> {
        let mut all_records = Vec::new();

        'days: for date in range.days() {
            let mut page: u32 = 1;
            loop {
                // Unconditional rate-limit delay between page requests;
                // cancellation is only honored at this boundary.
                tokio::select! {
                    biased;

                    _ = shutdown.cancelled() => {
                        info!(
                            source = %self.source_name,
                            records = all_records.len(),
                            "Extraction cancelled between pages"
                        );
                        break 'days;
                    }

                    _ = tokio::time::sleep(self.request_interval) => {}
                }

                let mut records = self.fetch_page_with_retry(date, page).await?;
                if records.is_empty() {
                    debug!(source = %self.source_name, %date, page, "Empty page, date done");
                    break;
                }

                let fetched_at = Utc::now();
                for record in &mut records {
                    record.metadata = ExtractMetadata {
                        fetched_at,
                        source: self.source_name.clone(),
                        api_version: self.api_version.clone(),
                    };
                }

                emit!(RecordsExtracted {
                    count: records.len() as u64,
                    source: self.source_name.clone(),
                });
                all_records.extend(records);
                page += 1;
            }
        }

        info!(
            source = %self.source_name,
            records = all_records.len(),
            start = %range.start,
            end = %range.end,
            "Extraction complete"
        );
        Ok(all_records)
    }

    /// Fetch one page, retrying transient failures with linear backoff
    /// (`retry_delay * attempt`). Non-transient failures abort at once.
    async fn fetch_page_with_retry(
        &self,
        date: NaiveDate,
        page: u32,
    ) -> Result<Vec<RawRecord>, ExtractError> {
        let mut attempt: u32 = 1;
        loop {
            let started = tokio::time::Instant::now();
            let result = tokio::time::timeout(
                self.fetch_timeout,
                self.source.fetch_page(date, page, self.page_size),
            )
            .await
            .unwrap_or(Err(ExtractError::Timeout {
                seconds: self.fetch_timeout.as_secs(),
            }));

            match result {
                Ok(records) => {
                    emit!(PageFetchCompleted {
                        duration: started.elapsed(),
                        source: self.source_name.clone(),
                    });
                    return Ok(records);
                }
                Err(error) if error.is_transient() && attempt < self.retry_attempts => {
                    warn!(
                        source = %self.source_name,
                        %date,
                        page,
                        attempt,
                        %error,
                        "Transient fetch failure, retrying"
                    );
                    emit!(PageRetried {
                        source: self.source_name.clone(),
                    });
                    tokio::time::sleep(self.retry_delay * attempt).await;
                    attempt += 1;
                }
                Err(error) if error.is_transient() => {
                    return Err(ExtractError::RetriesExhausted {
                        date,
                        page,
                        attempts: self.retry_attempts,
                        message: error.to_string(),
                    });
                }
                Err(error) => return Err(error),
            }
        }
    }
}
