//! Batched, partition-aware loading of validated records.
//!
//! Failures accumulate as data, not control flow: a single record's
//! insert failure is recorded and the batch continues, while a
//! transaction-level failure aborts only the remainder of the current
//! batch. Previously completed batches stay committed either way.

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::SinkError;
use crate::metrics::events::{BatchLoadCompleted, RecordLoadFailed, RecordsLoaded};
use crate::record::{BronzeRow, LoadResult, RecordError, ValidatedRecord};
use crate::sink::BronzeDestination;
use crate::emit;

/// Loads validated records into a bronze destination in batches.
pub struct PartitionedLoader {
    destination: Arc<dyn BronzeDestination>,
    source_name: String,
    batch_size: usize,
}

impl PartitionedLoader {
    pub fn new(
        destination: Arc<dyn BronzeDestination>,
        source_name: &str,
        batch_size: usize,
    ) -> Self {
        Self {
            destination,
            source_name: source_name.to_string(),
            batch_size: batch_size.max(1),
        }
    }

    /// Load all records, batching internally, and return the run-level
    /// result. Cancellation is honored between batches; the result
    /// accumulated so far is returned, never discarded.
    pub async fn load(
        &self,
        records: &[ValidatedRecord],
        shutdown: &CancellationToken,
    ) -> LoadResult {
        let mut run_result = LoadResult::default();
        // Partitions ensured once per load, across batches.
        let mut ensured = HashSet::new();

        for batch in records.chunks(self.batch_size) {
            if shutdown.is_cancelled() {
                info!(
                    source = %self.source_name,
                    loaded = run_result.total_records,
                    remaining = records.len() - run_result.total_records,
                    "Load cancelled between batches"
                );
                break;
            }

            let batch_result = self.load_batch(batch, &mut ensured).await;
            run_result.merge(batch_result);
        }

        info!(
            source = %self.source_name,
            total = run_result.total_records,
            successful = run_result.successful_records,
            failed = run_result.failed_records,
            "Load complete"
        );
        run_result
    }

    /// Load one batch inside a single transaction scope.
    async fn load_batch(
        &self,
        batch: &[ValidatedRecord],
        ensured: &mut HashSet<chrono::NaiveDate>,
    ) -> LoadResult {
        let started = tokio::time::Instant::now();
        let mut result = LoadResult {
            total_records: batch.len(),
            ..Default::default()
        };

        if let Err(e) = self.destination.begin_batch().await {
            return self.fail_whole_batch(result, &e);
        }

        for (index, validated) in batch.iter().enumerate() {
            let row = BronzeRow::from_validated(&self.source_name, validated);

            if !ensured.contains(&row.partition_key) {
                match self.destination.ensure_partition(row.partition_key).await {
                    Ok(()) => {
                        ensured.insert(row.partition_key);
                    }
                    Err(e) => {
                        // Partition unavailable: the batch cannot make
                        // progress from here.
                        return self.abort_batch_remainder(result, batch, index, &e);
                    }
                }
            }

            match self.destination.insert(&row).await {
                Ok(()) => {
                    result.successful_records += 1;
                }
                Err(SinkError::Record { message }) => {
                    result.failed_records += 1;
                    warn!(
                        source = %self.source_name,
                        record_id = validated.record.id_for_errors(),
                        error = %message,
                        "Record insert failed"
                    );
                    emit!(RecordLoadFailed {
                        source: self.source_name.clone(),
                    });
                    result.errors.push(RecordError {
                        record_id: validated.record.id_for_errors().to_string(),
                        error: message,
                    });
                }
                Err(e @ SinkError::Transaction { .. }) => {
                    return self.abort_batch_remainder(result, batch, index, &e);
                }
            }
        }

        if let Err(e) = self.destination.commit_batch().await {
            // Commit failed after all inserts: count the batch as failed.
            result.failed_records += result.successful_records;
            result.successful_records = 0;
            result.errors.push(RecordError {
                record_id: format!("batch:{}", self.source_name),
                error: e.to_string(),
            });
            error!(source = %self.source_name, error = %e, "Batch commit failed");
        }

        emit!(RecordsLoaded {
            count: result.successful_records as u64,
            source: self.source_name.clone(),
        });
        emit!(BatchLoadCompleted {
            duration: started.elapsed(),
            source: self.source_name.clone(),
        });
        debug!(
            source = %self.source_name,
            batch = batch.len(),
            successful = result.successful_records,
            "Batch loaded"
        );
        result
    }

    /// A transaction-level failure mid-batch: the remaining records of
    /// this batch (current one included) fail with a single batch
    /// error; prior records in the batch keep their outcome.
    fn abort_batch_remainder(
        &self,
        mut result: LoadResult,
        batch: &[ValidatedRecord],
        failed_index: usize,
        error: &SinkError,
    ) -> LoadResult {
        let remaining = batch.len() - failed_index;
        result.failed_records += remaining;
        result.errors.push(RecordError {
            record_id: format!("batch:{}", self.source_name),
            error: error.to_string(),
        });
        error!(
            source = %self.source_name,
            remaining,
            error = %error,
            "Transaction failure aborted batch remainder"
        );
        result
    }

    /// The transaction scope could not even be opened.
    fn fail_whole_batch(&self, mut result: LoadResult, error: &SinkError) -> LoadResult {
        result.failed_records = result.total_records;
        result.errors.push(RecordError {
            record_id: format!("batch:{}", self.source_name),
            error: error.to_string(),
        });
        error!(source = %self.source_name, error = %error, "Failed to open batch transaction");
        result
    }
}
