//! Core record types flowing through the ingestion pipeline.
//!
//! A `RawRecord` is produced by extraction, wrapped into a
//! `ValidatedRecord` by validation, and persisted as a `BronzeRow` by
//! the loader. All three are immutable once created.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata stamped onto every record at extraction time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractMetadata {
    /// When the page containing this record was fetched.
    pub fetched_at: DateTime<Utc>,
    /// Name of the source the record came from.
    pub source: String,
    /// API version reported by the source configuration.
    pub api_version: String,
}

/// A source-native record: untyped fields plus identity and timing.
///
/// Immutable once produced by the extractor. The `fields` map preserves
/// whatever shape the source returned; no transformation happens before
/// the bronze layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    /// Opaque source-assigned identifier, if the source provides one.
    pub raw_id: Option<String>,
    /// Event time reported by the source.
    pub source_timestamp: DateTime<Utc>,
    /// Source-native field mapping.
    pub fields: Map<String, Value>,
    /// Extraction metadata stamped by the extractor.
    pub metadata: ExtractMetadata,
}

impl RawRecord {
    /// Identifier used in error reports, `"unknown"` when absent.
    pub fn id_for_errors(&self) -> &str {
        self.raw_id.as_deref().unwrap_or("unknown")
    }
}

/// Outcome of validating one raw record.
///
/// Created exactly once per `RawRecord`; never mutated afterwards.
/// Invalid records still flow to the loader with
/// `validation_status = invalid` so the bronze layer keeps everything.
#[derive(Debug, Clone)]
pub struct ValidatedRecord {
    pub record: RawRecord,
    pub is_valid: bool,
    /// Heuristic quality score, always clamped to `[0, 1]`.
    pub quality_score: f64,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidatedRecord {
    pub fn status(&self) -> ValidationStatus {
        if self.is_valid {
            ValidationStatus::Valid
        } else {
            ValidationStatus::Invalid
        }
    }
}

/// Persisted validation status of a bronze row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Valid,
    Invalid,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Valid => "valid",
            ValidationStatus::Invalid => "invalid",
        }
    }
}

/// The persisted bronze-layer shape.
///
/// Owned by the destination store once inserted. `partition_key` is
/// derived deterministically from `source_timestamp`, so every row maps
/// to exactly one partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BronzeRow {
    pub source: String,
    pub raw_data: Value,
    pub source_timestamp: DateTime<Utc>,
    pub raw_id: Option<String>,
    pub validation_status: ValidationStatus,
    pub metadata: Value,
    pub partition_key: NaiveDate,
}

impl BronzeRow {
    /// Build the bronze row for a validated record.
    pub fn from_validated(source: &str, validated: &ValidatedRecord) -> Self {
        let record = &validated.record;
        let metadata = serde_json::json!({
            "fetched_at": record.metadata.fetched_at,
            "source": record.metadata.source,
            "api_version": record.metadata.api_version,
            "quality_score": validated.quality_score,
            "errors": validated.errors,
            "warnings": validated.warnings,
        });
        Self {
            source: source.to_string(),
            raw_data: Value::Object(record.fields.clone()),
            source_timestamp: record.source_timestamp,
            raw_id: record.raw_id.clone(),
            validation_status: validated.status(),
            metadata,
            partition_key: record.source_timestamp.date_naive(),
        }
    }
}

/// One failed record inside a `LoadResult`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordError {
    pub record_id: String,
    pub error: String,
}

/// Outcome of a load: one per batch, merged into one per run.
///
/// Invariant: `successful_records + failed_records == total_records`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadResult {
    pub total_records: usize,
    pub successful_records: usize,
    pub failed_records: usize,
    pub errors: Vec<RecordError>,
}

impl LoadResult {
    /// Fold a batch-level result into this run-level result.
    pub fn merge(&mut self, batch: LoadResult) {
        self.total_records += batch.total_records;
        self.successful_records += batch.successful_records;
        self.failed_records += batch.failed_records;
        self.errors.extend(batch.errors);
    }

    pub fn is_balanced(&self) -> bool {
        self.successful_records + self.failed_records == self.total_records
    }
}

/// Half-open date range `[start, end)` for an extraction run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// The most recent `n` complete days, ending yesterday inclusive.
    pub fn last_days(n: u64) -> Self {
        let end = Utc::now().date_naive();
        let start = end
            .checked_sub_days(Days::new(n))
            .unwrap_or(NaiveDate::MIN);
        Self { start, end }
    }

    /// Iterate the days of the range in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let (start, end) = (self.start, self.end);
        std::iter::successors(Some(start), |d| d.checked_add_days(Days::new(1)))
            .take_while(move |d| *d < end)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_load_result_merge() {
        let mut run = LoadResult::default();
        run.merge(LoadResult {
            total_records: 100,
            successful_records: 99,
            failed_records: 1,
            errors: vec![RecordError {
                record_id: "a".into(),
                error: "boom".into(),
            }],
        });
        run.merge(LoadResult {
            total_records: 50,
            successful_records: 50,
            failed_records: 0,
            errors: vec![],
        });

        assert_eq!(run.total_records, 150);
        assert_eq!(run.successful_records, 149);
        assert_eq!(run.failed_records, 1);
        assert_eq!(run.errors.len(), 1);
        assert!(run.is_balanced());
    }

    #[test]
    fn test_date_range_days() {
        let range = DateRange::new(date("2024-03-01"), date("2024-03-04"));
        let days: Vec<_> = range.days().collect();
        assert_eq!(
            days,
            vec![date("2024-03-01"), date("2024-03-02"), date("2024-03-03")]
        );
    }

    #[test]
    fn test_date_range_empty() {
        let range = DateRange::new(date("2024-03-04"), date("2024-03-04"));
        assert!(range.is_empty());
        assert_eq!(range.days().count(), 0);
    }

    #[test]
    fn test_partition_key_from_source_timestamp() {
        let record = RawRecord {
            raw_id: Some("r1".into()),
            source_timestamp: "2024-03-01T23:59:59Z".parse().unwrap(),
            fields: Map::new(),
            metadata: ExtractMetadata {
                fetched_at: Utc::now(),
                source: "test".into(),
                api_version: "1.0".into(),
            },
        };
        let validated = ValidatedRecord {
            record,
            is_valid: true,
            quality_score: 1.0,
            errors: vec![],
            warnings: vec![],
        };

        let row = BronzeRow::from_validated("test", &validated);
        assert_eq!(row.partition_key, date("2024-03-01"));
        assert_eq!(row.validation_status, ValidationStatus::Valid);
        assert_eq!(row.metadata["quality_score"], 1.0);
    }

    #[test]
    fn test_validation_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ValidationStatus::Invalid).unwrap(),
            r#""invalid""#
        );
    }
}
