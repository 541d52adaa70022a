//! Built-in source reading NDJSON landing files.
//!
//! Expects one file per day under a root directory, named
//! `YYYY-MM-DD.ndjson`. A missing file means the day has no data.
//! Paging slices the file's lines so the extractor's pagination and
//! rate limiting behave the same as against a remote API.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::Value;

use crate::error::ExtractError;
use crate::record::{ExtractMetadata, RawRecord};
use crate::source::DataSource;

/// Landing-directory source for locally staged NDJSON files.
pub struct NdjsonSource {
    root: PathBuf,
}

impl NdjsonSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn file_for(&self, date: NaiveDate) -> PathBuf {
        self.root.join(format!("{date}.ndjson"))
    }
}

#[async_trait]
impl DataSource for NdjsonSource {
    async fn fetch_page(
        &self,
        date: NaiveDate,
        page: u32,
        page_size: usize,
    ) -> Result<Vec<RawRecord>, ExtractError> {
        let path = self.file_for(date);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => {
                return Err(ExtractError::Transport {
                    date,
                    page,
                    message: format!("{}: {e}", path.display()),
                });
            }
        };

        let offset = (page.saturating_sub(1) as usize) * page_size;
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .skip(offset)
            .take(page_size)
            .map(|line| parse_line(line, date))
            .collect()
    }
}

/// Parse one NDJSON line into a raw record.
///
/// `raw_id` comes from an `id` or `raw_id` field when present; the
/// source timestamp comes from a parseable `timestamp` field, falling
/// back to midnight UTC of the landing date. Extraction metadata is
/// stamped later by the extractor.
fn parse_line(line: &str, date: NaiveDate) -> Result<RawRecord, ExtractError> {
    let value: Value = serde_json::from_str(line).map_err(|e| ExtractError::Malformed {
        message: format!("invalid NDJSON line: {e}"),
    })?;
    let Value::Object(fields) = value else {
        return Err(ExtractError::Malformed {
            message: "NDJSON line is not a JSON object".to_string(),
        });
    };

    let raw_id = fields
        .get("id")
        .or_else(|| fields.get("raw_id"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let midnight = DateTime::from_naive_utc_and_offset(date.and_time(NaiveTime::MIN), Utc);
    let source_timestamp = fields
        .get("timestamp")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(midnight);

    Ok(RawRecord {
        raw_id,
        source_timestamp,
        fields,
        metadata: ExtractMetadata {
            fetched_at: Utc::now(),
            source: String::new(),
            api_version: String::new(),
        },
    })
}
