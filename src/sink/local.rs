//! Local filesystem bronze destination.
//!
//! Rows are appended as NDJSON under Hive-style partition directories:
//! `<root>/<source>/date=YYYY-MM-DD/rows.ndjson`. Directory creation is
//! idempotent, so partition creation never races with itself across
//! batches.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::SinkError;
use crate::record::BronzeRow;
use crate::sink::BronzeDestination;

/// Bronze destination writing date-partitioned NDJSON files.
pub struct LocalDestination {
    root: PathBuf,
    source: String,
}

impl LocalDestination {
    pub fn new(root: impl Into<PathBuf>, source: &str) -> Self {
        Self {
            root: root.into(),
            source: source.to_string(),
        }
    }

    fn partition_dir(&self, date: NaiveDate) -> PathBuf {
        self.root.join(&self.source).join(format!("date={date}"))
    }
}

#[async_trait]
impl BronzeDestination for LocalDestination {
    async fn ensure_partition(&self, date: NaiveDate) -> Result<(), SinkError> {
        let dir = self.partition_dir(date);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| SinkError::Transaction {
                message: format!("failed to create partition {}: {e}", dir.display()),
            })?;
        debug!(partition = %dir.display(), "Partition ensured");
        Ok(())
    }

    async fn insert(&self, row: &BronzeRow) -> Result<(), SinkError> {
        let mut line = serde_json::to_string(row).map_err(|e| SinkError::Record {
            message: format!("failed to serialize bronze row: {e}"),
        })?;
        line.push('\n');

        let path = self.partition_dir(row.partition_key).join("rows.ndjson");
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| SinkError::Transaction {
                message: format!("failed to open {}: {e}", path.display()),
            })?;

        file.write_all(line.as_bytes())
            .await
            .map_err(|e| SinkError::Transaction {
                message: format!("failed to write {}: {e}", path.display()),
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ValidationStatus;
    use serde_json::json;

    fn row(date: &str, id: &str) -> BronzeRow {
        BronzeRow {
            source: "garmin".into(),
            raw_data: json!({"id": id}),
            source_timestamp: format!("{date}T10:00:00Z").parse().unwrap(),
            raw_id: Some(id.into()),
            validation_status: ValidationStatus::Valid,
            metadata: json!({}),
            partition_key: date.parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn test_rows_land_in_partition_directory() {
        let dir = tempfile::tempdir().unwrap();
        let dest = LocalDestination::new(dir.path(), "garmin");
        let date: NaiveDate = "2024-03-01".parse().unwrap();

        dest.ensure_partition(date).await.unwrap();
        dest.insert(&row("2024-03-01", "a")).await.unwrap();
        dest.insert(&row("2024-03-01", "b")).await.unwrap();

        let contents = tokio::fs::read_to_string(
            dir.path().join("garmin/date=2024-03-01/rows.ndjson"),
        )
        .await
        .unwrap();
        assert_eq!(contents.lines().count(), 2);

        let parsed: BronzeRow = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
        assert_eq!(parsed.raw_id.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_ensure_partition_twice_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let dest = LocalDestination::new(dir.path(), "garmin");
        let date: NaiveDate = "2024-03-01".parse().unwrap();

        dest.ensure_partition(date).await.unwrap();
        dest.ensure_partition(date).await.unwrap();
    }
}
