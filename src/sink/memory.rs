//! In-memory bronze destination.
//!
//! Backs tests and dry runs. Rows and partitions live in a mutex-held
//! map; accessors snapshot state rather than exposing the lock.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::SinkError;
use crate::record::BronzeRow;
use crate::sink::BronzeDestination;

#[derive(Default)]
struct MemoryState {
    partitions: BTreeMap<NaiveDate, Vec<BronzeRow>>,
    partition_creates: usize,
}

/// Bronze destination storing rows in process memory.
#[derive(Default)]
pub struct MemoryDestination {
    state: Mutex<MemoryState>,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// All rows across partitions, in partition order.
    pub fn rows(&self) -> Vec<BronzeRow> {
        let state = self.state.lock().expect("memory destination poisoned");
        state.partitions.values().flatten().cloned().collect()
    }

    /// Partition dates currently present.
    pub fn partitions(&self) -> Vec<NaiveDate> {
        let state = self.state.lock().expect("memory destination poisoned");
        state.partitions.keys().copied().collect()
    }

    /// Number of `ensure_partition` calls that actually created one.
    pub fn partition_creates(&self) -> usize {
        let state = self.state.lock().expect("memory destination poisoned");
        state.partition_creates
    }
}

#[async_trait]
impl BronzeDestination for MemoryDestination {
    async fn ensure_partition(&self, date: NaiveDate) -> Result<(), SinkError> {
        let mut state = self.state.lock().expect("memory destination poisoned");
        if !state.partitions.contains_key(&date) {
            state.partitions.insert(date, Vec::new());
            state.partition_creates += 1;
        }
        Ok(())
    }

    async fn insert(&self, row: &BronzeRow) -> Result<(), SinkError> {
        let mut state = self.state.lock().expect("memory destination poisoned");
        state
            .partitions
            .entry(row.partition_key)
            .or_default()
            .push(row.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ValidationStatus;
    use serde_json::json;

    fn row(date: &str) -> BronzeRow {
        BronzeRow {
            source: "test".into(),
            raw_data: json!({}),
            source_timestamp: format!("{date}T10:00:00Z").parse().unwrap(),
            raw_id: None,
            validation_status: ValidationStatus::Valid,
            metadata: json!({}),
            partition_key: date.parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn test_ensure_partition_is_idempotent() {
        let dest = MemoryDestination::new();
        let date = "2024-03-01".parse().unwrap();

        dest.ensure_partition(date).await.unwrap();
        dest.ensure_partition(date).await.unwrap();

        assert_eq!(dest.partitions(), vec![date]);
        assert_eq!(dest.partition_creates(), 1);
    }

    #[tokio::test]
    async fn test_insert_routes_to_partition() {
        let dest = MemoryDestination::new();
        dest.insert(&row("2024-03-01")).await.unwrap();
        dest.insert(&row("2024-03-02")).await.unwrap();

        assert_eq!(dest.partitions().len(), 2);
        assert_eq!(dest.rows().len(), 2);
    }
}
