//! Bronze destination abstraction and loader.
//!
//! The core depends on the narrow [`BronzeDestination`] contract:
//! idempotent partition creation, per-row insert, and an optional
//! transaction scope around each batch. Concrete destinations are an
//! in-memory store (tests, dry runs) and a local partitioned NDJSON
//! store.

mod loader;
mod local;
mod memory;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::SinkError;
use crate::record::BronzeRow;

pub use loader::PartitionedLoader;
pub use local::LocalDestination;
pub use memory::MemoryDestination;

/// Narrow contract for a bronze-layer destination store.
///
/// The destination is constructed once at the composition root and
/// shared by reference; its lifecycle (init/teardown) is explicit, not
/// implicit on first access.
#[async_trait]
pub trait BronzeDestination: Send + Sync {
    /// Create the partition for a date if absent. Idempotent: creating
    /// an existing partition is a no-op, never an error.
    async fn ensure_partition(&self, date: NaiveDate) -> Result<(), SinkError>;

    /// Insert one row. May fail per call; failures are isolated by the
    /// loader.
    async fn insert(&self, row: &BronzeRow) -> Result<(), SinkError>;

    /// Open the logical transaction scope for a batch.
    async fn begin_batch(&self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Close the current batch's transaction scope.
    async fn commit_batch(&self) -> Result<(), SinkError> {
        Ok(())
    }
}
