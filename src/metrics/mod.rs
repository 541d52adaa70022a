//! Metrics and observability infrastructure.
//!
//! - `events`: Internal event types and the `InternalEvent` trait
//! - `server`: Prometheus HTTP server and initialization

pub mod events;
pub mod server;

pub use server::{MetricsController, init_global};

/// Macro for emitting metric events (Vector-style pattern).
///
/// Calls the `InternalEvent::emit()` method on the given event, which
/// records the corresponding Prometheus metric.
///
/// # Example
///
/// ```ignore
/// use smelter::metrics::events::RecordsExtracted;
///
/// emit!(RecordsExtracted { count: 100, source: "events".to_string() });
/// ```
#[macro_export]
macro_rules! emit {
    ($event:expr) => {
        $crate::metrics::events::InternalEvent::emit($event)
    };
}

pub use emit;
