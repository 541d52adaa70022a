//! Source abstraction and registry.
//!
//! A [`DataSource`] is the narrow contract the core depends on: fetch
//! one page of raw records for one date. Concrete sources (HTTP APIs,
//! landing directories) are registered by name in a [`SourceRegistry`]
//! at startup, so source resolution is a static lookup rather than a
//! dynamic import.

mod extract;
mod ndjson;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::{ConfigError, ExtractError};
use crate::record::RawRecord;

pub use extract::RateLimitedExtractor;
pub use ndjson::NdjsonSource;

/// Narrow contract for a pluggable data source.
///
/// `fetch_page` returns up to `page_size` records for the given date;
/// an empty page signals the end of that date's data. Pagination state
/// lives with the caller, so pages must be requested sequentially.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch_page(
        &self,
        date: NaiveDate,
        page: u32,
        page_size: usize,
    ) -> Result<Vec<RawRecord>, ExtractError>;
}

/// Maps source names to statically registered implementations.
#[derive(Default)]
pub struct SourceRegistry {
    sources: HashMap<String, Arc<dyn DataSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source under a name. Later registrations replace
    /// earlier ones with the same name.
    pub fn register(&mut self, name: impl Into<String>, source: Arc<dyn DataSource>) {
        self.sources.insert(name.into(), source);
    }

    /// Resolve a source by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn DataSource>, ConfigError> {
        self.sources
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownSource {
                name: name.to_string(),
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptySource;

    #[async_trait]
    impl DataSource for EmptySource {
        async fn fetch_page(
            &self,
            _date: NaiveDate,
            _page: u32,
            _page_size: usize,
        ) -> Result<Vec<RawRecord>, ExtractError> {
            Ok(vec![])
        }
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = SourceRegistry::new();
        registry.register("garmin", Arc::new(EmptySource));

        assert!(registry.get("garmin").is_ok());
        let err = registry.get("fitbit").err().unwrap();
        assert!(err.to_string().contains("fitbit"));
    }

    #[tokio::test]
    async fn test_registered_source_is_callable() {
        let mut registry = SourceRegistry::new();
        registry.register("garmin", Arc::new(EmptySource));

        let source = registry.get("garmin").unwrap();
        let page = source
            .fetch_page("2024-03-01".parse().unwrap(), 1, 100)
            .await
            .unwrap();
        assert!(page.is_empty());
    }
}
