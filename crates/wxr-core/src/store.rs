use chrono::{DateTime, Utc};

use crate::query::{Page, ReportFilter, ReportOrder, SampleQuery, TimeRange};
use crate::types::{OneTimeCode, WeatherReport, WeatherSample};

/// Persistence failure, always fatal to the calling operation
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Append-only time-series storage for weather samples
#[async_trait::async_trait]
pub trait SampleStore: Send + Sync {
    /// Append one sample; never deduplicates
    async fn insert_sample(&self, sample: &WeatherSample) -> StoreResult<()>;

    /// Sorted, paginated range scan
    async fn query_samples(&self, query: &SampleQuery) -> StoreResult<Vec<WeatherSample>>;

    async fn count_samples(&self, range: &TimeRange) -> StoreResult<u64>;

    /// Every sample in the range, oldest first
    async fn samples_in_range(&self, range: &TimeRange) -> StoreResult<Vec<WeatherSample>>;
}

#[async_trait::async_trait]
pub trait ReportStore: Send + Sync {
    async fn insert_report(&self, report: &WeatherReport) -> StoreResult<()>;

    async fn get_report(&self, id: &str) -> StoreResult<Option<WeatherReport>>;

    async fn list_reports(
        &self,
        filter: &ReportFilter,
        order: &ReportOrder,
        page: Page,
    ) -> StoreResult<Vec<WeatherReport>>;

    async fn count_reports(&self, filter: &ReportFilter) -> StoreResult<u64>;
}

/// One-time passcode records swept by housekeeping
#[async_trait::async_trait]
pub trait CodeStore: Send + Sync {
    async fn insert_code(&self, code: &OneTimeCode) -> StoreResult<()>;

    /// Returns the number of deleted records
    async fn delete_codes_created_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64>;
}
