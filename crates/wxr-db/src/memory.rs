//! In-process store used for development runs and tests

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use wxr_core::{
    CodeStore, OneTimeCode, Page, ReportFilter, ReportOrder, ReportStore, SampleQuery,
    SampleStore, StoreError, StoreResult, TimeRange, WeatherReport, WeatherSample,
};

#[derive(Default)]
struct Collections {
    samples: Vec<WeatherSample>,
    reports: Vec<WeatherReport>,
    codes: Vec<OneTimeCode>,
}

/// Store keeping every collection behind one async lock.
///
/// Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Collections>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of one-time codes currently held
    pub async fn code_count(&self) -> usize {
        self.inner.read().await.codes.len()
    }
}

#[async_trait::async_trait]
impl SampleStore for MemoryStore {
    async fn insert_sample(&self, sample: &WeatherSample) -> StoreResult<()> {
        self.inner.write().await.samples.push(sample.clone());
        debug!("Inserted weather sample for {}", sample.timestamp);
        Ok(())
    }

    async fn query_samples(&self, query: &SampleQuery) -> StoreResult<Vec<WeatherSample>> {
        let collections = self.inner.read().await;
        let mut samples: Vec<WeatherSample> = collections
            .samples
            .iter()
            .filter(|s| query.range.contains(s.timestamp))
            .cloned()
            .collect();
        drop(collections);

        samples.sort_by(|a, b| query.sort_order.apply(query.sort_field.compare(a, b)));

        let limit = query.limit.map_or(usize::MAX, |l| l as usize);
        Ok(samples
            .into_iter()
            .skip(query.offset as usize)
            .take(limit)
            .collect())
    }

    async fn count_samples(&self, range: &TimeRange) -> StoreResult<u64> {
        let collections = self.inner.read().await;
        Ok(collections
            .samples
            .iter()
            .filter(|s| range.contains(s.timestamp))
            .count() as u64)
    }

    async fn samples_in_range(&self, range: &TimeRange) -> StoreResult<Vec<WeatherSample>> {
        let collections = self.inner.read().await;
        let mut samples: Vec<WeatherSample> = collections
            .samples
            .iter()
            .filter(|s| range.contains(s.timestamp))
            .cloned()
            .collect();
        samples.sort_by_key(|s| s.timestamp);
        Ok(samples)
    }
}

#[async_trait::async_trait]
impl ReportStore for MemoryStore {
    async fn insert_report(&self, report: &WeatherReport) -> StoreResult<()> {
        let mut collections = self.inner.write().await;
        if collections.reports.iter().any(|r| r.id == report.id) {
            return Err(StoreError::Conflict(format!(
                "report {} already exists",
                report.id
            )));
        }
        collections.reports.push(report.clone());
        Ok(())
    }

    async fn get_report(&self, id: &str) -> StoreResult<Option<WeatherReport>> {
        let collections = self.inner.read().await;
        Ok(collections.reports.iter().find(|r| r.id == id).cloned())
    }

    async fn list_reports(
        &self,
        filter: &ReportFilter,
        order: &ReportOrder,
        page: Page,
    ) -> StoreResult<Vec<WeatherReport>> {
        let collections = self.inner.read().await;
        let mut reports: Vec<WeatherReport> = collections
            .reports
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        drop(collections);

        reports.sort_by(|a, b| order.compare(a, b));
        Ok(page.apply(reports))
    }

    async fn count_reports(&self, filter: &ReportFilter) -> StoreResult<u64> {
        let collections = self.inner.read().await;
        Ok(collections
            .reports
            .iter()
            .filter(|r| filter.matches(r))
            .count() as u64)
    }
}

#[async_trait::async_trait]
impl CodeStore for MemoryStore {
    async fn insert_code(&self, code: &OneTimeCode) -> StoreResult<()> {
        self.inner.write().await.codes.push(code.clone());
        Ok(())
    }

    async fn delete_codes_created_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let mut collections = self.inner.write().await;
        let before = collections.codes.len();
        collections.codes.retain(|c| c.created_at >= cutoff);
        let deleted = (before - collections.codes.len()) as u64;
        debug!("Deleted {} one-time codes created before {}", deleted, cutoff);
        Ok(deleted)
    }
}
