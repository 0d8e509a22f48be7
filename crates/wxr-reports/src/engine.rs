//! Range aggregation over stored samples
//!
//! Every call rescans the raw samples of its range; nothing is maintained
//! incrementally.

use crate::{ReportError, ReportResult};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, instrument};
use wxr_core::{
    bucket_samples, summarize, AggregateSummary, AggregatedBucket, Interval, SampleStore,
    TimeRange,
};

/// Look-back window of [`AggregationEngine::statistics`] when none is given
pub const DEFAULT_STATISTICS_DAYS: u32 = 7;

#[derive(Clone)]
pub struct AggregationEngine {
    samples: Arc<dyn SampleStore>,
}

impl AggregationEngine {
    pub fn new(samples: Arc<dyn SampleStore>) -> Self {
        Self { samples }
    }

    fn check_range(range: &TimeRange) -> ReportResult<()> {
        if range.is_valid() {
            Ok(())
        } else {
            Err(ReportError::InvalidRange {
                start: range.start,
                end: range.end,
            })
        }
    }

    /// Calendar buckets in ascending time order; empty when the range has no samples
    #[instrument(skip(self), fields(start = %range.start, end = %range.end))]
    pub async fn aggregate_by_interval(
        &self,
        range: TimeRange,
        interval: Interval,
    ) -> ReportResult<Vec<AggregatedBucket>> {
        Self::check_range(&range)?;
        let samples = self.samples.samples_in_range(&range).await?;
        let buckets = bucket_samples(&samples, interval);
        debug!(
            samples = samples.len(),
            buckets = buckets.len(),
            "Aggregated range"
        );
        Ok(buckets)
    }

    /// Single summary for the range; fails with `NoData` when it holds no samples
    #[instrument(skip(self), fields(start = %range.start, end = %range.end))]
    pub async fn aggregate_flat(&self, range: TimeRange) -> ReportResult<AggregateSummary> {
        Self::check_range(&range)?;
        let summary = self.summary(&range).await?;
        if summary.is_empty() {
            return Err(ReportError::NoData {
                start: range.start,
                end: range.end,
            });
        }
        Ok(summary)
    }

    /// Summary over the last `days` days (default 7).
    ///
    /// An empty window yields a zeroed summary with `records_count == 0`.
    pub async fn statistics(&self, days: Option<u32>) -> ReportResult<AggregateSummary> {
        self.statistics_at(Utc::now(), days).await
    }

    pub async fn statistics_at(
        &self,
        now: DateTime<Utc>,
        days: Option<u32>,
    ) -> ReportResult<AggregateSummary> {
        let days = days.unwrap_or(DEFAULT_STATISTICS_DAYS);
        let start = Duration::try_days(i64::from(days))
            .and_then(|window| now.checked_sub_signed(window))
            .ok_or(ReportError::WindowOutOfRange(days))?;
        let range = TimeRange::new(start, now);
        self.summary(&range).await
    }

    async fn summary(&self, range: &TimeRange) -> ReportResult<AggregateSummary> {
        let samples = self.samples.samples_in_range(range).await?;
        Ok(summarize(&samples))
    }
}
