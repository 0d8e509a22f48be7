//! Report generation, listing and comparison

use crate::{AggregationEngine, ReportError, ReportResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use wxr_core::{
    MetricDeviations, Page, ReportComparison, ReportFilter, ReportOrder, ReportStore, TimeRange,
    WeatherReport,
};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Page size limits applied to every listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageConfig {
    pub default_size: u32,
    pub max_size: u32,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            default_size: DEFAULT_PAGE_SIZE,
            max_size: MAX_PAGE_SIZE,
        }
    }
}

impl PageConfig {
    /// Default size when `first` is omitted; clamped to the maximum otherwise
    pub fn resolve(&self, first: Option<u32>, skip: Option<u32>) -> Page {
        let first = first.unwrap_or(self.default_size).min(self.max_size);
        Page::new(first, skip.unwrap_or(0))
    }
}

/// Input of [`ReportService::generate_report`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReport {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Listing request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportQuery {
    pub user_id: Option<String>,
    pub first: Option<u32>,
    pub skip: Option<u32>,
    pub filter: ReportFilter,
    /// `{field}_{ASC|DESC}` tokens
    pub order_by: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportPage {
    pub items: Vec<WeatherReport>,
    pub total_count: u64,
}

pub fn default_title(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    format!(
        "Weather Report from {} to {}",
        start.format("%Y-%m-%d"),
        end.format("%Y-%m-%d")
    )
}

pub struct ReportService {
    reports: Arc<dyn ReportStore>,
    engine: AggregationEngine,
    pages: PageConfig,
}

impl ReportService {
    pub fn new(
        reports: Arc<dyn ReportStore>,
        engine: AggregationEngine,
        pages: PageConfig,
    ) -> Self {
        Self {
            reports,
            engine,
            pages,
        }
    }

    pub fn engine(&self) -> &AggregationEngine {
        &self.engine
    }

    pub fn page_config(&self) -> PageConfig {
        self.pages
    }

    /// Summarize the range and persist it as a new report.
    ///
    /// Nothing is written when the range holds no samples.
    #[instrument(skip(self, request), fields(start = %request.start_time, end = %request.end_time))]
    pub async fn generate_report(&self, request: NewReport) -> ReportResult<WeatherReport> {
        let range = TimeRange::new(request.start_time, request.end_time);
        let summary = self.engine.aggregate_flat(range).await?;

        let title = request
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| default_title(range.start, range.end));
        let now = Utc::now();

        let report = WeatherReport {
            id: Uuid::new_v4().to_string(),
            title,
            start_time: range.start,
            end_time: range.end,
            avg_temperature: Some(summary.avg_temperature),
            avg_pressure: Some(summary.avg_pressure),
            avg_humidity: Some(summary.avg_humidity),
            avg_cloud_cover: Some(summary.avg_cloud_cover),
            avg_wind_speed: Some(summary.avg_wind_speed),
            data_points_count: summary.records_count,
            user_id: request.user_id,
            created_at: now,
            updated_at: now,
        };

        self.reports.insert_report(&report).await?;
        info!(
            id = %report.id,
            data_points = report.data_points_count,
            "Report generated"
        );
        Ok(report)
    }

    /// Filtered, ordered page of reports plus the total match count
    pub async fn list(&self, query: &ReportQuery) -> ReportResult<ReportPage> {
        let order = ReportOrder::parse(&query.order_by)?;
        let filter = match &query.user_id {
            Some(user_id) => ReportFilter::owned_by(user_id.clone()).and(query.filter.clone()),
            None => query.filter.clone(),
        };
        let page = self.pages.resolve(query.first, query.skip);

        let items = self.reports.list_reports(&filter, &order, page).await?;
        let total_count = self.reports.count_reports(&filter).await?;

        Ok(ReportPage { items, total_count })
    }

    pub async fn count(&self, filter: &ReportFilter) -> ReportResult<u64> {
        Ok(self.reports.count_reports(filter).await?)
    }

    pub async fn get_by_id(&self, id: &str) -> ReportResult<WeatherReport> {
        self.reports
            .get_report(id)
            .await?
            .ok_or_else(|| ReportError::NotFound(id.to_string()))
    }

    /// Both reports plus absolute per-metric deviations
    pub async fn compare(&self, id_a: &str, id_b: &str) -> ReportResult<ReportComparison> {
        let report_a = self.get_by_id(id_a).await?;
        let report_b = self.get_by_id(id_b).await?;
        let deviations = MetricDeviations::between(&report_a, &report_b);

        Ok(ReportComparison {
            report_a,
            report_b,
            deviations,
        })
    }
}
