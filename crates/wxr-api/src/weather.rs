//! Weather sample handlers

use crate::error::{ApiError, ApiResult};
use crate::AppState;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use wxr_core::{
    AggregateSummary, AggregatedBucket, Interval, SampleQuery, SampleSortField, SortOrder,
    TimeRange, WeatherSample,
};

pub(crate) fn parse_time(name: &str, value: &str) -> ApiResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| ApiError::BadRequest(format!("{name} must be an RFC 3339 timestamp")))
}

fn parse_range(start: &str, end: &str) -> ApiResult<TimeRange> {
    Ok(TimeRange::new(
        parse_time("start", start)?,
        parse_time("end", end)?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct HistoricalParams {
    date: String,
}

#[derive(Debug, Deserialize)]
pub struct RangeParams {
    start: String,
    end: String,
    limit: Option<u32>,
    offset: Option<u32>,
    sort: Option<String>,
    order: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AggregateParams {
    start: String,
    end: String,
    interval: String,
}

#[derive(Debug, Deserialize)]
pub struct StatisticsParams {
    days: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplePage {
    pub items: Vec<WeatherSample>,
    pub total_count: u64,
}

pub async fn current(State(state): State<Arc<AppState>>) -> ApiResult<Json<WeatherSample>> {
    Ok(Json(state.services.provider.current_weather().await?))
}

pub async fn historical(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoricalParams>,
) -> ApiResult<Json<WeatherSample>> {
    let date = parse_time("date", &params.date)?;
    Ok(Json(state.services.provider.historical_weather(date).await?))
}

pub async fn store(
    State(state): State<Arc<AppState>>,
    Json(sample): Json<WeatherSample>,
) -> ApiResult<(StatusCode, Json<WeatherSample>)> {
    state.services.samples.insert_sample(&sample).await?;
    Ok((StatusCode::CREATED, Json(sample)))
}

pub async fn range(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RangeParams>,
) -> ApiResult<Json<SamplePage>> {
    let range = parse_range(&params.start, &params.end)?;
    let field = match params.sort.as_deref() {
        Some(s) => s
            .parse::<SampleSortField>()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?,
        None => SampleSortField::default(),
    };
    let order = match params.order.as_deref() {
        Some(s) => s
            .parse::<SortOrder>()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?,
        None => SortOrder::default(),
    };

    let max = state.services.reports.page_config().max_size;
    let mut query = SampleQuery::new(range)
        .offset(params.offset.unwrap_or(0))
        .sort(field, order);
    if let Some(limit) = params.limit {
        query = query.limit(limit.min(max));
    }

    let items = state.services.samples.query_samples(&query).await?;
    let total_count = state.services.samples.count_samples(&range).await?;
    Ok(Json(SamplePage { items, total_count }))
}

pub async fn aggregate(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AggregateParams>,
) -> ApiResult<Json<Vec<AggregatedBucket>>> {
    let range = parse_range(&params.start, &params.end)?;
    let interval = params
        .interval
        .parse::<Interval>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let buckets = state
        .services
        .reports
        .engine()
        .aggregate_by_interval(range, interval)
        .await?;
    Ok(Json(buckets))
}

pub async fn statistics(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StatisticsParams>,
) -> ApiResult<Json<AggregateSummary>> {
    let summary = state
        .services
        .reports
        .engine()
        .statistics(params.days)
        .await?;
    Ok(Json(summary))
}
