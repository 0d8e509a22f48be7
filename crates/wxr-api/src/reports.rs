//! Report handlers

use crate::error::ApiResult;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use wxr_core::{ReportComparison, ReportFilter, WeatherReport};
use wxr_reports::{NewReport, ReportPage, ReportQuery};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    first: Option<u32>,
    skip: Option<u32>,
    user_id: Option<String>,
    /// Comma separated `{field}_{ASC|DESC}` tokens
    order_by: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CompareParams {
    a: String,
    b: String,
}

pub async fn generate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NewReport>,
) -> ApiResult<(StatusCode, Json<WeatherReport>)> {
    let report = state.services.reports.generate_report(request).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<ReportPage>> {
    let order_by = params
        .order_by
        .as_deref()
        .map(|tokens| {
            tokens
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    let query = ReportQuery {
        user_id: params.user_id,
        first: params.first,
        skip: params.skip,
        filter: ReportFilter::default(),
        order_by,
    };
    Ok(Json(state.services.reports.list(&query).await?))
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Json(query): Json<ReportQuery>,
) -> ApiResult<Json<ReportPage>> {
    Ok(Json(state.services.reports.list(&query).await?))
}

pub async fn count(
    State(state): State<Arc<AppState>>,
    Json(filter): Json<ReportFilter>,
) -> ApiResult<Json<Value>> {
    let count = state.services.reports.count(&filter).await?;
    Ok(Json(json!({ "count": count })))
}

pub async fn compare(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CompareParams>,
) -> ApiResult<Json<ReportComparison>> {
    let comparison = state
        .services
        .reports
        .compare(&params.a, &params.b)
        .await?;
    Ok(Json(comparison))
}

pub async fn get_by_id(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<WeatherReport>> {
    Ok(Json(state.services.reports.get_by_id(&id).await?))
}
