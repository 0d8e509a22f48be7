use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::{Context, Result};
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use opentelemetry::metrics::{Counter, MeterProvider};
use opentelemetry::KeyValue;
use opentelemetry_prometheus::exporter;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::{Encoder, Registry, TextEncoder};
use wxr_client::WeatherProvider;
use wxr_core::SampleStore;
use wxr_reports::ReportService;

pub mod error;
pub mod reports;
pub mod weather;

pub use error::{ApiError, ApiResult};

/// Everything the handlers call into
#[derive(Clone)]
pub struct Services {
    pub provider: Arc<dyn WeatherProvider>,
    pub samples: Arc<dyn SampleStore>,
    pub reports: Arc<ReportService>,
}

pub struct AppState {
    ready: AtomicBool,
    registry: Registry,
    #[allow(dead_code)]
    meter_provider: SdkMeterProvider,
    requests_total: Counter<u64>,
    pub services: Services,
}

pub fn build_app(services: Services) -> Result<(Router, Arc<AppState>)> {
    // Prometheus exporter via OpenTelemetry
    let registry = Registry::new();
    let reader = exporter()
        .with_registry(registry.clone())
        .build()
        .context("building prometheus exporter")?;
    let meter_provider = SdkMeterProvider::builder().with_reader(reader).build();
    let meter = meter_provider.meter("wxr-api");

    let requests_total = meter
        .u64_counter("wxr_requests_total")
        .with_description("Total HTTP requests served")
        .init();

    let state = Arc::new(AppState {
        ready: AtomicBool::new(false),
        registry,
        meter_provider,
        requests_total,
        services,
    });

    let api = Router::new()
        .route("/weather", get(weather::range).post(weather::store))
        .route("/weather/current", get(weather::current))
        .route("/weather/historical", get(weather::historical))
        .route("/weather/aggregate", get(weather::aggregate))
        .route("/weather/statistics", get(weather::statistics))
        .route("/reports", get(reports::list).post(reports::generate))
        .route("/reports/search", post(reports::search))
        .route("/reports/count", post(reports::count))
        .route("/reports/compare", get(reports::compare))
        .route("/reports/:id", get(reports::get_by_id));

    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .nest("/api/v1", api)
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            count_requests,
        ))
        .with_state(Arc::clone(&state));

    Ok((router, state))
}

pub fn set_ready(state: &Arc<AppState>, is_ready: bool) {
    state.ready.store(is_ready, Ordering::Relaxed);
}

async fn count_requests(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let response = next.run(request).await;
    state.requests_total.add(
        1,
        &[
            KeyValue::new("method", method),
            KeyValue::new("status", i64::from(response.status().as_u16())),
        ],
    );
    response
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn readyz(State(state): State<Arc<AppState>>) -> StatusCode {
    if state.ready.load(Ordering::Relaxed) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn metrics(
    State(state): State<Arc<AppState>>,
) -> (
    [(axum::http::header::HeaderName, axum::http::HeaderValue); 1],
    String,
) {
    let encoder = TextEncoder::new();
    let metric_families = state.registry.gather();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buf) {
        tracing::warn!(error=?e, "failed to encode metrics");
    }
    let body = String::from_utf8(buf).unwrap_or_default();
    let header = (
        header::CONTENT_TYPE,
        axum::http::HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
    );
    ([header], body)
}
