#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use tower::ServiceExt;
use wxr_api::{AppState, Services};
use wxr_client::{ErrorKind, WeatherError, WeatherProvider, WeatherResult};
use wxr_core::{Location, SampleSource, WeatherSample};
use wxr_db::{MemoryStore, Stores};
use wxr_reports::{AggregationEngine, PageConfig, ReportService};

/// Provider answering from memory, or failing with a fixed kind
pub struct CannedProvider {
    pub failure: Option<ErrorKind>,
}

#[async_trait::async_trait]
impl WeatherProvider for CannedProvider {
    fn name(&self) -> &str {
        "canned"
    }

    async fn current_weather(&self) -> WeatherResult<WeatherSample> {
        match self.failure {
            Some(kind) => Err(failure(kind)),
            None => Ok(sample(at(12, 0), 18.0)),
        }
    }

    async fn historical_weather(&self, date: DateTime<Utc>) -> WeatherResult<WeatherSample> {
        match self.failure {
            Some(ErrorKind::NoData) => Err(WeatherError::NoData(date)),
            Some(kind) => Err(failure(kind)),
            None => Ok(sample(date, 9.5)),
        }
    }
}

fn failure(kind: ErrorKind) -> WeatherError {
    WeatherError::Provider {
        kind,
        status: 500,
        message: format!("canned {kind:?}"),
    }
}

pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, hour, minute, 0).unwrap()
}

pub fn sample(timestamp: DateTime<Utc>, temperature: f64) -> WeatherSample {
    WeatherSample {
        timestamp,
        temperature,
        pressure: 1013.0,
        humidity: 55.0,
        cloud_cover: 20.0,
        wind_speed: 3.5,
        wind_direction: 270.0,
        visibility: Some(10_000.0),
        weather_condition: "few clouds".into(),
        rain_amount: 0.0,
        source: SampleSource {
            provider: "openweathermap".into(),
            location: Location {
                name: "Warsaw".into(),
                latitude: 52.2297,
                longitude: 21.0122,
            },
        },
    }
}

pub fn app_with(failure: Option<ErrorKind>) -> (Router, Arc<AppState>, MemoryStore) {
    let store = MemoryStore::new();
    let stores = Stores::memory(store.clone());
    let engine = AggregationEngine::new(stores.samples.clone());
    let services = Services {
        provider: Arc::new(CannedProvider { failure }),
        samples: stores.samples.clone(),
        reports: Arc::new(ReportService::new(
            stores.reports.clone(),
            engine,
            PageConfig::default(),
        )),
    };
    let (router, state) = wxr_api::build_app(services).unwrap();
    (router, state, store)
}

pub fn app() -> (Router, Arc<AppState>, MemoryStore) {
    app_with(None)
}

pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let res = app.clone().oneshot(request).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}
