//! HTTP client for the OpenWeather API

use crate::provider::{
    provider_error, CurrentResponse, HistoricalResponse, Normalizer, CURRENT_PATH,
    HISTORICAL_PATH, PROVIDER_NAME,
};
use crate::{ResponseCache, RetryPolicy, WeatherError, WeatherProvider, WeatherResult};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;
use wxr_core::{Location, UnitSystem, WeatherSample};

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const CURRENT_KEY: &str = "current";

/// Connection settings for [`OpenWeatherClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub base_url: Url,
    pub location: Location,
    pub units: UnitSystem,
    /// Per-attempt request timeout
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>, location: Location) -> WeatherResult<Self> {
        let base_url = Url::parse(DEFAULT_BASE_URL)
            .map_err(|e| WeatherError::Config(format!("base URL: {e}")))?;
        Ok(Self {
            api_key: api_key.into(),
            base_url,
            location,
            units: UnitSystem::default(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> WeatherResult<Self> {
        self.base_url = Url::parse(base_url)
            .map_err(|e| WeatherError::Config(format!("base URL {base_url}: {e}")))?;
        Ok(self)
    }

    pub fn with_units(mut self, units: UnitSystem) -> Self {
        self.units = units;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Fetches and normalizes observations for one configured location.
///
/// Successful samples are cached under `current` and
/// `historical:{unix seconds}`; failures are never cached.
pub struct OpenWeatherClient {
    http: reqwest::Client,
    config: ClientConfig,
    normalizer: Normalizer,
    cache: Arc<ResponseCache<WeatherSample>>,
}

impl OpenWeatherClient {
    pub fn new(
        config: ClientConfig,
        cache: Arc<ResponseCache<WeatherSample>>,
    ) -> WeatherResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(WeatherError::Config("API key is empty".into()));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        let normalizer = Normalizer::new(config.units, config.location.clone());

        info!(
            base_url = %config.base_url,
            location = %config.location.name,
            units = %config.units,
            "Weather client ready"
        );

        Ok(Self {
            http,
            config,
            normalizer,
            cache,
        })
    }

    pub fn location(&self) -> &Location {
        &self.config.location
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    fn endpoint(&self, path: &str) -> WeatherResult<Url> {
        let mut base = self.config.base_url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(path)
            .map_err(|e| WeatherError::Config(format!("endpoint {path}: {e}")))
    }

    fn base_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("lat", self.config.location.latitude.to_string()),
            ("lon", self.config.location.longitude.to_string()),
            ("appid", self.config.api_key.clone()),
            ("units", self.config.units.as_param().to_string()),
        ]
    }

    /// GET `url` under the retry policy and decode the JSON body
    async fn fetch<R: DeserializeOwned>(
        &self,
        url: Url,
        params: Vec<(&'static str, String)>,
        plan_gated: bool,
    ) -> WeatherResult<R> {
        let url = &url;
        let params = &params;

        self.config
            .retry
            .run(|| async move {
                debug!(path = url.path(), "Requesting weather data");
                let response = self.http.get(url.clone()).query(params).send().await?;
                let status = response.status();

                if !status.is_success() {
                    let body = match response.text().await {
                        Ok(body) => body,
                        Err(e) => {
                            debug!(%status, error = %e, "Failed to read error body");
                            String::new()
                        }
                    };
                    return Err(provider_error(status.as_u16(), &body, plan_gated));
                }

                response
                    .json::<R>()
                    .await
                    .map_err(|e| WeatherError::InvalidResponse(e.to_string()))
            })
            .await
    }
}

#[async_trait::async_trait]
impl WeatherProvider for OpenWeatherClient {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn current_weather(&self) -> WeatherResult<WeatherSample> {
        if let Some(sample) = self.cache.get(CURRENT_KEY).await {
            debug!("Current weather served from cache");
            return Ok(sample);
        }

        let url = self.endpoint(CURRENT_PATH)?;
        let body: CurrentResponse = self.fetch(url, self.base_params(), false).await?;
        let sample = self.normalizer.current(body)?;

        self.cache.insert(CURRENT_KEY, sample.clone()).await;
        Ok(sample)
    }

    async fn historical_weather(&self, date: DateTime<Utc>) -> WeatherResult<WeatherSample> {
        let key = format!("historical:{}", date.timestamp());
        if let Some(sample) = self.cache.get(&key).await {
            debug!(%date, "Historical weather served from cache");
            return Ok(sample);
        }

        let url = self.endpoint(HISTORICAL_PATH)?;
        let mut params = self.base_params();
        params.push(("dt", date.timestamp().to_string()));

        let body: HistoricalResponse = self.fetch(url, params, true).await?;
        let sample = self.normalizer.historical(body, date)?;

        self.cache.insert(key, sample.clone()).await;
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use axum::extract::{Query, State};
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::{Json, Router};
    use chrono::TimeZone;
    use serde_json::json;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Local stand-in for the provider: replies with the scripted statuses
    /// first, then with a valid body.
    #[derive(Default)]
    struct FakeProvider {
        calls: AtomicUsize,
        script: Mutex<VecDeque<StatusCode>>,
        last_query: Mutex<HashMap<String, String>>,
        historical_empty: bool,
    }

    impl FakeProvider {
        fn failing_with(statuses: &[StatusCode]) -> Self {
            Self {
                script: Mutex::new(statuses.iter().copied().collect()),
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn scripted(&self, query: HashMap<String, String>) -> Option<Response> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_query.lock().unwrap() = query;
            self.script.lock().unwrap().pop_front().map(|status| {
                (status, Json(json!({"cod": status.as_u16(), "message": "scripted failure"})))
                    .into_response()
            })
        }
    }

    async fn current(
        State(fake): State<Arc<FakeProvider>>,
        Query(query): Query<HashMap<String, String>>,
    ) -> Response {
        if let Some(failure) = fake.scripted(query) {
            return failure;
        }
        Json(json!({
            "weather": [{"description": "clear sky"}],
            "main": {"temp": 21.5, "pressure": 1018, "humidity": 40},
            "visibility": 10000,
            "wind": {"speed": 2.0, "deg": 90},
            "clouds": {"all": 0},
            "dt": 1714557600
        }))
        .into_response()
    }

    async fn historical(
        State(fake): State<Arc<FakeProvider>>,
        Query(query): Query<HashMap<String, String>>,
    ) -> Response {
        let dt = query.get("dt").cloned().unwrap_or_default();
        if let Some(failure) = fake.scripted(query) {
            return failure;
        }
        if fake.historical_empty {
            return Json(json!({"data": []})).into_response();
        }
        let dt: i64 = dt.parse().unwrap_or(0);
        Json(json!({"data": [{
            "dt": dt, "temp": 11.0, "pressure": 1009, "humidity": 80,
            "clouds": 90, "wind_speed": 5.0, "wind_deg": 300,
            "weather": [{"description": "overcast clouds"}]
        }]}))
        .into_response()
    }

    async fn spawn(fake: Arc<FakeProvider>) -> String {
        let app = Router::new()
            .route("/2.5/weather", get(current))
            .route("/3.0/onecall/timemachine", get(historical))
            .with_state(fake);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn client_for(
        fake: Arc<FakeProvider>,
        ttl: Duration,
    ) -> (OpenWeatherClient, Arc<ResponseCache<WeatherSample>>) {
        let base_url = spawn(fake).await;
        let config = ClientConfig::new(
            "test-key",
            Location {
                name: "Warsaw".into(),
                latitude: 52.2297,
                longitude: 21.0122,
            },
        )
        .unwrap()
        .with_base_url(&base_url)
        .unwrap()
        .with_timeout(Duration::from_secs(2))
        .with_retry(RetryPolicy::new(3, Duration::from_millis(1)));
        let cache = Arc::new(ResponseCache::new(ttl));
        let client = OpenWeatherClient::new(config, cache.clone()).unwrap();
        (client, cache)
    }

    #[tokio::test]
    async fn test_current_weather_sends_location_and_key() {
        let fake = Arc::new(FakeProvider::default());
        let (client, _) = client_for(fake.clone(), Duration::from_secs(60)).await;

        let sample = client.current_weather().await.unwrap();
        assert_eq!(sample.temperature, 21.5);
        assert_eq!(sample.timestamp.timestamp_millis(), 1_714_557_600_000);
        assert_eq!(sample.rain_amount, 0.0);

        let query = fake.last_query.lock().unwrap().clone();
        assert_eq!(query["appid"], "test-key");
        assert_eq!(query["lat"], "52.2297");
        assert_eq!(query["lon"], "21.0122");
        assert_eq!(query["units"], "metric");
    }

    #[tokio::test]
    async fn test_second_call_within_ttl_is_cached() {
        let fake = Arc::new(FakeProvider::default());
        let (client, _) = client_for(fake.clone(), Duration::from_secs(60)).await;

        let first = client.current_weather().await.unwrap();
        let second = client.current_weather().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(fake.calls(), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_refetched() {
        let fake = Arc::new(FakeProvider::default());
        let (client, _) = client_for(fake.clone(), Duration::from_millis(30)).await;

        client.current_weather().await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        client.current_weather().await.unwrap();

        assert_eq!(fake.calls(), 2);
    }

    #[tokio::test]
    async fn test_injected_cache_is_shared() {
        let fake = Arc::new(FakeProvider::default());
        let (client, cache) = client_for(fake.clone(), Duration::from_secs(60)).await;

        client.current_weather().await.unwrap();
        assert_eq!(cache.len().await, 1);

        client.clear_cache().await;
        client.current_weather().await.unwrap();
        assert_eq!(fake.calls(), 2);
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let fake = Arc::new(FakeProvider::failing_with(&[StatusCode::INTERNAL_SERVER_ERROR]));
        let (client, _) = client_for(fake.clone(), Duration::from_secs(60)).await;

        let sample = client.current_weather().await.unwrap();
        assert_eq!(sample.weather_condition, "clear sky");
        assert_eq!(fake.calls(), 2);
    }

    #[tokio::test]
    async fn test_persistent_server_error_exhausts_attempts() {
        let fake = Arc::new(FakeProvider::failing_with(&[
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::SERVICE_UNAVAILABLE,
        ]));
        let (client, cache) = client_for(fake.clone(), Duration::from_secs(60)).await;

        let err = client.current_weather().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);
        assert_eq!(fake.calls(), 3);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_client_error_fails_fast() {
        let fake = Arc::new(FakeProvider::failing_with(&[StatusCode::UNAUTHORIZED]));
        let (client, _) = client_for(fake.clone(), Duration::from_secs(60)).await;

        let err = client.current_weather().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(err.to_string(), "Provider responded 401: scripted failure");
        assert_eq!(fake.calls(), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_fails_fast() {
        let fake = Arc::new(FakeProvider::failing_with(&[StatusCode::TOO_MANY_REQUESTS]));
        let (client, _) = client_for(fake.clone(), Duration::from_secs(60)).await;

        let err = client.current_weather().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert_eq!(fake.calls(), 1);
    }

    #[tokio::test]
    async fn test_historical_weather_sends_timestamp() {
        let fake = Arc::new(FakeProvider::default());
        let (client, _) = client_for(fake.clone(), Duration::from_secs(60)).await;
        let date = Utc.with_ymd_and_hms(2024, 4, 30, 12, 0, 0).unwrap();

        let sample = client.historical_weather(date).await.unwrap();
        assert_eq!(sample.timestamp, date);
        assert_eq!(sample.weather_condition, "overcast clouds");
        assert_eq!(fake.last_query.lock().unwrap()["dt"], date.timestamp().to_string());

        client.historical_weather(date).await.unwrap();
        client
            .historical_weather(date - chrono::Duration::days(1))
            .await
            .unwrap();
        assert_eq!(fake.calls(), 2);
    }

    #[tokio::test]
    async fn test_historical_without_data_is_not_retried() {
        let fake = Arc::new(FakeProvider {
            historical_empty: true,
            ..Default::default()
        });
        let (client, cache) = client_for(fake.clone(), Duration::from_secs(60)).await;
        let date = Utc.with_ymd_and_hms(2024, 4, 30, 12, 0, 0).unwrap();

        let err = client.historical_weather(date).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoData);
        assert_eq!(fake.calls(), 1);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_historical_unauthorized_means_plan_required() {
        let fake = Arc::new(FakeProvider::failing_with(&[StatusCode::UNAUTHORIZED]));
        let (client, _) = client_for(fake.clone(), Duration::from_secs(60)).await;

        let err = client.historical_weather(Utc::now()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PlanRequired);
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_transient() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let location = Location {
            name: "Nowhere".into(),
            latitude: 0.0,
            longitude: 0.0,
        };
        let config = ClientConfig::new("test-key", location)
            .unwrap()
            .with_base_url(&format!("http://{addr}/"))
            .unwrap()
            .with_retry(RetryPolicy::new(2, Duration::from_millis(1)));
        let client = OpenWeatherClient::new(config, Arc::new(ResponseCache::default())).unwrap();

        let err = client.current_weather().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);
    }

    #[test]
    fn test_empty_api_key_is_rejected() {
        let location = Location {
            name: "Warsaw".into(),
            latitude: 52.2297,
            longitude: 21.0122,
        };
        let config = ClientConfig::new("  ", location).unwrap();
        assert!(OpenWeatherClient::new(config, Arc::new(ResponseCache::default())).is_err());
    }
}
