//! OpenWeather response shapes and normalization into [`WeatherSample`]

use crate::{ErrorKind, WeatherError, WeatherResult};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use wxr_core::{Location, SampleSource, UnitSystem, WeatherSample};

/// Provider identifier recorded on every sample
pub const PROVIDER_NAME: &str = "openweathermap";

/// Path of the current-conditions endpoint, relative to the base URL
pub const CURRENT_PATH: &str = "2.5/weather";

/// Path of the historical endpoint (One Call 3.0, separate subscription)
pub const HISTORICAL_PATH: &str = "3.0/onecall/timemachine";

#[derive(Debug, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Precipitation {
    #[serde(rename = "1h", default)]
    pub one_hour: f64,
}

#[derive(Debug, Deserialize)]
pub struct MainBlock {
    pub temp: f64,
    pub pressure: f64,
    pub humidity: f64,
}

#[derive(Debug, Deserialize)]
pub struct WindBlock {
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub deg: f64,
}

#[derive(Debug, Deserialize)]
pub struct CloudBlock {
    #[serde(default)]
    pub all: f64,
}

/// `GET 2.5/weather`
#[derive(Debug, Deserialize)]
pub struct CurrentResponse {
    pub dt: i64,
    pub main: MainBlock,
    pub wind: WindBlock,
    pub clouds: CloudBlock,
    #[serde(default)]
    pub visibility: Option<f64>,
    #[serde(default)]
    pub weather: Vec<Condition>,
    #[serde(default)]
    pub rain: Option<Precipitation>,
}

/// One entry of the timemachine `data` array
#[derive(Debug, Deserialize)]
pub struct HistoricalPoint {
    pub dt: i64,
    pub temp: f64,
    pub pressure: f64,
    pub humidity: f64,
    #[serde(default)]
    pub clouds: f64,
    #[serde(default)]
    pub wind_speed: f64,
    #[serde(default)]
    pub wind_deg: f64,
    #[serde(default)]
    pub visibility: Option<f64>,
    #[serde(default)]
    pub weather: Vec<Condition>,
    #[serde(default)]
    pub rain: Option<Precipitation>,
}

/// `GET 3.0/onecall/timemachine`
#[derive(Debug, Deserialize)]
pub struct HistoricalResponse {
    #[serde(default)]
    pub data: Vec<HistoricalPoint>,
}

/// Error body, e.g. `{"cod":401,"message":"Invalid API key"}`
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

/// Normalization context shared by both endpoints
#[derive(Debug, Clone)]
pub struct Normalizer {
    pub units: UnitSystem,
    pub location: Location,
}

impl Normalizer {
    pub fn new(units: UnitSystem, location: Location) -> Self {
        Self { units, location }
    }

    fn source(&self) -> SampleSource {
        SampleSource {
            provider: PROVIDER_NAME.to_string(),
            location: self.location.clone(),
        }
    }

    pub fn current(&self, body: CurrentResponse) -> WeatherResult<WeatherSample> {
        Ok(WeatherSample {
            timestamp: observed_at(body.dt)?,
            temperature: self.units.to_celsius(body.main.temp),
            pressure: body.main.pressure,
            humidity: body.main.humidity,
            cloud_cover: body.clouds.all,
            wind_speed: self.units.to_meters_per_second(body.wind.speed),
            wind_direction: body.wind.deg,
            visibility: body.visibility,
            weather_condition: describe(&body.weather),
            rain_amount: body.rain.map(|r| r.one_hour).unwrap_or(0.0),
            source: self.source(),
        })
    }

    /// Uses the first data point; an empty array means no data for `date`
    pub fn historical(
        &self,
        body: HistoricalResponse,
        date: DateTime<Utc>,
    ) -> WeatherResult<WeatherSample> {
        let point = body
            .data
            .into_iter()
            .next()
            .ok_or(WeatherError::NoData(date))?;

        Ok(WeatherSample {
            timestamp: observed_at(point.dt)?,
            temperature: self.units.to_celsius(point.temp),
            pressure: point.pressure,
            humidity: point.humidity,
            cloud_cover: point.clouds,
            wind_speed: self.units.to_meters_per_second(point.wind_speed),
            wind_direction: point.wind_deg,
            visibility: point.visibility,
            weather_condition: describe(&point.weather),
            rain_amount: point.rain.map(|r| r.one_hour).unwrap_or(0.0),
            source: self.source(),
        })
    }
}

fn observed_at(dt: i64) -> WeatherResult<DateTime<Utc>> {
    DateTime::from_timestamp(dt, 0)
        .ok_or_else(|| WeatherError::InvalidResponse(format!("timestamp out of range: {dt}")))
}

fn describe(conditions: &[Condition]) -> String {
    conditions
        .first()
        .map(|c| c.description.clone())
        .unwrap_or_default()
}

/// Classify a non-success status.
///
/// OpenWeather answers 401 both for bad keys and for endpoints outside the
/// account's plan, so `plan_gated` endpoints report 401 as [`ErrorKind::PlanRequired`].
pub fn classify_status(status: u16, plan_gated: bool) -> ErrorKind {
    match status {
        401 if plan_gated => ErrorKind::PlanRequired,
        401 => ErrorKind::Unauthorized,
        402 | 403 => ErrorKind::PlanRequired,
        429 => ErrorKind::RateLimited,
        400..=499 => ErrorKind::Rejected,
        500..=599 => ErrorKind::Transient,
        _ => ErrorKind::InvalidResponse,
    }
}

/// Build the error for a non-success response body
pub fn provider_error(status: u16, body: &str, plan_gated: bool) -> WeatherError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| body.trim().to_string());

    WeatherError::Provider {
        kind: classify_status(status, plan_gated),
        status,
        message,
    }
}
