//! Core data types for weather samples, rollups and reports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Granularity tag written with every stored sample
pub const SAMPLE_GRANULARITY: &str = "minute";

/// Fixed geographic point the samples are collected for
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Where a sample came from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SampleSource {
    pub provider: String,
    pub location: Location,
}

/// One normalized weather observation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSample {
    /// Observation time reported by the provider (not receipt time)
    pub timestamp: DateTime<Utc>,

    /// Degrees Celsius
    pub temperature: f64,

    /// hPa
    pub pressure: f64,

    /// Percent
    pub humidity: f64,

    /// Percent
    pub cloud_cover: f64,

    /// m/s
    pub wind_speed: f64,

    /// Degrees
    pub wind_direction: f64,

    /// Meters; some provider responses omit it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f64>,

    pub weather_condition: String,

    /// Millimeters over the last hour
    #[serde(default)]
    pub rain_amount: f64,

    pub source: SampleSource,
}

/// Calendar granularity used to bucket samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    Minute,
    Hour,
    Day,
    Week,
    Month,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Minute => "minute",
            Interval::Hour => "hour",
            Interval::Day => "day",
            Interval::Week => "week",
            Interval::Month => "month",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown interval: {0}")]
pub struct UnknownInterval(pub String);

impl FromStr for Interval {
    type Err = UnknownInterval;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "minute" => Ok(Interval::Minute),
            "hour" => Ok(Interval::Hour),
            "day" => Ok(Interval::Day),
            "week" => Ok(Interval::Week),
            "month" => Ok(Interval::Month),
            _ => Err(UnknownInterval(s.to_string())),
        }
    }
}

/// Summary of the samples falling into one calendar bucket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedBucket {
    /// Time of the first sample in the bucket
    pub timestamp: DateTime<Utc>,
    pub avg_temperature: f64,
    pub min_temperature: f64,
    pub max_temperature: f64,
    pub avg_pressure: f64,
    pub avg_humidity: f64,
    pub avg_cloud_cover: f64,
    pub avg_wind_speed: f64,
    pub count: u64,
    pub interval: Interval,
}

/// Flat summary over a whole time range
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AggregateSummary {
    pub avg_temperature: f64,
    pub min_temperature: f64,
    pub max_temperature: f64,
    pub avg_pressure: f64,
    pub avg_humidity: f64,
    pub avg_cloud_cover: f64,
    pub avg_wind_speed: f64,
    pub records_count: u64,
}

impl AggregateSummary {
    pub fn is_empty(&self) -> bool {
        self.records_count == 0
    }
}

/// A saved, named aggregation over a fixed time range
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeatherReport {
    pub id: String,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub avg_temperature: Option<f64>,
    pub avg_pressure: Option<f64>,
    pub avg_humidity: Option<f64>,
    pub avg_cloud_cover: Option<f64>,
    pub avg_wind_speed: Option<f64>,
    pub data_points_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Absolute per-metric differences between two reports.
///
/// A metric is `None` when either report lacks a value for it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricDeviations {
    pub temperature: Option<f64>,
    pub pressure: Option<f64>,
    pub humidity: Option<f64>,
    pub cloud_cover: Option<f64>,
    pub wind_speed: Option<f64>,
}

impl MetricDeviations {
    pub fn between(a: &WeatherReport, b: &WeatherReport) -> Self {
        fn deviation(a: Option<f64>, b: Option<f64>) -> Option<f64> {
            Some((b? - a?).abs())
        }

        Self {
            temperature: deviation(a.avg_temperature, b.avg_temperature),
            pressure: deviation(a.avg_pressure, b.avg_pressure),
            humidity: deviation(a.avg_humidity, b.avg_humidity),
            cloud_cover: deviation(a.avg_cloud_cover, b.avg_cloud_cover),
            wind_speed: deviation(a.avg_wind_speed, b.avg_wind_speed),
        }
    }
}

/// Two reports side by side with their deviations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportComparison {
    pub report_a: WeatherReport,
    pub report_b: WeatherReport,
    pub deviations: MetricDeviations,
}

/// Short-lived one-time passcode record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OneTimeCode {
    pub email: String,
    pub code: String,
    pub created_at: DateTime<Utc>,
}
