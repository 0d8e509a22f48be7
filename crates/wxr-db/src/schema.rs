//! Table layout and row types for the MySQL store
//!
//! `ensure_schema` is safe to run on every start: tables use
//! `CREATE TABLE IF NOT EXISTS` and duplicate index names are treated as
//! success.

use chrono::{NaiveDateTime, TimeZone, Utc};
use sqlx::mysql::MySqlDatabaseError;
use sqlx::FromRow;
use tracing::{debug, info, instrument, warn};
use wxr_core::{Location, SampleSource, WeatherReport, WeatherSample};

use crate::{DbClient, DbResult};

/// Table names
pub mod tables {
    pub const SAMPLES: &str = "weather_samples";
    pub const REPORTS: &str = "weather_reports";
    pub const CODES: &str = "one_time_codes";
}

/// MySQL error number for "Duplicate key name"
const ER_DUP_KEYNAME: u16 = 1061;

const CREATE_SAMPLES: &str = r#"
CREATE TABLE IF NOT EXISTS weather_samples (
    id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    observed_at DATETIME(3) NOT NULL,
    temperature DOUBLE NOT NULL,
    pressure DOUBLE NOT NULL,
    humidity DOUBLE NOT NULL,
    cloud_cover DOUBLE NOT NULL,
    wind_speed DOUBLE NOT NULL,
    wind_direction DOUBLE NOT NULL,
    visibility DOUBLE NULL,
    weather_condition VARCHAR(128) NOT NULL,
    rain_amount DOUBLE NOT NULL DEFAULT 0,
    provider VARCHAR(64) NOT NULL,
    location_name VARCHAR(128) NOT NULL,
    latitude DOUBLE NOT NULL,
    longitude DOUBLE NOT NULL,
    granularity VARCHAR(16) NOT NULL,
    received_at DATETIME(3) NOT NULL
)
"#;

const CREATE_REPORTS: &str = r#"
CREATE TABLE IF NOT EXISTS weather_reports (
    id CHAR(36) NOT NULL PRIMARY KEY,
    title VARCHAR(255) NOT NULL,
    start_time DATETIME(3) NOT NULL,
    end_time DATETIME(3) NOT NULL,
    avg_temperature DOUBLE NULL,
    avg_pressure DOUBLE NULL,
    avg_humidity DOUBLE NULL,
    avg_cloud_cover DOUBLE NULL,
    avg_wind_speed DOUBLE NULL,
    data_points_count BIGINT NOT NULL,
    user_id VARCHAR(64) NULL,
    created_at DATETIME(3) NOT NULL,
    updated_at DATETIME(3) NOT NULL
)
"#;

const CREATE_CODES: &str = r#"
CREATE TABLE IF NOT EXISTS one_time_codes (
    id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    email VARCHAR(255) NOT NULL,
    code VARCHAR(16) NOT NULL,
    created_at DATETIME(3) NOT NULL
)
"#;

const INDEXES: &[(&str, &str)] = &[
    (
        "idx_samples_observed_at",
        "CREATE INDEX idx_samples_observed_at ON weather_samples (observed_at)",
    ),
    (
        "idx_reports_time_range",
        "CREATE INDEX idx_reports_time_range ON weather_reports (start_time, end_time)",
    ),
    (
        "idx_reports_created_at",
        "CREATE INDEX idx_reports_created_at ON weather_reports (created_at DESC)",
    ),
    (
        "idx_reports_user_id",
        "CREATE INDEX idx_reports_user_id ON weather_reports (user_id)",
    ),
    (
        "idx_codes_created_at",
        "CREATE INDEX idx_codes_created_at ON one_time_codes (created_at)",
    ),
];

impl DbClient {
    /// Create tables and indexes if they are missing
    #[instrument(skip(self))]
    pub async fn ensure_schema(&self) -> DbResult<()> {
        for ddl in [CREATE_SAMPLES, CREATE_REPORTS, CREATE_CODES] {
            sqlx::query(ddl).execute(self.pool()).await?;
        }

        for (name, ddl) in INDEXES {
            match sqlx::query(ddl).execute(self.pool()).await {
                Ok(_) => info!(index = *name, "Created index"),
                Err(e) if is_duplicate_key_name(&e) => {
                    debug!(index = *name, "Index already exists")
                }
                Err(e) => warn!(index = *name, error = %e, "Index creation failed"),
            }
        }

        Ok(())
    }
}

fn is_duplicate_key_name(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db
            .try_downcast_ref::<MySqlDatabaseError>()
            .is_some_and(|e| e.number() == ER_DUP_KEYNAME),
        _ => false,
    }
}

/// `weather_samples` row
#[derive(Debug, Clone, FromRow)]
pub struct SampleRow {
    pub observed_at: NaiveDateTime,
    pub temperature: f64,
    pub pressure: f64,
    pub humidity: f64,
    pub cloud_cover: f64,
    pub wind_speed: f64,
    pub wind_direction: f64,
    pub visibility: Option<f64>,
    pub weather_condition: String,
    pub rain_amount: f64,
    pub provider: String,
    pub location_name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl From<SampleRow> for WeatherSample {
    fn from(row: SampleRow) -> Self {
        WeatherSample {
            timestamp: Utc.from_utc_datetime(&row.observed_at),
            temperature: row.temperature,
            pressure: row.pressure,
            humidity: row.humidity,
            cloud_cover: row.cloud_cover,
            wind_speed: row.wind_speed,
            wind_direction: row.wind_direction,
            visibility: row.visibility,
            weather_condition: row.weather_condition,
            rain_amount: row.rain_amount,
            source: SampleSource {
                provider: row.provider,
                location: Location {
                    name: row.location_name,
                    latitude: row.latitude,
                    longitude: row.longitude,
                },
            },
        }
    }
}

/// `weather_reports` row
#[derive(Debug, Clone, FromRow)]
pub struct ReportRow {
    pub id: String,
    pub title: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub avg_temperature: Option<f64>,
    pub avg_pressure: Option<f64>,
    pub avg_humidity: Option<f64>,
    pub avg_cloud_cover: Option<f64>,
    pub avg_wind_speed: Option<f64>,
    pub data_points_count: i64,
    pub user_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<ReportRow> for WeatherReport {
    fn from(row: ReportRow) -> Self {
        WeatherReport {
            id: row.id,
            title: row.title,
            start_time: Utc.from_utc_datetime(&row.start_time),
            end_time: Utc.from_utc_datetime(&row.end_time),
            avg_temperature: row.avg_temperature,
            avg_pressure: row.avg_pressure,
            avg_humidity: row.avg_humidity,
            avg_cloud_cover: row.avg_cloud_cover,
            avg_wind_speed: row.avg_wind_speed,
            data_points_count: u64::try_from(row.data_points_count).unwrap_or_default(),
            user_id: row.user_id,
            created_at: Utc.from_utc_datetime(&row.created_at),
            updated_at: Utc.from_utc_datetime(&row.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names() {
        assert_eq!(tables::SAMPLES, "weather_samples");
        assert_eq!(tables::REPORTS, "weather_reports");
        assert_eq!(tables::CODES, "one_time_codes");
    }

    #[test]
    fn test_every_index_targets_known_table() {
        for (name, ddl) in INDEXES {
            assert!(ddl.contains(name));
            assert!([tables::SAMPLES, tables::REPORTS, tables::CODES]
                .iter()
                .any(|table| ddl.contains(&format!("ON {table} "))));
        }
    }

    #[test]
    fn test_report_row_conversion() {
        let ts = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        let row = ReportRow {
            id: "abc".into(),
            title: "t".into(),
            start_time: ts,
            end_time: ts,
            avg_temperature: Some(1.5),
            avg_pressure: None,
            avg_humidity: None,
            avg_cloud_cover: None,
            avg_wind_speed: None,
            data_points_count: 7,
            user_id: None,
            created_at: ts,
            updated_at: ts,
        };

        let report = WeatherReport::from(row);
        assert_eq!(report.data_points_count, 7);
        assert_eq!(report.start_time, Utc.from_utc_datetime(&ts));
        assert_eq!(report.avg_temperature, Some(1.5));
    }
}
