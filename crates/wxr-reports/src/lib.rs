//! Aggregation and saved reports
//!
//! Summarizes stored samples over time ranges and manages the
//! [`WeatherReport`](wxr_core::WeatherReport) entities built from them.

pub mod engine;
pub mod service;

pub use engine::*;
pub use service::*;

use chrono::{DateTime, Utc};
use thiserror::Error;
use wxr_core::{InvalidOrder, StoreError};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("No weather data between {start} and {end}")]
    NoData {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Report not found: {0}")]
    NotFound(String),

    #[error("Invalid time range: {start} is after {end}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Statistics window of {0} days is out of range")]
    WindowOutOfRange(u32),

    #[error(transparent)]
    InvalidOrder(#[from] InvalidOrder),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ReportError {
    /// Expected, recoverable absence of data
    pub fn is_data_absence(&self) -> bool {
        matches!(self, ReportError::NoData { .. } | ReportError::NotFound(_))
    }
}

pub type ReportResult<T> = Result<T, ReportError>;
