//! Weather provider client
//!
//! Fetches current and historical observations for a single fixed location
//! from OpenWeather, retrying transient failures and caching normalized
//! samples for a short time.

pub mod cache;
pub mod client;
pub mod provider;
pub mod retry;

pub use cache::*;
pub use client::*;
pub use retry::*;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use wxr_core::WeatherSample;

/// What went wrong, decided where the failure is detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Network failure, timeout or 5xx
    Transient,
    /// Rejected API key
    Unauthorized,
    /// The account's plan does not cover the endpoint
    PlanRequired,
    RateLimited,
    /// Any other 4xx
    Rejected,
    /// Provider answered with no observations
    NoData,
    /// Body could not be decoded
    InvalidResponse,
}

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Provider responded {status}: {message}")]
    Provider {
        kind: ErrorKind,
        status: u16,
        message: String,
    },

    #[error("No weather data available for {0}")]
    NoData(DateTime<Utc>),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl WeatherError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WeatherError::Request(_) => ErrorKind::Transient,
            WeatherError::Provider { kind, .. } => *kind,
            WeatherError::NoData(_) => ErrorKind::NoData,
            WeatherError::InvalidResponse(_) => ErrorKind::InvalidResponse,
            WeatherError::Config(_) => ErrorKind::Rejected,
        }
    }

    /// Client-side and data-absence failures are final
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Transient | ErrorKind::InvalidResponse
        )
    }
}

pub type WeatherResult<T> = Result<T, WeatherError>;

/// Source of normalized weather samples
#[async_trait::async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Provider identifier
    fn name(&self) -> &str;

    async fn current_weather(&self) -> WeatherResult<WeatherSample>;

    async fn historical_weather(&self, date: DateTime<Utc>) -> WeatherResult<WeatherSample>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        let transient = WeatherError::Provider {
            kind: ErrorKind::Transient,
            status: 503,
            message: "unavailable".into(),
        };
        assert!(transient.is_retryable());
        assert!(WeatherError::InvalidResponse("truncated".into()).is_retryable());

        let unauthorized = WeatherError::Provider {
            kind: ErrorKind::Unauthorized,
            status: 401,
            message: "Invalid API key".into(),
        };
        assert!(!unauthorized.is_retryable());
        assert!(!WeatherError::NoData(Utc::now()).is_retryable());
        assert_eq!(WeatherError::NoData(Utc::now()).kind(), ErrorKind::NoData);
    }
}
