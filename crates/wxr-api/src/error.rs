//! Mapping of service failures to HTTP responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use wxr_client::{ErrorKind, WeatherError};
use wxr_core::StoreError;
use wxr_reports::ReportError;

const TRY_AGAIN: &str = "Service temporarily unavailable, please try again later";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Weather(#[from] WeatherError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    BadRequest(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Status, machine-readable kind and whether the message is safe to show
    fn classify(&self) -> (StatusCode, &'static str, bool) {
        match self {
            ApiError::Weather(e) => match e.kind() {
                ErrorKind::NoData => (StatusCode::NOT_FOUND, "noData", true),
                ErrorKind::PlanRequired => (StatusCode::PAYMENT_REQUIRED, "planRequired", true),
                ErrorKind::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "rateLimited", true),
                ErrorKind::Unauthorized | ErrorKind::Rejected => {
                    (StatusCode::BAD_GATEWAY, "upstreamRejected", true)
                }
                ErrorKind::Transient | ErrorKind::InvalidResponse => {
                    (StatusCode::SERVICE_UNAVAILABLE, "unavailable", false)
                }
            },
            ApiError::Report(e) => match e {
                ReportError::NoData { .. } => (StatusCode::NOT_FOUND, "noData", true),
                ReportError::NotFound(_) => (StatusCode::NOT_FOUND, "notFound", true),
                ReportError::InvalidRange { .. }
                | ReportError::WindowOutOfRange(_)
                | ReportError::InvalidOrder(_) => {
                    (StatusCode::BAD_REQUEST, "invalidInput", true)
                }
                ReportError::Store(_) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable", false),
            },
            ApiError::Store(_) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable", false),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "invalidInput", true),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, expose) = self.classify();
        let message = if expose {
            self.to_string()
        } else {
            tracing::error!(error = %self, kind, "Request failed");
            TRY_AGAIN.to_string()
        };
        (status, Json(json!({ "error": message, "kind": kind }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kinds_map_to_statuses() {
        let cases = [
            (ErrorKind::PlanRequired, StatusCode::PAYMENT_REQUIRED),
            (ErrorKind::RateLimited, StatusCode::TOO_MANY_REQUESTS),
            (ErrorKind::Unauthorized, StatusCode::BAD_GATEWAY),
            (ErrorKind::Rejected, StatusCode::BAD_GATEWAY),
            (ErrorKind::Transient, StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (kind, status) in cases {
            let err = ApiError::from(WeatherError::Provider {
                kind,
                status: 400,
                message: "x".into(),
            });
            assert_eq!(err.classify().0, status, "{kind:?}");
        }
    }

    #[test]
    fn store_failures_hide_details() {
        let err = ApiError::from(StoreError::Unavailable("connection refused".into()));
        let (status, kind, expose) = err.classify();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(kind, "unavailable");
        assert!(!expose);
    }
}
