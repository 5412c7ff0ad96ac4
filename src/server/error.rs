//! Error-to-HTTP response conversion.

use abr_pack::PackError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Wrapper so handlers can return `Result<T, AppError>` for core errors.
#[derive(Debug)]
pub struct AppError(pub abr_core::Error);

impl From<abr_core::Error> for AppError {
    fn from(e: abr_core::Error) -> Self {
        Self(e)
    }
}

impl From<PackError> for AppError {
    fn from(e: PackError) -> Self {
        Self(e.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self.0, "Server error in handler");
        }

        let code = match &self.0 {
            abr_core::Error::NotFound { .. } => "not_found",
            abr_core::Error::Validation(_) => "validation_error",
            abr_core::Error::Config(_) => "config_error",
            abr_core::Error::Io { .. } => "io_error",
            abr_core::Error::Tool { .. } => "tool_error",
            abr_core::Error::Probe(_) => "probe_error",
            abr_core::Error::Internal(_) => "internal_error",
        };

        let body = json!({
            "error": self.0.to_string(),
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
