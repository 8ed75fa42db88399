//! Error-to-HTTP response conversion.
//!
//! Implements `IntoResponse` for [`lc_core::Error`] so that route handlers
//! can return `Result<T, AppError>` and use `?` on core results.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
pub struct AppError {
    inner: lc_core::Error,
    request_id: Option<String>,
}

impl AppError {
    pub fn new(inner: lc_core::Error) -> Self {
        Self {
            inner,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, id: String) -> Self {
        self.request_id = Some(id);
        self
    }
}

impl From<lc_core::Error> for AppError {
    fn from(e: lc_core::Error) -> Self {
        Self::new(e)
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        Self::new(e.into())
    }
}

fn error_code(err: &lc_core::Error) -> &'static str {
    use lc_core::Error;
    match err {
        Error::NotFound { .. } => "not_found",
        Error::Forbidden(_) => "forbidden",
        Error::Validation(_) => "validation_error",
        Error::Io { .. } => "io_error",
        Error::Tool { .. } => "tool_error",
        Error::Probe(_) => "probe_error",
        Error::Selection(_) => "selection_error",
        Error::ConversionTimeout { .. } => "conversion_timeout",
        Error::Conversion { .. } => "conversion_error",
        Error::Cancelled => "cancelled",
        Error::Internal(_) => "internal_error",
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.inner.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                error = %self.inner,
                "Server error in API handler"
            );
        }

        let body = json!({
            "error": self.inner.to_string(),
            "code": error_code(&self.inner),
            "request_id": self.request_id,
        });

        (status, axum::Json(body)).into_response()
    }
}
