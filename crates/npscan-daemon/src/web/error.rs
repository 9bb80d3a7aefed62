//! HTTP status mapping for daemon errors.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use crate::error::Error;

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: &'static str,
    pub message: String,
}

impl Error {
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match status {
            StatusCode::NOT_FOUND => ApiError {
                error: "not_found",
                message: self.to_string(),
            },
            StatusCode::UNAUTHORIZED => ApiError {
                error: "unauthorized",
                message: self.to_string(),
            },
            StatusCode::FORBIDDEN => ApiError {
                error: "forbidden",
                message: self.to_string(),
            },
            StatusCode::BAD_REQUEST => ApiError {
                error: "bad_request",
                message: self.to_string(),
            },
            _ => {
                error!(error = %self, "Request failed");
                ApiError {
                    error: "internal_error",
                    message: "internal server error".to_string(),
                }
            }
        };
        (status, Json(body)).into_response()
    }
}
