use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use stream_worker::StreamError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReceiptError {
    #[error("invalid media type")]
    UnsupportedMediaType,

    #[error("invalid json: {0}")]
    InvalidJson(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("receipt was not enqueued: {0}")]
    Unavailable(#[from] StreamError),
}

pub type ReceiptResult<T> = Result<T, ReceiptError>;

/// Error body returned by the intake endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: i32,
    pub error: &'static str,
    pub message: String,
}

impl ReceiptError {
    pub fn status(&self) -> StatusCode {
        match self {
            ReceiptError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ReceiptError::InvalidJson(_) | ReceiptError::Validation(_) => StatusCode::BAD_REQUEST,
            ReceiptError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn body(&self) -> ErrorResponse {
        let (code, error, message) = match self {
            ReceiptError::UnsupportedMediaType => (1010, "UNSUPPORTED_MEDIA_TYPE", self.to_string()),
            ReceiptError::InvalidJson(_) => (1003, "INVALID_JSON", "invalid json".to_string()),
            ReceiptError::Validation(details) => (1001, "VALIDATION_ERROR", details.clone()),
            // Broker details stay in the logs.
            ReceiptError::Unavailable(_) => (1011, "SERVICE_UNAVAILABLE", "service unavailable, retry later".to_string()),
        };
        ErrorResponse { code, error, message }
    }
}

impl IntoResponse for ReceiptError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(self.body());
        match self {
            ReceiptError::UnsupportedMediaType => {
                (status, [(header::ACCEPT, "application/json")], body).into_response()
            }
            _ => (status, body).into_response(),
        }
    }
}
