//! Error types and HTTP response conversion.
//!
//! Every component returns [`GatewayError`]; only the HTTP boundary turns it
//! into a status code and a JSON `{"error": ...}` body.

use std::time::Duration;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Gateway error types with automatic HTTP status code mapping.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Invalid API key")]
    Unauthorized,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("SQL generation failed: {0}")]
    Generation(String),

    #[error("LLM provider returned {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("LLM provider timed out after {0:?}")]
    Timeout(Duration),

    /// The reason for a rejection is never disclosed.
    #[error("only read-only SELECT queries are permitted")]
    InvalidQuery,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Query execution error: {0}")]
    Execution(String),

    #[error("internal error: {0}")]
    InternalError(#[from] eyre::Error),
}

impl GatewayError {
    /// HTTP status for this error. Caller mistakes are 4xx, everything else 5xx.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
            GatewayError::BadRequest(_) | GatewayError::InvalidQuery => StatusCode::BAD_REQUEST,
            GatewayError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::Provider { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Generation(_)
            | GatewayError::Database(_)
            | GatewayError::Execution(_)
            | GatewayError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
