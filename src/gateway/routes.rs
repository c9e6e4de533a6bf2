//! HTTP route handlers.
//!
//! This module defines the HTTP API surface of the gateway: question
//! endpoints that run the SQL pipeline and liveness checks.

use std::str::FromStr;

use crate::{error::GatewayError, format::Format, gateway::state::AppState};
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use bytes::Bytes;
use governor::RateLimiter;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use serde::{Deserialize, Serialize};

pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Header carrying the caller's key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Creates the router with all gateway endpoints.
///
/// The three question routes are aliases kept for existing clients.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/generate-sql", post(handle_ask))
        .route("/chat", post(handle_ask))
        .route("/query", post(handle_ask))
        .route("/", get(handle_health))
        .route("/health", get(handle_health))
        .route("/status", get(handle_health))
}

/// Body of a question request. `query` is accepted as an alias for `question`.
#[derive(Debug, Default, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
}

impl AskRequest {
    /// `question` wins when it is non-empty, otherwise `query`.
    pub fn question(&self) -> Option<&str> {
        fn non_empty(field: &Option<String>) -> Option<&str> {
            field.as_deref().filter(|q| !q.trim().is_empty())
        }
        non_empty(&self.question).or_else(|| non_empty(&self.query))
    }
}

/// Handles `POST /generate-sql`, `/chat` and `/query`.
pub async fn handle_ask(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, GatewayError> {
    if let Some(rate_limiter) = &state.rate_limiter {
        if rate_limiter.check().is_err() {
            return Err(GatewayError::RateLimited);
        }
    }

    let presented = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    state.service.authorize(presented)?;

    let format = match headers.get(header::CONTENT_TYPE) {
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|ct| Format::from_str(ct).ok())
            .ok_or_else(|| GatewayError::BadRequest("unsupported content type".into()))?,
        None => state.format,
    };

    let request: AskRequest = format.deserialize(&body)?;
    let question = request
        .question()
        .ok_or_else(|| GatewayError::BadRequest("missing question or query field".into()))?;

    let response = state.service.answer(question).await?;
    let body = state.format.serialize(&response)?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, state.format.content_type())],
        body,
    ))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
}

/// Handles `GET /`, `/health` and `/status`. Does not touch the database.
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        message: "nlsql gateway running",
    })
}
