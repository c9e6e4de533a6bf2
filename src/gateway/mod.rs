//! Gateway server initialization and lifecycle management.
//!
use crate::{
    client::LlmClient,
    config::Config,
    db::PgExecutor,
    format::Format,
    gateway::{routes::create_router, service::GatewayService, state::AppState},
};
use axum::{Router, http::StatusCode};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

pub mod routes;
pub mod service;
pub mod state;

/// Builds the HTTP application with its middleware stack.
pub fn app(state: AppState, config: &Config) -> Router {
    create_router()
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_millis(config.request_timeout_ms),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Starts the gateway server.
///
/// This function:
/// 1. Initializes tracing with environment-based log filtering
/// 2. Loads configuration from environment variables
/// 3. Builds the LLM client and the lazily connected database pool
/// 4. Configures middleware (timeout, request tracing, CORS, rate limiting)
/// 5. Binds to the configured address and serves HTTP requests
///
/// # Errors
///
/// Returns an error if:
/// - A required environment variable is missing or malformed
/// - The LLM client or the database pool cannot be constructed
/// - The TCP listener cannot bind to the configured address
/// - The server encounters a fatal error while running
pub async fn run() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("nlsql_gateway=info".parse()?),
        )
        .init();

    let config = Config::from_env()?;

    let llm = LlmClient::new(&config.llm)?;
    info!(
        "Using LLM provider at {} (model={}, timeout={:?})",
        llm.endpoint(),
        config.llm.model,
        config.llm.timeout
    );

    let executor = PgExecutor::connect_lazy(&config.database)?;
    info!(
        "Database pool ready (max_connections={}, query_timeout={:?})",
        config.database.max_connections, config.database.query_timeout
    );

    let service = GatewayService::new(Arc::new(llm), Arc::new(executor))
        .with_api_key(config.api_key.clone());
    if !service.requires_api_key() {
        info!("GATEWAY_API_KEY not set, API key check disabled");
    }

    let mut state = AppState::new(service).with_format(Format::Json);
    if let Some(max_qps) = config.max_qps {
        state = state.with_rate_limiter(max_qps);
        info!("Rate limiting to {} requests/s", max_qps);
    }

    let router = app(state, &config);

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!("Listening on {}", config.listen_addr);

    axum::serve(listener, router).await?;
    Ok(())
}
