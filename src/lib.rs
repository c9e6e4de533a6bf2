//! # NL-SQL Gateway
//!
//! An HTTP gateway that turns natural-language questions into SQL through an
//! OpenAI-compatible LLM provider, checks that the SQL is a read-only
//! `SELECT`, caps its row count and runs it against Postgres.
//!
//! ## Quick Start
//!
//! ```no_run
//! #[tokio::main]
//! async fn main() -> eyre::Result<()> {
//!     nlsql_gateway::gateway::run().await
//! }
//! ```
//!
//! ## Configuration
//!
//! The gateway is configured via environment variables:
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `DATABASE_URL` | required | Postgres connection URL |
//! | `LLM_API_KEY` | required | Provider credential (`GROQ_API_KEY` also accepted) |
//! | `LLM_BASE_URL` | `https://api.groq.com/openai/v1` | OpenAI-compatible base URL |
//! | `LLM_MODEL` | `mixtral-8x7b-32768` | Model identifier |
//! | `LLM_TIMEOUT_MS` | `30000` | Provider call timeout |
//! | `GATEWAY_API_KEY` | unset | Required `X-API-Key` value; unset disables the check |
//! | `LISTEN_ADDR` | `0.0.0.0:8000` | HTTP server listen address |
//! | `REQUEST_TIMEOUT_MS` | `60000` | Request timeout in milliseconds |
//! | `DB_MAX_CONNECTIONS` | `10` | Pool size |
//! | `DB_QUERY_TIMEOUT_MS` | `30000` | Per-query timeout |
//! | `MAX_QPS` | unset | Global request rate cap |
//!
//! ## Endpoints
//!
//! - `POST /generate-sql`, `POST /chat`, `POST /query` - Answer a question
//! - `GET /`, `GET /health`, `GET /status` - Liveness check

pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod gateway;
pub mod prompt;
pub mod sql;

pub use config::Config;
pub use error::GatewayError;
pub use format::Format;

#[cfg(test)]
mod tests;
