//! Gateway configuration loaded from environment variables.
//!
//! Configuration is read exactly once at startup and passed down as a value.
//! [`Config::from_lookup`] takes any key/value source, which is how tests
//! build configurations without touching the process environment.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use eyre::{WrapErr, eyre};

const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";
const DEFAULT_LLM_MODEL: &str = "mixtral-8x7b-32768";

/// LLM provider configuration.
///
/// # Environment Variables
///
/// - `LLM_API_KEY` (or `GROQ_API_KEY`) - bearer credential, required
/// - `LLM_BASE_URL` - provider base URL (default: `https://api.groq.com/openai/v1`)
/// - `LLM_MODEL` - model identifier (default: `mixtral-8x7b-32768`)
/// - `LLM_TIMEOUT_MS` - provider call timeout (default: `30000`)
/// - `LLM_TEMPERATURE` - sampling temperature (default: `0.1`)
/// - `LLM_MAX_TOKENS` - completion token cap (default: `2000`)
#[derive(Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl LlmConfig {
    /// Provider defaults with the given credential.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_LLM_BASE_URL.into(),
            model: DEFAULT_LLM_MODEL.into(),
            timeout: Duration::from_millis(30_000),
            temperature: 0.1,
            max_tokens: 2000,
        }
    }

    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> eyre::Result<Self> {
        let api_key = non_empty(lookup, "LLM_API_KEY")
            .or_else(|| non_empty(lookup, "GROQ_API_KEY"))
            .ok_or_else(|| eyre!("LLM_API_KEY (or GROQ_API_KEY) environment variable is required"))?;
        let defaults = Self::new(api_key);

        Ok(Self {
            base_url: non_empty(lookup, "LLM_BASE_URL").unwrap_or(defaults.base_url.clone()),
            model: non_empty(lookup, "LLM_MODEL").unwrap_or(defaults.model.clone()),
            timeout: Duration::from_millis(parsed(lookup, "LLM_TIMEOUT_MS").unwrap_or(30_000)),
            temperature: parsed(lookup, "LLM_TEMPERATURE").unwrap_or(defaults.temperature),
            max_tokens: parsed(lookup, "LLM_MAX_TOKENS").unwrap_or(defaults.max_tokens),
            ..defaults
        })
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// Database connection configuration.
///
/// # Environment Variables
///
/// - `DATABASE_URL` - Postgres connection string, required
/// - `DB_MAX_CONNECTIONS` - pool size (default: `10`)
/// - `DB_ACQUIRE_TIMEOUT_MS` - connection acquisition timeout (default: `5000`)
/// - `DB_QUERY_TIMEOUT_MS` - per-query execution timeout (default: `30000`)
#[derive(Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub query_timeout: Duration,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            acquire_timeout: Duration::from_millis(5_000),
            query_timeout: Duration::from_millis(30_000),
        }
    }

    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> eyre::Result<Self> {
        let url = non_empty(lookup, "DATABASE_URL")
            .ok_or_else(|| eyre!("DATABASE_URL environment variable is required"))?;

        Ok(Self {
            max_connections: parsed(lookup, "DB_MAX_CONNECTIONS").unwrap_or(10),
            acquire_timeout: Duration::from_millis(
                parsed(lookup, "DB_ACQUIRE_TIMEOUT_MS").unwrap_or(5_000),
            ),
            query_timeout: Duration::from_millis(
                parsed(lookup, "DB_QUERY_TIMEOUT_MS").unwrap_or(30_000),
            ),
            ..Self::new(url)
        })
    }
}

impl fmt::Debug for DatabaseConfig {
    // The URL usually embeds a password.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .field("query_timeout", &self.query_timeout)
            .finish()
    }
}

/// Server configuration.
///
/// # Environment Variables
///
/// - `LISTEN_ADDR` - HTTP server bind address (default: `0.0.0.0:8000`)
/// - `REQUEST_TIMEOUT_MS` - HTTP request timeout in milliseconds (default: `60000`)
/// - `GATEWAY_API_KEY` (or `VANNA_API_KEY`) - caller key; unset disables the check
/// - `MAX_QPS` - optional global request rate limit
///
/// See [`LlmConfig`] and [`DatabaseConfig`] for the collaborator settings.
#[derive(Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub request_timeout_ms: u64,
    pub api_key: Option<String>,
    pub max_qps: Option<u32>,
    pub llm: LlmConfig,
    pub database: DatabaseConfig,
}

impl Config {
    /// Development defaults around the two required settings.
    pub fn new(database_url: impl Into<String>, llm_api_key: impl Into<String>) -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            request_timeout_ms: 60_000,
            api_key: None,
            max_qps: None,
            llm: LlmConfig::new(llm_api_key),
            database: DatabaseConfig::new(database_url),
        }
    }

    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Fails when a required variable is missing or `LISTEN_ADDR` does not
    /// parse as a socket address.
    pub fn from_env() -> eyre::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key/value source.
    ///
    /// Unparseable optional numbers fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> eyre::Result<Self> {
        let database = DatabaseConfig::from_lookup(&lookup)?;
        let llm = LlmConfig::from_lookup(&lookup)?;

        let listen_addr = match non_empty(&lookup, "LISTEN_ADDR") {
            Some(addr) => addr
                .parse()
                .wrap_err_with(|| format!("Invalid LISTEN_ADDR: {addr}"))?,
            None => SocketAddr::from(([0, 0, 0, 0], 8000)),
        };

        Ok(Self {
            listen_addr,
            request_timeout_ms: parsed(&lookup, "REQUEST_TIMEOUT_MS").unwrap_or(60_000),
            api_key: non_empty(&lookup, "GATEWAY_API_KEY")
                .or_else(|| non_empty(&lookup, "VANNA_API_KEY")),
            max_qps: parsed(&lookup, "MAX_QPS").filter(|qps| *qps > 0),
            llm,
            database,
        })
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|value| !value.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|value| value.trim().parse().ok())
}
