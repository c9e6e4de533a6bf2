//! LLM provider client for SQL generation.
//!
//! Speaks the OpenAI-compatible chat-completions protocol. One request per
//! question; nothing is retried.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::GatewayError;
use crate::prompt::{SYSTEM_INSTRUCTION, build_prompt};
use crate::sql::{Extracted, MAX_ROWS, extract};

/// Turns a question into a query candidate and an explanation.
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    async fn generate(&self, question: &str) -> Result<Extracted, GatewayError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client.
///
/// The client is cheaply cloneable and safe to share across tasks. The
/// configured timeout covers the whole exchange, body included.
#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    config: Arc<LlmConfig>,
    endpoint: String,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> eyre::Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        let endpoint = format!(
            "{}/chat/completions",
            config.base_url.trim_end_matches('/')
        );

        Ok(Self {
            http,
            config: Arc::new(config.clone()),
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Sends `prompt` and returns the first choice's message content.
    pub async fn complete(&self, prompt: &str) -> Result<String, GatewayError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_INSTRUCTION,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };
        let body = sonic_rs::to_vec(&request).map_err(eyre::Report::new)?;

        let response = self
            .http
            .post(&self.endpoint)
            .header(AUTHORIZATION, format!("Bearer {}", self.config.api_key))
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(GatewayError::Provider {
                status: status.as_u16(),
                body: text,
            });
        }

        let completion: ChatCompletion = sonic_rs::from_str(&text).map_err(|e| {
            GatewayError::Generation(format!("malformed provider response: {e}"))
        })?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| GatewayError::Generation("provider response had no content".into()))
    }

    fn transport_error(&self, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout(self.config.timeout)
        } else {
            GatewayError::Generation(format!("provider request failed: {err}"))
        }
    }
}

#[async_trait]
impl SqlGenerator for LlmClient {
    async fn generate(&self, question: &str) -> Result<Extracted, GatewayError> {
        let content = self.complete(&build_prompt(question, MAX_ROWS)).await?;
        debug!(chars = content.len(), "received completion");

        let extracted = extract(&content).map_err(|e| GatewayError::Generation(e.to_string()))?;
        if extracted.sql.is_blank() {
            return Err(GatewayError::Generation(
                "provider returned an empty query".into(),
            ));
        }

        Ok(extracted)
    }
}
