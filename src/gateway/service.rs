//! Per-request orchestration.
//!
//! A request walks through
//! `Received → Authorized → SqlGenerated → Validated → Limited → Executed → Responded`
//! and can fail out of any stage before `Responded`. Failures are returned
//! as typed errors; nothing is retried and no partial result is returned.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

use crate::client::SqlGenerator;
use crate::db::{QueryExecutor, ResultSet};
use crate::error::GatewayError;
use crate::sql::{Extracted, MAX_ROWS};

/// Progress of a single request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Received,
    Authorized,
    SqlGenerated,
    Validated,
    Limited,
    Executed,
    Responded,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::Authorized => "authorized",
            Stage::SqlGenerated => "sql_generated",
            Stage::Validated => "validated",
            Stage::Limited => "limited",
            Stage::Executed => "executed",
            Stage::Responded => "responded",
        };
        f.write_str(name)
    }
}

/// Successful answer to a question.
#[derive(Clone, Debug, Serialize)]
pub struct GatewayResponse {
    /// The exact text that was executed, row cap included.
    pub sql: String,
    pub notes: String,
    pub rows: ResultSet,
}

/// Ties generation, validation, limiting and execution together.
///
/// Holds no per-request state, so one instance serves concurrent requests.
#[derive(Clone)]
pub struct GatewayService {
    generator: Arc<dyn SqlGenerator>,
    executor: Arc<dyn QueryExecutor>,
    api_key: Option<String>,
    max_rows: usize,
}

impl GatewayService {
    pub fn new(generator: Arc<dyn SqlGenerator>, executor: Arc<dyn QueryExecutor>) -> Self {
        Self {
            generator,
            executor,
            api_key: None,
            max_rows: MAX_ROWS,
        }
    }

    /// Requires callers to present `key`. `None` or an empty key disables the check.
    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key.filter(|k| !k.is_empty());
        self
    }

    pub fn requires_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Checks the caller-supplied key against the configured one.
    ///
    /// The comparison takes the same time wherever the first mismatch is.
    pub fn authorize(&self, presented: Option<&str>) -> Result<(), GatewayError> {
        match &self.api_key {
            Some(expected) if !key_matches(presented, expected) => {
                warn!(stage = %Stage::Received, "request rejected: bad API key");
                Err(GatewayError::Unauthorized)
            }
            _ => Ok(()),
        }
    }

    /// Runs the whole pipeline for one request.
    pub async fn handle(
        &self,
        presented_key: Option<&str>,
        question: &str,
    ) -> Result<GatewayResponse, GatewayError> {
        self.authorize(presented_key)?;
        self.answer(question).await
    }

    /// Runs the pipeline for a caller that has already been authorized.
    pub async fn answer(&self, question: &str) -> Result<GatewayResponse, GatewayError> {
        let mut stage = Stage::Authorized;
        let result = self.run(question, &mut stage).await;

        match &result {
            Ok(response) => info!(rows = response.rows.len(), "request completed"),
            Err(err) if err.status_code().is_client_error() => {
                warn!(stage = %stage, error = %err, "request rejected")
            }
            Err(err) => warn!(stage = %stage, error = %err, "request failed"),
        }
        result
    }

    async fn run(
        &self,
        question: &str,
        stage: &mut Stage,
    ) -> Result<GatewayResponse, GatewayError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(GatewayError::BadRequest(
                "missing question or query field".into(),
            ));
        }
        debug!(stage = %stage, chars = question.len(), "generating SQL");

        let Extracted { sql, notes } = self.generator.generate(question).await?;
        *stage = Stage::SqlGenerated;
        debug!(stage = %stage, sql = %sql, "generated SQL");

        let validated = sql.validate()?;
        *stage = Stage::Validated;
        debug!(stage = %stage, "SQL passed validation");

        let executable = validated.limit(self.max_rows);
        *stage = Stage::Limited;
        debug!(stage = %stage, sql = %executable, "limited SQL");

        let rows = self.executor.execute(&executable).await?;
        *stage = Stage::Executed;
        debug!(stage = %stage, rows = rows.len(), "query executed");

        let response = GatewayResponse {
            sql: executable.into_string(),
            notes,
            rows,
        };
        *stage = Stage::Responded;
        Ok(response)
    }
}

fn key_matches(presented: Option<&str>, expected: &str) -> bool {
    presented.is_some_and(|key| bool::from(key.as_bytes().ct_eq(expected.as_bytes())))
}
