//! Text-level handling of model-generated SQL.
//!
//! Query text only ever moves forward through three wrapper types:
//!
//! ```text
//! CandidateSql --validate()--> ValidatedSql --limit()--> ExecutableSql
//! ```
//!
//! [`ExecutableSql`] has no public constructor, so the executor can only ever
//! receive text that has passed [`validate`] and then [`apply_limit`], in that
//! order.

use std::fmt;

use crate::error::GatewayError;

pub mod extract;
pub mod limit;
pub mod validate;

pub use extract::{DEFAULT_NOTES, Extracted, NotFound, extract};
pub use limit::apply_limit;
pub use validate::validate;

/// Row cap enforced on every executed query.
pub const MAX_ROWS: usize = 200;

/// Untrusted query text pulled out of a model reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateSql(String);

impl CandidateSql {
    pub fn new(sql: impl Into<String>) -> Self {
        Self(sql.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Runs the read-only screen. The text itself is never modified.
    pub fn validate(self) -> Result<ValidatedSql, GatewayError> {
        if validate::validate(&self.0) {
            Ok(ValidatedSql(self.0))
        } else {
            Err(GatewayError::InvalidQuery)
        }
    }
}

impl fmt::Display for CandidateSql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Query text that passed the read-only screen but has no row cap yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedSql(String);

impl ValidatedSql {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Guarantees a row cap. The result is not re-validated.
    pub fn limit(self, max_rows: usize) -> ExecutableSql {
        ExecutableSql(apply_limit(&self.0, max_rows))
    }
}

/// The only form of query text the executor accepts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutableSql(String);

impl ExecutableSql {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ExecutableSql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
