//! Query execution against the backing database.
//!
//! [`QueryExecutor`] is the seam between the gateway and the database. It
//! only accepts [`ExecutableSql`], so nothing reaches the database without
//! passing validation and limiting first.

use async_trait::async_trait;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value as JsonValue;

use crate::error::GatewayError;
use crate::sql::ExecutableSql;

mod postgres;

pub use postgres::PgExecutor;

/// Rows in the order the database returned them.
pub type ResultSet = Vec<Row>;

/// One result row: column name to value, in result-metadata column order.
///
/// Serializes as a JSON object with keys in column order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    cells: Vec<(String, JsonValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(columns: usize) -> Self {
        Self {
            cells: Vec::with_capacity(columns),
        }
    }

    pub fn push(&mut self, column: impl Into<String>, value: JsonValue) {
        self.cells.push((column.into(), value));
    }

    /// First cell named `column`. Duplicate column names are all kept.
    pub fn get(&self, column: &str) -> Option<&JsonValue> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, JsonValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, JsonValue)>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (name, value) in &self.cells {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Runs one validated, limited statement and materializes every row.
///
/// Implementations perform no retries and must release any connection they
/// acquire on every exit path.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, sql: &ExecutableSql) -> Result<ResultSet, GatewayError>;
}
