//! Postgres executor backed by a sqlx connection pool.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value as JsonValue;
use sqlx::postgres::types::{PgInterval, PgMoney};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow, PgTypeInfo, PgTypeKind, Postgres};
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::{Decimal, Uuid};
use sqlx::{Column, Row as _, TypeInfo};
use tracing::debug;

use super::{QueryExecutor, ResultSet, Row};
use crate::config::DatabaseConfig;
use crate::error::GatewayError;
use crate::sql::ExecutableSql;

/// Executes queries on pooled Postgres connections.
///
/// Each query runs in its own `READ ONLY` transaction that is always rolled
/// back. Connections go back to the pool on every path, including timeouts.
#[derive(Clone)]
pub struct PgExecutor {
    pool: PgPool,
    query_timeout: Duration,
}

impl PgExecutor {
    /// Builds the pool without opening a connection. Connections are opened
    /// on first use, so startup does not depend on the database being up.
    pub fn connect_lazy(config: &DatabaseConfig) -> eyre::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_lazy(&config.url)?;

        Ok(Self::from_pool(pool, config.query_timeout))
    }

    pub fn from_pool(pool: PgPool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch(&self, sql: &str) -> Result<ResultSet, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION READ ONLY")
            .execute(&mut *tx)
            .await?;

        // Generated text is one-off; keep it out of the statement cache.
        let rows = sqlx::query(sql)
            .persistent(false)
            .fetch_all(&mut *tx)
            .await?;
        tx.rollback().await?;

        rows.iter().map(row_to_json).collect()
    }
}

#[async_trait]
impl QueryExecutor for PgExecutor {
    async fn execute(&self, sql: &ExecutableSql) -> Result<ResultSet, GatewayError> {
        debug!(sql = %sql, "executing query");

        match tokio::time::timeout(self.query_timeout, self.fetch(sql.as_str())).await {
            Ok(result) => result.map_err(classify),
            Err(_) => Err(GatewayError::Execution(format!(
                "query exceeded {:?}",
                self.query_timeout
            ))),
        }
    }
}

/// Connector-level failures are database errors; anything about turning a
/// result into values is an execution error.
fn classify(err: sqlx::Error) -> GatewayError {
    match &err {
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::TypeNotFound { .. } => GatewayError::Execution(err.to_string()),
        _ => GatewayError::Database(err.to_string()),
    }
}

fn row_to_json(row: &PgRow) -> Result<Row, sqlx::Error> {
    let mut out = Row::with_capacity(row.columns().len());
    for column in row.columns() {
        let value = cell_to_json(row, column.ordinal(), column.type_info())?;
        out.push(column.name(), value);
    }
    Ok(out)
}

/// SQL NULL becomes `null`. A non-NULL value that cannot be decoded is an
/// error, never a silent `null`.
fn cell_to_json(row: &PgRow, idx: usize, ty: &PgTypeInfo) -> Result<JsonValue, sqlx::Error> {
    let value = match ty.name() {
        "BOOL" => decode::<bool>(row, idx)?.map(JsonValue::Bool),
        "INT2" => decode::<i16>(row, idx)?.map(JsonValue::from),
        "INT4" => decode::<i32>(row, idx)?.map(JsonValue::from),
        "INT8" => decode::<i64>(row, idx)?.map(JsonValue::from),
        "FLOAT4" => decode::<f32>(row, idx)?.map(|v| float(f64::from(v))),
        "FLOAT8" => decode::<f64>(row, idx)?.map(float),
        "NUMERIC" => decode::<Decimal>(row, idx)?.map(decimal),
        "MONEY" => decode::<PgMoney>(row, idx)?.map(|m| decimal(m.to_decimal(MONEY_SCALE))),
        "UUID" => decode::<Uuid>(row, idx)?.map(|u| JsonValue::from(u.to_string())),
        "JSON" | "JSONB" => decode::<JsonValue>(row, idx)?,
        "DATE" => decode::<NaiveDate>(row, idx)?.map(date),
        "TIME" => decode::<NaiveTime>(row, idx)?.map(|t| JsonValue::from(t.to_string())),
        "TIMESTAMP" => decode::<NaiveDateTime>(row, idx)?.map(timestamp),
        "TIMESTAMPTZ" => decode::<DateTime<Utc>>(row, idx)?.map(timestamptz),
        "INTERVAL" => decode::<PgInterval>(row, idx)?.map(interval),

        "BOOL[]" => array::<bool>(row, idx, JsonValue::Bool)?,
        "INT2[]" => array::<i16>(row, idx, JsonValue::from)?,
        "INT4[]" => array::<i32>(row, idx, JsonValue::from)?,
        "INT8[]" => array::<i64>(row, idx, JsonValue::from)?,
        "FLOAT4[]" => array::<f32>(row, idx, |v| float(f64::from(v)))?,
        "FLOAT8[]" => array::<f64>(row, idx, float)?,
        "NUMERIC[]" => array::<Decimal>(row, idx, decimal)?,
        "UUID[]" => array::<Uuid>(row, idx, |u| JsonValue::from(u.to_string()))?,
        "DATE[]" => array::<NaiveDate>(row, idx, date)?,
        "TIMESTAMP[]" => array::<NaiveDateTime>(row, idx, timestamp)?,
        "TIMESTAMPTZ[]" => array::<DateTime<Utc>>(row, idx, timestamptz)?,
        "TEXT[]" | "VARCHAR[]" | "CHAR[]" | "NAME[]" => {
            array::<String>(row, idx, JsonValue::from)?
        }

        // Enum labels travel as text; the type check would reject `String`.
        _ if matches!(ty.kind(), PgTypeKind::Enum(_)) => row
            .try_get_unchecked::<Option<String>, _>(idx)?
            .map(JsonValue::from),
        _ => decode::<String>(row, idx)?.map(JsonValue::from),
    };
    Ok(value.unwrap_or(JsonValue::Null))
}

/// Postgres formats `money` with two fractional digits unless `lc_monetary` says otherwise.
const MONEY_SCALE: u32 = 2;

fn decode<'r, T>(row: &'r PgRow, idx: usize) -> Result<Option<T>, sqlx::Error>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get::<Option<T>, _>(idx)
}

/// One-dimensional array; NULL elements stay `null`.
fn array<'r, T>(
    row: &'r PgRow,
    idx: usize,
    convert: impl Fn(T) -> JsonValue,
) -> Result<Option<JsonValue>, sqlx::Error>
where
    Vec<Option<T>>: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    Ok(decode::<Vec<Option<T>>>(row, idx)?.map(|items| {
        JsonValue::Array(
            items
                .into_iter()
                .map(|item| item.map_or(JsonValue::Null, &convert))
                .collect(),
        )
    }))
}

/// JSON has no NaN or infinity; those keep their Postgres spelling.
fn float(v: f64) -> JsonValue {
    match serde_json::Number::from_f64(v) {
        Some(n) => JsonValue::Number(n),
        None if v.is_nan() => JsonValue::from("NaN"),
        None if v > 0.0 => JsonValue::from("Infinity"),
        None => JsonValue::from("-Infinity"),
    }
}

fn decimal(d: Decimal) -> JsonValue {
    match d.to_f64() {
        Some(v) => float(v),
        None => JsonValue::from(d.to_string()),
    }
}

fn date(d: NaiveDate) -> JsonValue {
    JsonValue::from(d.format("%Y-%m-%d").to_string())
}

fn timestamp(dt: NaiveDateTime) -> JsonValue {
    JsonValue::from(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
}

fn timestamptz(dt: DateTime<Utc>) -> JsonValue {
    JsonValue::from(dt.to_rfc3339())
}

/// ISO-8601 duration. Months and days are not folded into seconds since
/// their length depends on the calendar.
fn interval(iv: PgInterval) -> JsonValue {
    let seconds = iv.microseconds as f64 / 1_000_000.0;
    JsonValue::from(format!("P{}M{}DT{}S", iv.months, iv.days, seconds))
}
