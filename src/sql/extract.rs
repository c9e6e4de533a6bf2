//! Pulls a candidate query and an explanation out of raw model output.
//!
//! Strategies are tried in a fixed order and the first hit wins:
//!
//! 1. the whole reply (or the body of a ```` ```json ```` fence) as a JSON
//!    object with a string `sql` field and optional `notes`
//! 2. a fenced code block whose body starts with `SELECT`
//! 3. the first `SELECT` in the text, up to the next `;` or the end
//!
//! All matching is case-insensitive. Only the first candidate is returned.

use lazy_static::lazy_static;
use regex::Regex;
use sonic_rs::{JsonValueTrait, Value};
use thiserror::Error;

use super::CandidateSql;

/// Notes attached when the reply carries no explanation of its own.
pub const DEFAULT_NOTES: &str = "Generated SQL query";

lazy_static! {
    static ref FENCED_JSON: Regex =
        Regex::new(r"(?is)```json\s*(\{.*?\})\s*```").expect("valid fenced json pattern");
    static ref FENCED_SELECT: Regex =
        Regex::new(r"(?is)```[a-z0-9_+-]*\s*(SELECT.*?)```").expect("valid fenced select pattern");
    static ref BARE_SELECT: Regex =
        Regex::new(r"(?is)(SELECT.*?)(?:;|$)").expect("valid bare select pattern");
}

/// A query candidate together with the model's explanation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Extracted {
    pub sql: CandidateSql,
    pub notes: String,
}

impl Extracted {
    fn with_default_notes(sql: &str) -> Self {
        Self {
            sql: CandidateSql::new(sql.trim()),
            notes: DEFAULT_NOTES.to_string(),
        }
    }
}

/// The model reply contained nothing usable as a query.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("no SQL query found in model output")]
pub struct NotFound;

/// Extracts the first query candidate from `raw`.
///
/// Malformed JSON is not an error here; it just falls through to the text
/// patterns. A reply that is a JSON string is matched on its decoded text.
pub fn extract(raw: &str) -> Result<Extracted, NotFound> {
    let parsed: Option<Value> = sonic_rs::from_str(raw.trim()).ok();
    if let Some(found) = parsed.as_ref().and_then(from_object) {
        return Ok(found);
    }

    let decoded = parsed.as_ref().and_then(|v| v.as_str()).map(str::to_owned);
    from_text(decoded.as_deref().unwrap_or(raw)).ok_or(NotFound)
}

fn from_text(text: &str) -> Option<Extracted> {
    if let Some(found) = FENCED_JSON
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|body| sonic_rs::from_str::<Value>(body.as_str()).ok())
        .and_then(|value| from_object(&value))
    {
        return Some(found);
    }

    FENCED_SELECT
        .captures(text)
        .or_else(|| BARE_SELECT.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|body| Extracted::with_default_notes(body.as_str()))
}

fn from_object(value: &Value) -> Option<Extracted> {
    if !value.is_object() {
        return None;
    }

    let sql = value.get("sql").and_then(|v| v.as_str())?;
    let notes = value
        .get("notes")
        .and_then(|v| v.as_str())
        .unwrap_or(DEFAULT_NOTES);

    Some(Extracted {
        sql: CandidateSql::new(sql),
        notes: notes.to_string(),
    })
}
