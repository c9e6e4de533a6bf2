//! Row cap injection.
//!
//! Purely textual: any whole-word `LIMIT` in the text counts as an existing
//! cap, including one inside a subquery or a comment. In those cases the
//! outer query runs without the injected cap. An explicit limit is never
//! widened or narrowed.

use lazy_static::lazy_static;
use regex::Regex;

use super::validate::code_ranges;

lazy_static! {
    static ref LIMIT_TOKEN: Regex = Regex::new(r"(?i)\bLIMIT\b").expect("valid limit pattern");
}

/// Adds `LIMIT max_rows` unless the text already carries a `LIMIT`.
///
/// The clause goes right after the last piece of code, ahead of any trailing
/// comments, and replaces a single `;` found there. Idempotent for a fixed
/// `max_rows`.
pub fn apply_limit(sql: &str, max_rows: usize) -> String {
    if LIMIT_TOKEN.is_match(sql) {
        return sql.to_string();
    }

    let code_end = code_ranges(sql)
        .into_iter()
        .rev()
        .find_map(|r| {
            let piece = sql[r.clone()].trim_end();
            (!piece.is_empty()).then(|| r.start + piece.len())
        })
        .unwrap_or(0);

    let (code, comments) = sql.split_at(code_end);
    let code = code.strip_suffix(';').unwrap_or(code).trim_end();
    let comments = comments.trim();

    if comments.is_empty() {
        format!("{code} LIMIT {max_rows}")
    } else {
        format!("{code} LIMIT {max_rows} {comments}")
    }
}
