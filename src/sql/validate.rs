//! Lexical read-only screen for generated SQL.
//!
//! This is keyword screening, not parsing. A working copy of the text is
//! upper-cased, comments are removed, and the result must start with the
//! `SELECT` token and contain none of the [`DENYLIST`] words anywhere, even
//! inside identifiers or string literals. Safe queries that trip the
//! denylist (a column called `updated_at`, say) are rejected; that is the
//! accepted cost of never letting a mutating statement through.
//!
//! Comments are removed in two independent ways and both results must pass:
//!
//! - a plain pattern pass that drops every `--` line and `/* */` block
//! - a quote-aware pass that leaves single-quoted, double-quoted and
//!   dollar-quoted text alone, so a literal like `'--'` cannot hide the rest
//!   of the line from the scan
//!
//! Escape handling assumes `standard_conforming_strings = on`, the Postgres
//! default: backslashes only escape inside `E'...'` literals.

use std::ops::Range;

use lazy_static::lazy_static;
use regex::Regex;

/// Words whose presence anywhere in the comment-stripped text rejects it.
pub const DENYLIST: [&str; 12] = [
    "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "TRUNCATE", "GRANT", "REVOKE", "EXEC",
    "EXECUTE", "CALL",
];

lazy_static! {
    static ref LINE_COMMENT: Regex = Regex::new(r"--[^\n]*").expect("valid line comment pattern");
    static ref BLOCK_COMMENT: Regex =
        Regex::new(r"(?s)/\*.*?\*/").expect("valid block comment pattern");
}

/// Returns `true` only for text that reads as a single read-only `SELECT`.
///
/// The input is never modified.
pub fn validate(sql: &str) -> bool {
    let working = sql.trim().to_uppercase();

    is_read_only(&strip_comments_naive(&working)) && is_read_only(&strip_comments(&working))
}

fn is_read_only(text: &str) -> bool {
    !DENYLIST.iter().any(|keyword| text.contains(keyword)) && leads_with_select(text)
}

fn leads_with_select(text: &str) -> bool {
    text.trim_start()
        .strip_prefix("SELECT")
        .is_some_and(|rest| !rest.starts_with(is_ident_char))
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Drops `--` to end of line, then non-greedy `/* ... */` blocks.
pub fn strip_comments_naive(text: &str) -> String {
    let without_lines = LINE_COMMENT.replace_all(text, "");
    BLOCK_COMMENT.replace_all(&without_lines, "").into_owned()
}

/// Drops comments that sit outside quoted text.
///
/// Quoted text is copied through verbatim. An unterminated block comment is
/// kept, so whatever follows it is still scanned.
pub fn strip_comments(text: &str) -> String {
    code_ranges(text).into_iter().map(|r| &text[r]).collect()
}

/// Byte ranges of `text` that are not comments, in order. Quoted text and
/// the newline ending a line comment belong to the surrounding code.
pub fn code_ranges(text: &str) -> Vec<Range<usize>> {
    let chars: Vec<char> = text.chars().collect();
    let mut offsets: Vec<usize> = text.char_indices().map(|(at, _)| at).collect();
    offsets.push(text.len());

    let mut ranges = Vec::new();
    let mut push = |from: usize, to: usize| {
        if from < to {
            ranges.push(offsets[from]..offsets[to]);
        }
    };

    let mut code_start = 0;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        match c {
            '-' if next == Some('-') => {
                push(code_start, i);
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                code_start = i;
            }
            '/' if next == Some('*') => match find(&chars, i + 2, &['*', '/']) {
                Some(end) => {
                    push(code_start, i);
                    i = end + 2;
                    code_start = i;
                }
                None => i = chars.len(),
            },
            '\'' => {
                let escapes = i > 0
                    && matches!(chars[i - 1], 'E' | 'e')
                    && (i < 2 || !is_ident_char(chars[i - 2]));
                i = quoted_end(&chars, i + 1, '\'', escapes);
            }
            '"' => i = quoted_end(&chars, i + 1, '"', false),
            '$' if i == 0 || !is_ident_char(chars[i - 1]) => match dollar_tag(&chars, i) {
                Some(tag_len) => {
                    let tag = &chars[i..i + tag_len];
                    i = find(&chars, i + tag_len, tag).map_or(chars.len(), |at| at + tag_len);
                }
                None => i += 1,
            },
            _ => i += 1,
        }
    }
    push(code_start, chars.len());

    ranges
}

/// Index just past the closing quote, or the end of input.
fn quoted_end(chars: &[char], from: usize, quote: char, escapes: bool) -> usize {
    let mut j = from;
    while j < chars.len() {
        match chars[j] {
            '\\' if escapes => j += 2,
            c if c == quote => {
                if chars.get(j + 1) == Some(&quote) {
                    j += 2;
                } else {
                    return j + 1;
                }
            }
            _ => j += 1,
        }
    }
    chars.len()
}

/// Length of a `$tag$` opener starting at `start`, including both dollars.
fn dollar_tag(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start + 1;
    if chars.get(j).is_some_and(|&c| c.is_alphabetic() || c == '_') {
        j += 1;
        while chars.get(j).is_some_and(|&c| c.is_alphanumeric() || c == '_') {
            j += 1;
        }
    }
    (chars.get(j) == Some(&'$')).then_some(j + 1 - start)
}

fn find(chars: &[char], from: usize, pattern: &[char]) -> Option<usize> {
    chars
        .get(from..)?
        .windows(pattern.len())
        .position(|window| window == pattern)
        .map(|at| at + from)
}
