//! Locating the structured block inside raw model text.
//!
//! Models wrap JSON in tags, code fences, or chatty preambles. Extraction
//! tries, in order: a `<json>…</json>` tagged block, the whole reply when it
//! starts with `{`, a fenced code block, then the span from the first `{` to
//! the last `}`. Later candidates are used when earlier ones do not parse.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use campaignsmith_shared::ParseFailure;

/// Return the contents of the first `<tag>…</tag>` pair, if any.
pub fn extract_tagged<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = text.find(&open)? + open.len();
    let end = text[start..].find(&close)? + start;
    Some(&text[start..end])
}

/// Return the body of the first fenced code block, if any.
fn extract_fenced(text: &str) -> Option<&str> {
    static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)```[A-Za-z]*[ \t]*\r?\n?(.*?)```").expect("valid regex")
    });

    FENCE_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Return the outermost brace-delimited span, if any.
fn extract_braced(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Find the structured block in `raw` and parse it as a JSON object.
///
/// Candidates are tried in order and the first that parses as an object
/// wins. If none does, the failure of the earliest candidate is reported.
pub fn parse_object(raw: &str) -> Result<Map<String, Value>, ParseFailure> {
    let trimmed = raw.trim();
    let candidates = [
        extract_tagged(raw, "json"),
        trimmed.starts_with('{').then_some(trimmed),
        extract_fenced(raw),
        extract_braced(raw),
    ];

    let mut first_failure = None;
    for candidate in candidates.into_iter().flatten() {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            continue;
        }
        match parse_candidate(candidate) {
            Ok(map) => return Ok(map),
            Err(failure) => {
                first_failure.get_or_insert(failure);
            }
        }
    }

    Err(first_failure
        .unwrap_or_else(|| ParseFailure::malformed("no JSON object found in response")))
}

fn parse_candidate(candidate: &str) -> Result<Map<String, Value>, ParseFailure> {
    let value: Value = serde_json::from_str(candidate).map_err(ParseFailure::malformed)?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ParseFailure::malformed(format!(
            "expected a JSON object, got {}",
            json_type_name(&other)
        ))),
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
