//! Typed, all-or-nothing field access over a parsed JSON object.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use campaignsmith_shared::{Evaluation, MAX_SCORE, ParseFailure, Rubric};

use crate::extract::json_type_name;

type Object = Map<String, Value>;

/// A required, non-blank string, returned exactly as sent.
pub(crate) fn text(obj: &Object, field: &str) -> Result<String, ParseFailure> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(ParseFailure::missing_field(field)),
        Some(Value::String(s)) if s.trim().is_empty() => Err(ParseFailure::empty_field(field)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(ParseFailure::type_mismatch(
            field,
            &format!("a string, got {}", json_type_name(other)),
        )),
    }
}

/// A required array of non-blank strings, kept in order and unmodified.
pub(crate) fn text_list(obj: &Object, field: &str) -> Result<Vec<String>, ParseFailure> {
    let items = match obj.get(field) {
        None | Some(Value::Null) => return Err(ParseFailure::missing_field(field)),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(ParseFailure::type_mismatch(
                field,
                &format!("a list of strings, got {}", json_type_name(other)),
            ));
        }
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::String(s) if s.trim().is_empty() => {
                Err(ParseFailure::empty_field(&format!("{field}[{i}]")))
            }
            Value::String(s) => Ok(s.clone()),
            other => Err(ParseFailure::type_mismatch(
                field,
                &format!("a list of strings, found {} entry", json_type_name(other)),
            )),
        })
        .collect()
}

/// A required integer score in `0..=MAX_SCORE`. Never clamped.
pub(crate) fn score(obj: &Object, field: &str) -> Result<u8, ParseFailure> {
    let value = match obj.get(field) {
        None | Some(Value::Null) => return Err(ParseFailure::missing_field(field)),
        Some(v) => v,
    };

    let n = value.as_i64().ok_or_else(|| {
        ParseFailure::type_mismatch(
            field,
            &format!("an integer, got {}", describe_number(value)),
        )
    })?;

    if !(0..=i64::from(MAX_SCORE)).contains(&n) {
        return Err(ParseFailure::out_of_range(field, n, 0, MAX_SCORE));
    }

    u8::try_from(n).map_err(|_| ParseFailure::out_of_range(field, n, 0, MAX_SCORE))
}

/// A required array of objects.
pub(crate) fn object_list<'a>(obj: &'a Object, field: &str) -> Result<Vec<&'a Object>, ParseFailure> {
    let items = match obj.get(field) {
        None | Some(Value::Null) => return Err(ParseFailure::missing_field(field)),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(ParseFailure::type_mismatch(
                field,
                &format!("a list of objects, got {}", json_type_name(other)),
            ));
        }
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            item.as_object().ok_or_else(|| {
                ParseFailure::type_mismatch(
                    &format!("{field}[{i}]"),
                    &format!("an object, got {}", json_type_name(item)),
                )
            })
        })
        .collect()
}

/// Every dimension of `rubric` plus `comments`, validated into an [`Evaluation`].
pub(crate) fn evaluation(obj: &Object, rubric: Rubric) -> Result<Evaluation, ParseFailure> {
    let mut scores = BTreeMap::new();
    for dim in rubric.dimensions() {
        scores.insert(*dim, score(obj, dim)?);
    }
    let comments = text(obj, "comments")?;
    Evaluation::new(rubric, scores, comments)
}

fn describe_number(value: &Value) -> String {
    match value {
        Value::Number(n) => format!("the number {n}"),
        other => json_type_name(other).to_string(),
    }
}
