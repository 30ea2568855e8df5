//! Parse-with-fallback helpers for free-text model output
//!
//! Nothing here panics or returns `SchemeError` directly; callers decide what
//! a [`ParseFailure`] degrades to (zero scores, no profile merge).

use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::SchemeError;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseFailure {
    #[error("no JSON found in model output")]
    NoJson,

    #[error("expected a JSON {expected}")]
    WrongShape { expected: &'static str },

    #[error("expected {expected} scores, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    #[error("score at position {0} is not numeric")]
    NonNumeric(usize),
}

impl From<ParseFailure> for SchemeError {
    fn from(e: ParseFailure) -> Self {
        SchemeError::Parse(e.to_string())
    }
}

fn strip_fences(text: &str) -> &str {
    text.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Outermost `open..=close` span of `text`, if any
fn outer_span(text: &str, open: char, close: char) -> Option<(usize, usize)> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then_some((start, end + close.len_utf8()))
}

fn parse_value(text: &str, open: char, close: char) -> Option<Value> {
    let cleaned = strip_fences(text);
    if let Ok(value) = serde_json::from_str::<Value>(cleaned) {
        return Some(value);
    }
    let (start, end) = outer_span(text, open, close)?;
    serde_json::from_str::<Value>(&text[start..end]).ok()
}

/// Extract the JSON object a model embedded in its reply
pub fn extract_json_object(text: &str) -> Result<Map<String, Value>, ParseFailure> {
    match parse_value(text, '{', '}') {
        Some(Value::Object(map)) => Ok(map),
        Some(_) => Err(ParseFailure::WrongShape { expected: "object" }),
        None => Err(ParseFailure::NoJson),
    }
}

/// The reply with its embedded JSON object (and any code fence) removed
pub fn strip_json_object(text: &str) -> String {
    let Some((start, end)) = outer_span(text, '{', '}') else {
        return text.trim().to_string();
    };
    let before = text[..start].trim_end().trim_end_matches("```json").trim_end_matches("```");
    let after = text[end..].trim_start().trim_start_matches("```");
    format!("{}\n{}", before.trim(), after.trim())
        .trim()
        .to_string()
}

fn numeric(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        _ => None,
    }
}

/// Parse a JSON array of relevance scores, one per scheme, clamped to 0..=100
pub fn parse_scores(text: &str, expected: usize) -> Result<Vec<u8>, ParseFailure> {
    let items = match parse_value(text, '[', ']') {
        Some(Value::Array(items)) => items,
        Some(_) => return Err(ParseFailure::WrongShape { expected: "array" }),
        None => return Err(ParseFailure::NoJson),
    };

    if items.len() != expected {
        return Err(ParseFailure::LengthMismatch {
            expected,
            got: items.len(),
        });
    }

    items
        .iter()
        .enumerate()
        .map(|(i, v)| {
            numeric(v)
                .map(|n| n.clamp(0, 100) as u8)
                .ok_or(ParseFailure::NonNumeric(i))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scores_plain_array() {
        assert_eq!(parse_scores("[95, 80, 70]", 3).unwrap(), vec![95, 80, 70]);
    }

    #[test]
    fn test_parse_scores_inside_prose_and_fences() {
        let fenced = "```json\n[10, 20]\n```";
        assert_eq!(parse_scores(fenced, 2).unwrap(), vec![10, 20]);

        let chatty = "Here are the scores you asked for: [88, 42.9, \"61\"] Hope this helps!";
        assert_eq!(parse_scores(chatty, 3).unwrap(), vec![88, 42, 61]);
    }

    #[test]
    fn test_parse_scores_clamps() {
        assert_eq!(parse_scores("[150, -4, 100]", 3).unwrap(), vec![100, 0, 100]);
    }

    #[test]
    fn test_parse_scores_failures() {
        assert_eq!(parse_scores("I cannot score these.", 2), Err(ParseFailure::NoJson));
        assert_eq!(
            parse_scores("[1, 2, 3]", 5),
            Err(ParseFailure::LengthMismatch { expected: 5, got: 3 })
        );
        assert_eq!(
            parse_scores("{\"scores\": [1]}", 1),
            Err(ParseFailure::WrongShape { expected: "array" })
        );
        assert_eq!(parse_scores("[1, \"high\"]", 2), Err(ParseFailure::NonNumeric(1)));
    }

    #[test]
    fn test_extract_json_object_from_mixed_output() {
        let reply = "Thanks Priya! Here is what I have:\n{\"name\": \"Priya\", \"state\": \"Tamil Nadu\"}\nAnything else?";
        let map = extract_json_object(reply).unwrap();
        assert_eq!(map["name"], "Priya");
        assert_eq!(map["state"], "Tamil Nadu");

        assert_eq!(extract_json_object("Which state are you from?"), Err(ParseFailure::NoJson));
    }

    #[test]
    fn test_strip_json_object() {
        let reply = "Got your details.\n```json\n{\"name\": \"Ravi\"}\n```\nShall we continue?";
        assert_eq!(strip_json_object(reply), "Got your details.\nShall we continue?");
        assert_eq!(strip_json_object("{\"name\": \"Ravi\"}"), "");
        assert_eq!(strip_json_object(" plain text "), "plain text");
    }
}
