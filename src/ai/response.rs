//! Model Response Parsing
//!
//! Two independent stages:
//! 1. [`parse_strict`]: the whole response (minus code fences) is one JSON object
//! 2. [`extract_json_object`]: the first balanced `{...}` that parses, found
//!    inside surrounding prose
//!
//! If neither yields a usable object the response is
//! [`LensError::UnparseableResponse`]; fields are never salvaged piecemeal.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::types::{LensError, Result};

const PREVIEW_CHARS: usize = 200;

/// Fields the model is asked to return
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ModelResponse {
    #[serde(alias = "purpose", alias = "description")]
    pub summary: String,
    pub roles: Vec<String>,
    pub exports: Vec<String>,
    pub dependencies: Vec<String>,
    pub related: Vec<String>,
}

/// Remove a surrounding markdown code fence, if any
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim().trim_start_matches('\u{feff}');
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (```json)
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Stage one: the response is exactly a JSON object
pub fn parse_strict(raw: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(strip_code_fences(raw)) {
        Ok(value) if value.is_object() => Some(value),
        _ => None,
    }
}

/// Stage two: the first balanced JSON object embedded in `raw`
///
/// Tracks string literals so braces inside strings do not count.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let mut search_from = 0;
    while let Some(offset) = raw[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(end) = balanced_end(&raw[start..]) {
            let candidate = &raw[start..start + end];
            if serde_json::from_str::<Value>(candidate).is_ok_and(|v| v.is_object()) {
                return Some(candidate);
            }
        }
        search_from = start + 1;
    }
    None
}

/// Byte length of the balanced object starting at `s[0] == '{'`
fn balanced_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape = false;

    for (i, ch) in s.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

fn preview(raw: &str) -> String {
    raw.chars().take(PREVIEW_CHARS).collect()
}

/// Parse a model response into [`ModelResponse`]
///
/// A response without a non-empty summary is unparseable.
pub fn parse_model_response(raw: &str) -> Result<ModelResponse> {
    let value = match parse_strict(raw) {
        Some(value) => value,
        None => {
            debug!("Strict parse failed, extracting embedded object");
            extract_json_object(raw)
                .and_then(|s| serde_json::from_str::<Value>(s).ok())
                .ok_or_else(|| LensError::UnparseableResponse {
                    preview: preview(raw),
                })?
        }
    };

    let parsed: ModelResponse =
        serde_json::from_value(value).map_err(|_| LensError::UnparseableResponse {
            preview: preview(raw),
        })?;

    if parsed.summary.trim().is_empty() {
        return Err(LensError::UnparseableResponse {
            preview: preview(raw),
        });
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strict_plain_and_fenced() {
        assert!(parse_strict(r#"{"summary":"x"}"#).is_some());
        assert!(parse_strict("```json\n{\"summary\":\"x\"}\n```").is_some());
        assert!(parse_strict("```\n{\"summary\":\"x\"}\n```").is_some());
        assert!(parse_strict("[1,2]").is_none());
        assert!(parse_strict("Here you go: {\"summary\":\"x\"}").is_none());
    }

    #[test]
    fn test_extract_embedded_object() {
        let raw = "Sure! Here is the analysis:\n{\"summary\": \"Parses {braces} in strings\", \"roles\": [\"utility\"]}\nHope that helps.";
        let extracted = extract_json_object(raw).unwrap();
        assert!(extracted.starts_with('{'));
        assert!(extracted.ends_with('}'));
        assert!(extracted.contains("{braces}"));
    }

    #[test]
    fn test_extract_skips_broken_candidates() {
        let raw = "set {not json} then {\"summary\": \"ok\"}";
        assert_eq!(extract_json_object(raw), Some("{\"summary\": \"ok\"}"));
    }

    #[test]
    fn test_extract_none() {
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("{\"unterminated\": "), None);
    }

    #[test]
    fn test_parse_model_response_full() {
        let raw = r#"{"summary":"HTTP server","roles":["service","entry"],"exports":["start"],"dependencies":["tokio"],"related":["config.rs"]}"#;
        let parsed = parse_model_response(raw).unwrap();
        assert_eq!(parsed.summary, "HTTP server");
        assert_eq!(parsed.roles, vec!["service", "entry"]);
        assert_eq!(parsed.exports, vec!["start"]);
    }

    #[test]
    fn test_parse_model_response_alias_and_prose() {
        let raw = "Analysis follows.\n{\"purpose\": \"Build script\"}";
        let parsed = parse_model_response(raw).unwrap();
        assert_eq!(parsed.summary, "Build script");
        assert!(parsed.exports.is_empty());
    }

    #[test]
    fn test_unparseable_response() {
        let err = parse_model_response("I could not analyze this file.").unwrap_err();
        assert!(matches!(err, LensError::UnparseableResponse { .. }));
    }

    #[test]
    fn test_empty_summary_is_unparseable() {
        let err = parse_model_response(r#"{"summary":"  ","exports":["a"]}"#).unwrap_err();
        assert!(matches!(err, LensError::UnparseableResponse { .. }));
    }

    #[test]
    fn test_wrong_field_types_are_unparseable() {
        let err = parse_model_response(r#"{"summary":"x","exports":"not a list"}"#).unwrap_err();
        assert!(matches!(err, LensError::UnparseableResponse { .. }));
    }
}
