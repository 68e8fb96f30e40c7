//! Parses raw LLM text into JSON items, tolerating a markdown code fence
//! around or amid the response (models reliably add one despite
//! instructions not to). Grounded on the teacher's `ai/openai.rs`
//! fence-stripping idiom, extended to accept either a bare object or a
//! bare array, and a fence embedded in surrounding prose.

use serde_json::Value;

use crate::error::{ExtractionError, Result};

/// Parse `raw` into a list of JSON items. A bare array is returned as-is; a
/// bare object is wrapped into a single-item list. Falls back to the first
/// fenced code block found anywhere in the text before giving up.
pub fn parse_json_response(raw: &str) -> Result<Vec<Value>> {
    let trimmed = raw.trim();

    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(normalize(value));
    }

    if let Some(block) = extract_fenced_block(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(&block) {
            return Ok(normalize(value));
        }
    }

    Err(ExtractionError::Parse(format!(
        "could not parse LLM response as JSON: {trimmed}"
    )))
}

fn normalize(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        other => vec![other],
    }
}

/// Finds the first ` ``` ` fenced block anywhere in `text`, stripping an
/// optional language tag (e.g. `json`) on the opening line.
fn extract_fenced_block(text: &str) -> Option<String> {
    let start = text.find("```")?;
    let after_open = &text[start + 3..];
    let body_start = match after_open.find('\n') {
        Some(newline) => {
            let tag = after_open[..newline].trim();
            if tag.is_empty() || tag.chars().all(|c| c.is_ascii_alphanumeric()) {
                newline + 1
            } else {
                0
            }
        }
        None => 0,
    };
    let body = &after_open[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_object_as_single_item() {
        let items = parse_json_response(r#"{"question": "Q?"}"#).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["question"], "Q?");
    }

    #[test]
    fn parses_bare_array() {
        let items = parse_json_response(r#"[{"question": "Q1?"}, {"question": "Q2?"}]"#).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn parses_fenced_json() {
        let raw = "```json\n{\"question\": \"Q?\"}\n```";
        let items = parse_json_response(raw).unwrap();
        assert_eq!(items[0]["question"], "Q?");
    }

    #[test]
    fn parses_fenced_block_embedded_in_prose() {
        let raw = "Here is the extraction:\n```json\n[{\"question\": \"Q?\"}]\n```\nLet me know if you need more.";
        let items = parse_json_response(raw).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["question"], "Q?");
    }

    #[test]
    fn rejects_non_json_text() {
        assert!(parse_json_response("I cannot extract this.").is_err());
    }
}
