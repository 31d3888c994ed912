use serde_json::Value;
use tracing::warn;

use super::types::{GroundingChunk, SuggestionItem, SuggestionResult};

pub const FALLBACK_TITLE: &str = "Nearby Places";
pub const DEFAULT_TITLE: &str = "Nearby Suggestions";
pub const DEFAULT_INTRODUCTION: &str = "Here are some places you might like.";

/// Build a suggestion result from the model's JSON answer.
///
/// Maps grounding rules out structured output, so the answer is free text
/// that should hold a JSON object, possibly wrapped in a markdown fence.
/// Anything unparsable degrades to an empty, titled result.
pub fn parse_suggestions(text: &str, places: Vec<GroundingChunk>) -> SuggestionResult {
    let cleaned = strip_code_fence(text);

    let parsed = match serde_json::from_str::<Value>(cleaned) {
        Ok(value) if value.is_object() => value,
        Ok(_) | Err(_) => {
            warn!("Suggestions answer is not a JSON object, using defaults");
            return SuggestionResult {
                title: FALLBACK_TITLE.to_string(),
                introduction: DEFAULT_INTRODUCTION.to_string(),
                recommendations: Vec::new(),
                places,
            };
        }
    };

    let title = non_empty_str(&parsed["title"]).unwrap_or(DEFAULT_TITLE);
    let introduction = non_empty_str(&parsed["introduction"]).unwrap_or(DEFAULT_INTRODUCTION);

    let recommendations = match &parsed["recommendations"] {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| serde_json::from_value::<SuggestionItem>(item.clone()).ok())
            .collect(),
        _ => Vec::new(),
    };

    SuggestionResult {
        title: title.to_string(),
        introduction: introduction.to_string(),
        recommendations,
        places,
    }
}

pub fn strip_code_fence(text: &str) -> &str {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix("```json") {
        body = rest;
    } else if let Some(rest) = body.strip_prefix("```") {
        body = rest;
    }
    body.trim().trim_end_matches("```").trim()
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.trim().is_empty())
}
