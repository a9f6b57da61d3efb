//! Normalization of loosely-shaped model output into canonical records.
//!
//! Structured responses drift: JSON arrives fenced in markdown, outlines
//! come back as arrays, objects wrapping arrays, or maps of section
//! objects, and SEO fields show up under synonymous or localized keys.
//! Everything here enumerates the accepted shapes explicitly and fails
//! closed on anything else.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::models::seo::SeoRecord;

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("invalid JSON from model: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("model returned an error: {0}")]
    ModelReported(String),

    #[error("outline is not an array or object of sections")]
    OutlineShape,

    #[error("model produced an empty outline")]
    EmptyOutline,

    #[error("SEO response is not a JSON object")]
    SeoShape,

    #[error("SEO record is missing required fields (title, description, keywords)")]
    IncompleteSeo,
}

/// Content-bearing keys tried, in priority order, when an outline element
/// is an object instead of a plain string.
const OUTLINE_CONTENT_KEYS: [&str; 4] = ["noi_dung_chinh", "content", "text", "title"];

/// Accepted key synonyms per SEO field, lowercase (lookup is
/// case-insensitive and includes the localized forms the model produces
/// for Vietnamese prompts).
const TITLE_KEYS: [&str; 4] = ["title", "new_title", "newtitle", "tiêu đề"];
const DESCRIPTION_KEYS: [&str; 2] = ["description", "mô tả"];
const KEYWORD_KEYS: [&str; 3] = ["keywords", "tags", "từ khóa"];

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^##\s*(.*?)\s*##").expect("valid heading regex"))
}

/// Remove `## ... ##` section-heading markup the model echoes back into
/// text responses, then trim.
pub fn strip_heading_markup(raw: &str) -> String {
    heading_re()
        .replace_all(raw, "$1")
        .replace("##", "")
        .trim()
        .to_string()
}

/// Strip an optional markdown code fence (with optional language tag)
/// wrapping the raw JSON text.
pub fn strip_code_fence(raw: &str) -> &str {
    let s = raw.trim();
    let s = match s.strip_prefix("```") {
        Some(rest) => rest
            .trim_start_matches(|c: char| c.is_ascii_alphanumeric())
            .trim_start(),
        None => s,
    };
    match s.strip_suffix("```") {
        Some(rest) => rest.trim_end(),
        None => s,
    }
}

/// Decode model output as JSON, tolerating a markdown fence. A parse
/// failure is reported as its own condition, never retried upstream.
pub fn parse_model_json(raw: &str) -> Result<Value, NormalizeError> {
    serde_json::from_str(strip_code_fence(raw)).map_err(NormalizeError::InvalidJson)
}

/// Normalize a raw outline response into the ordered section list.
pub fn outline(raw: &str) -> Result<Vec<String>, NormalizeError> {
    outline_from_value(&parse_model_json(raw)?)
}

/// Accepted outline shapes: an array of elements; an object whose first
/// array-valued entry holds the elements; an object whose own values are
/// the elements. Anything else fails, as does an empty result.
pub fn outline_from_value(value: &Value) -> Result<Vec<String>, NormalizeError> {
    let candidates: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => match map.values().find(|v| v.is_array()) {
            Some(Value::Array(items)) => items.iter().collect(),
            _ => map.values().collect(),
        },
        _ => return Err(NormalizeError::OutlineShape),
    };

    if candidates.is_empty() {
        return Err(NormalizeError::EmptyOutline);
    }

    Ok(candidates.into_iter().map(element_text).collect())
}

/// Map one outline element to its display string.
fn element_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => {
            for key in OUTLINE_CONTENT_KEYS {
                if let Some(Value::String(s)) = map.get(key) {
                    if !s.is_empty() {
                        return s.clone();
                    }
                }
            }
            if let Some(s) = map
                .values()
                .find_map(|v| v.as_str().filter(|s| !s.is_empty()))
            {
                return s.to_string();
            }
            map.values().map(value_text).collect::<Vec<_>>().join("; ")
        }
        other => value_text(other),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Normalize a raw SEO response into a complete [`SeoRecord`].
pub fn seo(raw: &str) -> Result<SeoRecord, NormalizeError> {
    seo_from_value(&parse_model_json(raw)?)
}

pub fn seo_from_value(value: &Value) -> Result<SeoRecord, NormalizeError> {
    let map = value.as_object().ok_or(NormalizeError::SeoShape)?;

    // The model occasionally answers with an error object instead of the
    // requested record.
    if let Some(err) = map.get("error") {
        return Err(NormalizeError::ModelReported(value_text(err)));
    }

    let title = find_case_insensitive(map, &TITLE_KEYS)
        .map(value_text)
        .unwrap_or_default()
        .trim()
        .to_string();
    let description = find_case_insensitive(map, &DESCRIPTION_KEYS)
        .map(value_text)
        .unwrap_or_default()
        .trim()
        .to_string();

    let keywords: Vec<String> = match find_case_insensitive(map, &KEYWORD_KEYS) {
        Some(Value::Array(items)) => items
            .iter()
            .map(value_text)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        // Any other type is unusable; the emptiness check below rejects it.
        _ => Vec::new(),
    };

    if title.is_empty() || description.is_empty() || keywords.is_empty() {
        return Err(NormalizeError::IncompleteSeo);
    }

    Ok(SeoRecord {
        title,
        description,
        keywords,
    })
}

fn find_case_insensitive<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    map.iter()
        .find(|(key, _)| keys.contains(&key.to_lowercase().as_str()))
        .map(|(_, value)| value)
}
