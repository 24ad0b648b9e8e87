//! # Resilient extraction
//! Turns free-form generator output into validated items. The generator is asked for a
//! single top-level JSON array but may wrap it in markdown fences or prose, so parsing is
//! an ordered fallback chain:
//!
//! 1. strip code fences/backticks, parse the whole remainder;
//! 2. parse the slice between the first opening and the last closing bracket;
//! 3. give up with [`ExtractionError`] carrying a short excerpt.
//!
//! Each array element then goes through [`schema::validate`]; rejected elements are
//! dropped and logged, the batch fails only when nothing survives.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::schema::{self, NewsItem};

/// Max characters of raw text carried in an error for diagnostics.
pub const EXCERPT_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("no JSON array found in generator output")]
    NoArray { excerpt: String },
    #[error("generator returned an empty array")]
    EmptyArray { excerpt: String },
    #[error("none of the {candidates} candidate items passed validation")]
    NoValidItems { candidates: usize, excerpt: String },
}

impl ExtractionError {
    pub fn excerpt(&self) -> &str {
        match self {
            ExtractionError::NoArray { excerpt }
            | ExtractionError::EmptyArray { excerpt }
            | ExtractionError::NoValidItems { excerpt, .. } => excerpt,
        }
    }
}

/// Validated items plus how many candidates were dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub items: Vec<NewsItem>,
    pub dropped: usize,
}

static FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)```[ \t]*(?:json)?").expect("fence regex"));

/// Remove markdown fence markers (with or without a `json` tag) and surrounding whitespace.
pub fn strip_code_fences(raw: &str) -> String {
    FENCE_RE.replace_all(raw, "").trim().to_string()
}

/// Truncate to at most `max` characters, marking the cut.
pub fn excerpt(raw: &str, max: usize) -> String {
    let trimmed = raw.trim();
    if trimmed.chars().count() <= max {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(max).collect();
    out.push_str("...");
    out
}

#[derive(Clone, Copy)]
enum Shape {
    Array,
    Object,
}

impl Shape {
    fn delimiters(self) -> (char, char) {
        match self {
            Shape::Array => ('[', ']'),
            Shape::Object => ('{', '}'),
        }
    }

    fn matches(self, v: &Value) -> bool {
        match self {
            Shape::Array => v.is_array(),
            Shape::Object => v.is_object(),
        }
    }
}

fn locate_json(raw: &str, shape: Shape) -> Option<Value> {
    // 1) whole text, fences stripped
    let stripped = strip_code_fences(raw);
    if let Ok(v) = serde_json::from_str::<Value>(&stripped) {
        if shape.matches(&v) {
            return Some(v);
        }
    }

    // 2) outermost delimiters in the raw text
    let (open, close) = shape.delimiters();
    let start = raw.find(open)?;
    let end = raw.rfind(close)?;
    if end <= start {
        return None;
    }
    let slice = &raw[start..=end];
    match serde_json::from_str::<Value>(slice) {
        Ok(v) if shape.matches(&v) => Some(v),
        Ok(_) => None,
        Err(e) => {
            debug!(target: "extract", error = %e, "bracket slice did not parse");
            None
        }
    }
}

/// Parse a single JSON object out of free-form text (used for verification replies).
pub fn extract_object(raw: &str) -> Option<serde_json::Map<String, Value>> {
    match locate_json(raw, Shape::Object)? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Extract and validate items, reporting how many candidates were dropped.
pub fn extract_with_stats(raw: &str) -> Result<Extraction, ExtractionError> {
    let Some(Value::Array(candidates)) = locate_json(raw, Shape::Array) else {
        return Err(ExtractionError::NoArray {
            excerpt: excerpt(raw, EXCERPT_CHARS),
        });
    };
    if candidates.is_empty() {
        return Err(ExtractionError::EmptyArray {
            excerpt: excerpt(raw, EXCERPT_CHARS),
        });
    }

    let total = candidates.len();
    let mut items = Vec::with_capacity(total);
    for (idx, candidate) in candidates.iter().enumerate() {
        match schema::validate(candidate) {
            Ok(item) => items.push(item),
            Err(reason) => {
                warn!(target: "extract", index = idx, %reason, "dropping candidate item");
            }
        }
    }

    if items.is_empty() {
        return Err(ExtractionError::NoValidItems {
            candidates: total,
            excerpt: excerpt(raw, EXCERPT_CHARS),
        });
    }

    Ok(Extraction {
        dropped: total - items.len(),
        items,
    })
}

/// Ordered validated items from generator output.
pub fn extract_items(raw: &str) -> Result<Vec<NewsItem>, ExtractionError> {
    extract_with_stats(raw).map(|e| e.items)
}
