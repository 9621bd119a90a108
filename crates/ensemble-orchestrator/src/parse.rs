//! Best-effort reading of worker output: structured payload and confidence.
//!
//! Nothing here fails. Output that does not parse simply yields `None`.

use ensemble_core::extract_json;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// JSON keys that carry a confidence figure.
pub const CONFIDENCE_KEYS: &[&str] = &["confidence", "confidenceScore", "confidence_score"];

/// `confidence: 0.8`, `Confidence level = 85%`, `"confidence": 0.7`
#[allow(clippy::expect_used)]
static LABELLED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)confidence(?:[ _](?:score|level))?["']?\s*(?:[:=]|is|of)\s*["']?(\d+(?:\.\d+)?)\s*(%)?"#)
        .expect("valid confidence regex")
});

/// `85% confident`, `90 % confidence`
#[allow(clippy::expect_used)]
static PERCENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*%\s*(?:confiden|certain|sure)")
        .expect("valid percent regex")
});

/// The structured view of a worker's raw output.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedOutput {
    pub parsed: Option<Value>,
    pub confidence: Option<f64>,
}

/// Parse `text` forgivingly and pull out a confidence in `[0, 1]`.
///
/// A numeric confidence field in the parsed JSON wins over text heuristics.
pub fn parse_output(text: &str) -> ParsedOutput {
    let parsed = extract_json(text);
    let confidence = parsed
        .as_ref()
        .and_then(confidence_from_json)
        .or_else(|| extract_confidence(text));
    ParsedOutput { parsed, confidence }
}

/// Find a confidence figure in free text. Values above 1 are read as percentages.
pub fn extract_confidence(text: &str) -> Option<f64> {
    if let Some(caps) = LABELLED_RE.captures(text) {
        let value: f64 = caps.get(1)?.as_str().parse().ok()?;
        let percent = caps.get(2).is_some();
        return Some(normalize(value, percent));
    }
    let caps = PERCENT_RE.captures(text)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    Some(normalize(value, true))
}

/// Remove confidence phrases so outputs can be compared on content alone.
pub fn strip_confidence(text: &str) -> String {
    let without_labels = LABELLED_RE.replace_all(text, "");
    PERCENT_RE.replace_all(&without_labels, "").into_owned()
}

fn confidence_from_json(value: &Value) -> Option<f64> {
    let object = value.as_object()?;
    CONFIDENCE_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_f64))
        .map(|v| normalize(v, false))
}

fn normalize(value: f64, percent: bool) -> f64 {
    let value = if percent || value > 1.0 {
        value / 100.0
    } else {
        value
    };
    value.clamp(0.0, 1.0)
}
