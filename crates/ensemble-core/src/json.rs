/// Best-effort extraction of a JSON object or array from free text.
///
/// Tries, in order: the whole trimmed text, the first fenced code block
/// (optionally tagged `json`), and the span from the first `{` to the last `}`.
/// Never fails; returns `None` when nothing parses.
pub fn extract_json(text: &str) -> Option<serde_json::Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(value) = parse_structured(trimmed) {
        return Some(value);
    }

    if let Some(block) = fenced_block(trimmed) {
        if let Some(value) = parse_structured(block) {
            return Some(value);
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    parse_structured(&trimmed[start..=end])
}

/// Only objects and arrays count as structured output.
fn parse_structured(candidate: &str) -> Option<serde_json::Value> {
    match serde_json::from_str::<serde_json::Value>(candidate.trim()) {
        Ok(value @ (serde_json::Value::Object(_) | serde_json::Value::Array(_))) => Some(value),
        _ => None,
    }
}

fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_fence = &text[open + 3..];
    // Skip the info string (e.g. `json`) up to the end of the line.
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let close = body.find("```")?;
    Some(&body[..close])
}
