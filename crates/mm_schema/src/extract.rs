//! Pull a JSON document out of free-form model output.

use serde_json::Value;

/// Extract the JSON document from a model response.
///
/// Tries, in order: the whole response, the first fenced code block, and the
/// span from the first `{` to the last `}`.
pub fn extract_json(raw: &str) -> Result<Value, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("Response is empty".to_string());
    }

    let direct_error = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => return Ok(value),
        Err(e) => e.to_string(),
    };

    if let Some(block) = fenced_block(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(block.trim()) {
            return Ok(value);
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            return serde_json::from_str::<Value>(&trimmed[start..=end])
                .map_err(|e| format!("Invalid JSON object: {}", e));
        }
    }

    Err(format!("No JSON object found in response ({})", direct_error))
}

/// Body of the first ``` fenced block, without its language tag.
pub(crate) fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_open = &text[open + 3..];
    let body_start = after_open.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_open[body_start..];
    let close = body.find("```")?;
    Some(&body[..close])
}
