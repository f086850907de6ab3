//! Pulls structured JSON out of free-form model output.

use anyhow::{anyhow, Result};
use serde::de::DeserializeOwned;

/// Locates the first JSON object in `text`.
///
/// A fenced ```` ```json ```` block wins. Otherwise the first balanced `{...}`
/// span counts only if it parses as a JSON object, so prose such as
/// `traces {a sigil}` yields `None`. Braces inside string literals are ignored.
pub fn find_json_object(text: &str) -> Option<&str> {
    if let Some(object) = fenced_block(text).and_then(balanced_object) {
        return Some(object);
    }
    balanced_object(text).filter(|span| {
        matches!(
            serde_json::from_str::<serde_json::Value>(span),
            Ok(serde_json::Value::Object(_))
        )
    })
}

/// Parses the first JSON object in `text` into `T`
pub fn extract_json<T: DeserializeOwned>(text: &str) -> Result<T> {
    let json = find_json_object(text).ok_or_else(|| anyhow!("no JSON object found in response"))?;
    serde_json::from_str(json).map_err(|e| anyhow!("failed to parse JSON response: {}", e))
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```json").map(|i| i + "```json".len())
        .or_else(|| text.find("```").map(|i| i + 3))?;
    let rest = &text[start..];
    let end = rest.find("```")?;
    Some(rest[..end].trim())
}

fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
