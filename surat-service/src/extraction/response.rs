//! Recovering structured data from free-form backend replies.

use regex::Regex;
use serde_json::{Map, Value};

/// Remove a surrounding markdown code fence (```` ```json ... ``` ````)
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the info string (e.g. "json") on the opening line
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };

    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Locate the first balanced `{...}` span, honouring string literals
pub fn find_json_object(text: &str) -> Option<&str> {
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
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Parse a reply into a JSON object: whole reply first, then the first
/// balanced object inside it.
pub fn parse_json_object(reply: &str) -> Option<Map<String, Value>> {
    let stripped = strip_code_fence(reply);

    if let Ok(Value::Object(map)) = serde_json::from_str(stripped) {
        return Some(map);
    }

    let span = find_json_object(stripped)?;
    match serde_json::from_str(span) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Render a JSON value as a field value; null-like values become `None`
pub fn value_to_field(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(value_to_field)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => value.to_string(),
    };

    if text.is_empty() || text.eq_ignore_ascii_case("null") || text == "-" {
        None
    } else {
        Some(text)
    }
}

/// Scrape `"field": "value"` pairs out of a reply that is not valid JSON
pub fn scan_quoted_pairs(reply: &str, fields: &[&str]) -> Vec<(String, String)> {
    fields
        .iter()
        .filter_map(|field| {
            let pattern = format!(r#""{}"[:\s]*"([^"]+)""#, regex::escape(field));
            let re = Regex::new(&pattern).ok()?;
            let value = re.captures(reply)?.get(1)?.as_str().trim();
            if value.is_empty() || value.eq_ignore_ascii_case("null") {
                None
            } else {
                Some(((*field).to_string(), value.to_string()))
            }
        })
        .collect()
}
