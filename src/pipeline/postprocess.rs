use regex::Regex;

use crate::textutil::sanitize_one_line;

/// Pulls the `[Book C:V] ...` line out of a raw reply and forces it into one clean line
/// that starts with `expected_prefix`.
pub fn postprocess_line(raw: &str, expected_prefix: &str) -> String {
    if raw.trim().is_empty() {
        return expected_prefix.to_string();
    }

    let pattern = format!("{}[^\\n\\r]*", regex::escape(expected_prefix));
    let picked = match Regex::new(&pattern) {
        Ok(re) => re.find(raw).map(|m| m.as_str()).unwrap_or(raw),
        Err(_) => raw,
    };

    let text = sanitize_one_line(picked);
    if text.starts_with(expected_prefix) {
        return text;
    }
    let body = text.trim_start_matches(['[', '"', '\'']).trim();
    format!("{expected_prefix} {body}")
}
