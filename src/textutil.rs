use once_cell::sync::Lazy;
use regex::Regex;

static TRAILING_COMMENTARY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*---.*$").expect("trailing commentary"));
static LEADING_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:AI|Answer|Output)\s*:\s*").expect("leading label"));
static REFERENCE_TRAILER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*Reference\s*:.*$").expect("reference trailer"));

/// Code points at or above this are dropped from model output (box drawing, symbols, emoji).
pub const HIGH_CODEPOINT_CUTOFF: u32 = 0x2500;

/// Folds typographic punctuation to plain ASCII. Dashes become `---`.
pub fn normalize_ascii(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\u{2018}' | '\u{2019}' => out.push('\''),
            '\u{201C}' | '\u{201D}' => out.push('"'),
            '\u{2013}' | '\u{2014}' => out.push_str("---"),
            '\u{00A0}' => out.push(' '),
            _ => out.push(ch),
        }
    }
    out
}

/// Reduces a model reply to one clean line: no newlines, no `AI:` style label,
/// no `--- ...` or `Reference: ...` tail, no high-plane symbols.
pub fn sanitize_one_line(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let s = normalize_ascii(text);
    let s = s.replace(['\r', '\n'], " ");
    let s = s.trim();
    let s = TRAILING_COMMENTARY_RE.replace(s, "");
    let s = LEADING_LABEL_RE.replace(&s, "");
    let s = REFERENCE_TRAILER_RE.replace(&s, "");
    let s: String = s
        .chars()
        .filter(|ch| (*ch as u32) < HIGH_CODEPOINT_CUTOFF)
        .collect();
    s.trim().to_string()
}

/// First `size` whitespace tokens, lower-cased and joined by single spaces.
pub fn opening_ngram(text: &str, size: usize) -> String {
    text.split_whitespace()
        .take(size)
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}
