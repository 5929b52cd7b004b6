use std::collections::HashSet;

use crate::textutil::opening_ngram;

pub const DEFAULT_MIN_BODY_CHARS: usize = 6;
pub const OPENING_NGRAM_SIZE: usize = 4;

/// Text after the expected prefix, trimmed.
pub fn line_body<'a>(line: &'a str, prefix: &str) -> &'a str {
    match line.strip_prefix(prefix) {
        Some(rest) => rest.trim(),
        None => {
            let skip = prefix.chars().count();
            let start = line
                .char_indices()
                .nth(skip)
                .map(|(i, _)| i)
                .unwrap_or(line.len());
            line[start..].trim()
        }
    }
}

#[must_use]
pub fn body_ok(line: &str, prefix: &str, min_chars: usize) -> bool {
    line_body(line, prefix).chars().count() >= min_chars
}

/// Text after the first `]` of a committed line; empty when there is none.
fn bracket_body(line: &str) -> &str {
    line.split_once(']').map(|(_, rest)| rest).unwrap_or("")
}

/// Remembers how recent lines open so a new line that starts the same way can be regenerated.
#[derive(Clone, Debug, Default)]
pub struct RepetitionGuard {
    starts: HashSet<String>,
    size: usize,
}

impl RepetitionGuard {
    pub fn from_lines<'a, I>(lines: I, size: usize) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let starts = lines
            .into_iter()
            .map(|line| opening_ngram(bracket_body(line), size))
            .collect();
        Self { starts, size }
    }

    pub fn fingerprint(&self, line: &str) -> String {
        opening_ngram(bracket_body(line), self.size)
    }

    #[must_use]
    pub fn collides(&self, line: &str) -> bool {
        if self.starts.is_empty() {
            return false;
        }
        self.starts.contains(&self.fingerprint(line))
    }
}
