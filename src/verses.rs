use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{Result, StylerError};

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Verse {
    #[serde(default, deserialize_with = "lenient_string")]
    pub volume_title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub book_title: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub chapter_number: u32,
    #[serde(default, deserialize_with = "lenient_number")]
    pub verse_number: u32,
    #[serde(default, deserialize_with = "lenient_string")]
    pub scripture_text: String,
}

impl Verse {
    pub fn book(&self) -> &str {
        self.book_title.trim()
    }

    pub fn reference(&self) -> String {
        reference(self.book(), self.chapter_number, self.verse_number)
    }
}

pub fn reference(book: &str, chapter: u32, verse: u32) -> String {
    format!("{book} {chapter}:{verse}")
}

/// Accepts `3`, `3.0` or `"3"`; anything else reads as 0.
fn lenient_number<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let n = match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse::<u64>().unwrap_or(0),
        _ => 0,
    };
    Ok(u32::try_from(n).unwrap_or(u32::MAX))
}

/// `null` reads as "", other scalars as their JSON text.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

pub fn parse_verses(text: &str) -> Result<Vec<Verse>> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| StylerError::load(format!("invalid JSON: {e}")))?;
    match &value {
        Value::Array(items) if !items.is_empty() => {}
        _ => return Err(StylerError::load("Expected JSON array with verses.")),
    }
    serde_json::from_value(value)
        .map_err(|e| StylerError::load(format!("invalid verse record: {e}")))
}

/// Loads verses from an `http(s)://` URL or a local JSON file.
pub async fn load_verses(source: &str) -> Result<Vec<Verse>> {
    let source = source.trim();
    if source.is_empty() {
        return Err(StylerError::load("Enter a JSON URL first."));
    }
    let lower = source.to_ascii_lowercase();
    let text = if lower.starts_with("http://") || lower.starts_with("https://") {
        let resp = reqwest::get(source)
            .await
            .map_err(|e| StylerError::load(format!("fetch {source}: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(StylerError::load(format!("HTTP {}", status.as_u16())));
        }
        resp.text()
            .await
            .map_err(|e| StylerError::load(format!("read body of {source}: {e}")))?
    } else {
        tokio::fs::read_to_string(Path::new(source))
            .await
            .map_err(|e| StylerError::load(format!("read {source}: {e}")))?
    };
    let verses = parse_verses(&text)?;
    tracing::debug!(source, count = verses.len(), "loaded verses");
    Ok(verses)
}

/// Comma-separated list; `None` when nothing but blanks remain.
pub fn parse_list(value: &str) -> Option<Vec<String>> {
    let items: Vec<String> = value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

fn lowered_set(items: Option<&[String]>) -> Option<HashSet<String>> {
    items.map(|list| list.iter().map(|s| s.trim().to_lowercase()).collect())
}

/// Keeps source order. A missing filter list admits everything on that axis.
pub fn filter_verses<'a>(
    all: &'a [Verse],
    volumes: Option<&[String]>,
    books: Option<&[String]>,
) -> Vec<&'a Verse> {
    let vol_set = lowered_set(volumes);
    let book_set = lowered_set(books);
    all.iter()
        .filter(|v| {
            if let Some(set) = vol_set.as_ref() {
                if !set.contains(&v.volume_title.trim().to_lowercase()) {
                    return false;
                }
            }
            if let Some(set) = book_set.as_ref() {
                if !set.contains(&v.book_title.trim().to_lowercase()) {
                    return false;
                }
            }
            true
        })
        .collect()
}

/// All verses of one chapter, ascending by verse number.
pub fn chapter_verses<'a>(all: &'a [Verse], book: &str, chapter: u32) -> Vec<&'a Verse> {
    let book = book.trim();
    let mut rows: Vec<&Verse> = all
        .iter()
        .filter(|v| v.book() == book && v.chapter_number == chapter)
        .collect();
    rows.sort_by_key(|v| v.verse_number);
    rows
}

pub fn find_verse<'a>(all: &'a [Verse], book: &str, chapter: u32, verse: u32) -> Option<&'a Verse> {
    let book = book.trim();
    all.iter()
        .find(|v| v.book() == book && v.chapter_number == chapter && v.verse_number == verse)
}
