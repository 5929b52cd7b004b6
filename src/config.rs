use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::gateway::ConnectionSettings;

pub const CONFIG_FILENAME: &str = "scripture-styler.toml";
pub const CONFIG_ENV: &str = "SCRIPTURE_STYLER_CONFIG";
pub const API_KEY_ENV: &str = "SCRIPTURE_STYLER_API_KEY";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub connection: ConnectionSection,
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub persona: PersonaSection,
    #[serde(default)]
    pub notes: NotesSection,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ConnectionSection {
    #[serde(default)]
    pub endpoint_base: Option<String>,
    #[serde(default)]
    pub endpoint_path: Option<String>,
    /// Full chat-completions URL (Azure style); overrides base + path.
    #[serde(default)]
    pub completions_url: Option<String>,
    /// Header carrying the key. Set to "" for endpoints without auth (local servers).
    #[serde(default)]
    pub auth_header: Option<String>,
    #[serde(default)]
    pub auth_prefix: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub extra_headers: BTreeMap<String, String>,
}

impl ConnectionSection {
    pub fn resolve(&self, model_override: Option<String>) -> ConnectionSettings {
        let api_key = self
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty());
        ConnectionSettings {
            endpoint_base: self
                .endpoint_base
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            endpoint_path: self
                .endpoint_path
                .clone()
                .unwrap_or_else(|| "/chat/completions".to_string()),
            completions_url: self.completions_url.clone().unwrap_or_default(),
            auth_header: self
                .auth_header
                .clone()
                .unwrap_or_else(|| "Authorization".to_string()),
            auth_prefix: self
                .auth_prefix
                .clone()
                .unwrap_or_else(|| "Bearer ".to_string()),
            api_key,
            model: model_override
                .or_else(|| self.model.clone())
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            extra_headers: self.extra_headers.clone(),
            max_tokens: self.max_tokens,
            timeout: self.timeout_secs.map(Duration::from_secs),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PipelineSection {
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Prior exchanges kept for repetition detection. 0 disables the guard.
    #[serde(default)]
    pub context_pairs: Option<usize>,
    #[serde(default)]
    pub stop: Option<Vec<String>>,
    #[serde(default)]
    pub min_body_chars: Option<usize>,
    /// Delay between verses, in milliseconds.
    #[serde(default)]
    pub pace_ms: Option<u64>,

    #[serde(default)]
    pub trace_dir: Option<String>,
    #[serde(default)]
    pub trace_prompts: Option<bool>,
    #[serde(default)]
    pub log_max_chars: Option<usize>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PersonaSection {
    #[serde(default)]
    pub preset: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub system_prompt_file: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct NotesSection {
    #[serde(default)]
    pub preset: Option<String>,
}

pub fn find_file_upwards(start: &Path, filename: &str, max_depth: usize) -> Option<PathBuf> {
    let mut dir = Some(start);
    for _ in 0..=max_depth {
        let d = dir?;
        let cand = d.join(filename);
        if cand.is_file() {
            return Some(cand);
        }
        dir = d.parent();
    }
    None
}

pub fn find_default_config(filename: &str) -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, filename, 8) {
            return Some(p);
        }
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            if let Some(p) = find_file_upwards(dir, filename, 10) {
                return Some(p);
            }
        }
    }
    None
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    parse_config(&text).with_context(|| format!("parse config toml: {}", path.display()))
}

pub fn parse_config(text: &str) -> anyhow::Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(text)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = parse_config("").expect("parse");
        let conn = cfg.connection.resolve(None);
        assert_eq!(conn.endpoint_base, "https://api.openai.com/v1");
        assert_eq!(conn.auth_header, "Authorization");
        assert_eq!(conn.model, "gpt-4o-mini");
        assert!(cfg.pipeline.temperature.is_none());
    }

    #[test]
    fn sections_are_read() {
        let cfg = parse_config(
            r#"
[connection]
endpoint_base = "http://localhost:11434/v1"
auth_header = ""
model = "llama3"
timeout_secs = 30

[connection.extra_headers]
"X-Title" = "styler"

[pipeline]
temperature = 0.7
context_pairs = 0
stop = ["AI:"]

[persona]
preset = "pirate"

[notes]
preset = "sermon"
"#,
        )
        .expect("parse");
        let conn = cfg.connection.resolve(Some("qwen".to_string()));
        assert_eq!(conn.model, "qwen");
        assert!(!conn.requires_api_key());
        assert!(conn.validate().is_ok());
        assert_eq!(conn.timeout, Some(Duration::from_secs(30)));
        assert_eq!(conn.extra_headers.get("X-Title").map(String::as_str), Some("styler"));
        assert_eq!(cfg.pipeline.context_pairs, Some(0));
        assert_eq!(cfg.pipeline.stop.as_deref(), Some(&["AI:".to_string()][..]));
        assert_eq!(cfg.persona.preset.as_deref(), Some("pirate"));
        assert_eq!(cfg.notes.preset.as_deref(), Some("sermon"));
    }

    #[test]
    fn finds_config_in_parent_dir() {
        let root = tempfile::tempdir().expect("tempdir");
        let nested = root.path().join("a").join("b");
        std::fs::create_dir_all(&nested).expect("mkdir");
        std::fs::write(root.path().join(CONFIG_FILENAME), "").expect("write");
        let found = find_file_upwards(&nested, CONFIG_FILENAME, 4).expect("found");
        assert_eq!(found, root.path().join(CONFIG_FILENAME));
        assert!(find_file_upwards(&nested, CONFIG_FILENAME, 1).is_none());
    }
}
