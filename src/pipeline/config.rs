use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context};

use crate::config::{
    find_default_config, load_config, AppConfig, CONFIG_ENV, CONFIG_FILENAME,
};
use crate::gateway::ConnectionSettings;
use crate::pipeline::prompts::{
    persona_names, persona_preset, DEFAULT_NOTES_PRESET, DEFAULT_PERSONA,
};
use crate::quality::DEFAULT_MIN_BODY_CHARS;

pub const DEFAULT_TEMPERATURE: f32 = 0.9;
pub const DEFAULT_CONTEXT_PAIRS: usize = 3;
pub const DEFAULT_PACE_MS: u64 = 35;
pub const DEFAULT_STOPS: [&str; 3] = ["Reference:", "AI:", "---"];

/// Command-line values that win over the config file.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub context_pairs: Option<usize>,
    pub persona: Option<String>,
    pub persona_file: Option<PathBuf>,
    pub notes_preset: Option<String>,
}

/// Everything a run needs, resolved once before the run starts.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub config_path: Option<PathBuf>,
    pub connection: ConnectionSettings,
    pub system_prompt: String,
    pub temperature: f32,
    pub context_pairs: usize,
    pub stop: Vec<String>,
    pub min_body_chars: usize,
    pub pace: Duration,
    pub trace_dir: PathBuf,
    pub trace_prompts: bool,
    pub log_max_chars: usize,
    pub notes_preset: String,
}

impl PipelineConfig {
    /// Built-in defaults around the given persona prompt.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            config_path: None,
            connection: AppConfig::default().connection.resolve(None),
            system_prompt: system_prompt.into(),
            temperature: DEFAULT_TEMPERATURE,
            context_pairs: DEFAULT_CONTEXT_PAIRS,
            stop: DEFAULT_STOPS.iter().map(|s| s.to_string()).collect(),
            min_body_chars: DEFAULT_MIN_BODY_CHARS,
            pace: Duration::from_millis(DEFAULT_PACE_MS),
            trace_dir: PathBuf::from("_trace"),
            trace_prompts: false,
            log_max_chars: 240,
            notes_preset: DEFAULT_NOTES_PRESET.to_string(),
        }
    }

    pub fn from_overrides(overrides: ConfigOverrides) -> anyhow::Result<Self> {
        let cfg_file = overrides
            .config_path
            .clone()
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from))
            .or_else(|| find_default_config(CONFIG_FILENAME));

        let mut file_cfg = AppConfig::default();
        if let Some(p) = cfg_file.as_ref() {
            if p.exists() {
                file_cfg = load_config(p)?;
            } else if overrides.config_path.is_some() {
                return Err(anyhow!("config file not found: {}", p.display()));
            }
        }
        Self::from_app_config(&file_cfg, cfg_file, overrides)
    }

    pub fn from_app_config(
        file_cfg: &AppConfig,
        config_path: Option<PathBuf>,
        overrides: ConfigOverrides,
    ) -> anyhow::Result<Self> {
        let config_dir = config_path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let system_prompt = resolve_persona(file_cfg, &config_dir, &overrides)?;
        let connection = file_cfg.connection.resolve(overrides.model.clone());

        let p = &file_cfg.pipeline;
        let temperature = overrides
            .temperature
            .or(p.temperature)
            .unwrap_or(DEFAULT_TEMPERATURE);
        if !temperature.is_finite() || temperature < 0.0 {
            return Err(anyhow!("invalid temperature: {temperature}"));
        }
        let context_pairs = overrides
            .context_pairs
            .or(p.context_pairs)
            .unwrap_or(DEFAULT_CONTEXT_PAIRS);
        let stop = p
            .stop
            .clone()
            .unwrap_or_else(|| DEFAULT_STOPS.iter().map(|s| s.to_string()).collect())
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let min_body_chars = p.min_body_chars.unwrap_or(DEFAULT_MIN_BODY_CHARS);
        let pace = Duration::from_millis(p.pace_ms.unwrap_or(DEFAULT_PACE_MS));
        let trace_dir = PathBuf::from(p.trace_dir.clone().unwrap_or_else(|| "_trace".to_string()));
        let trace_prompts = p.trace_prompts.unwrap_or(false);
        let log_max_chars = p.log_max_chars.unwrap_or(240);
        let notes_preset = overrides
            .notes_preset
            .or_else(|| file_cfg.notes.preset.clone())
            .unwrap_or_else(|| DEFAULT_NOTES_PRESET.to_string());

        Ok(Self {
            config_path,
            connection,
            system_prompt,
            temperature,
            context_pairs,
            stop,
            min_body_chars,
            pace,
            trace_dir,
            trace_prompts,
            log_max_chars,
            notes_preset,
        })
    }
}

fn named_persona(name: &str) -> anyhow::Result<String> {
    persona_preset(name).ok_or_else(|| {
        anyhow!(
            "unknown persona preset: {name} (available: {})",
            persona_names().join(", ")
        )
    })
}

fn read_persona_file(path: &Path) -> anyhow::Result<String> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read persona: {}", path.display()))?;
    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(anyhow!("persona file is empty: {}", path.display()));
    }
    Ok(text)
}

fn resolve_persona(
    file_cfg: &AppConfig,
    config_dir: &Path,
    overrides: &ConfigOverrides,
) -> anyhow::Result<String> {
    if let Some(p) = overrides.persona_file.as_ref() {
        return read_persona_file(p);
    }
    if let Some(name) = overrides.persona.as_deref() {
        return named_persona(name);
    }
    let persona = &file_cfg.persona;
    if let Some(rel) = persona
        .system_prompt_file
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        let mut p = PathBuf::from(rel);
        if p.is_relative() {
            p = config_dir.join(p);
        }
        return read_persona_file(&p);
    }
    if let Some(text) = persona
        .system_prompt
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return Ok(text.to_string());
    }
    named_persona(persona.preset.as_deref().unwrap_or(DEFAULT_PERSONA))
}

pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create config dir: {}", dir.display()))?;
    let cfg_path = dir.join(CONFIG_FILENAME);
    if cfg_path.exists() && !force {
        return Ok(cfg_path);
    }
    std::fs::write(&cfg_path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("write config: {}", cfg_path.display()))?;
    Ok(cfg_path)
}

const DEFAULT_CONFIG_TOML: &str = r#"[connection]
endpoint_base = "https://api.openai.com/v1"
endpoint_path = "/chat/completions"
# Full URL instead of base + path (Azure style deployments):
# completions_url = "https://YOUR-RESOURCE.openai.azure.com/openai/deployments/YOUR-DEPLOYMENT/chat/completions?api-version=2024-02-01"
# Leave auth_header empty for local servers that take no key.
auth_header = "Authorization"
auth_prefix = "Bearer "
# api_key = "sk-..."   (or set SCRIPTURE_STYLER_API_KEY)
model = "gpt-4o-mini"
# max_tokens = 400
# timeout_secs = 120

[connection.extra_headers]
# "HTTP-Referer" = "https://example.org"

[pipeline]
temperature = 0.9
# Prior verses compared for repeated openings. 0 disables the check.
context_pairs = 3
stop = ["Reference:", "AI:", "---"]
min_body_chars = 6
pace_ms = 35

trace_dir = "_trace"
trace_prompts = false
log_max_chars = 240

[persona]
preset = "stoner"
# system_prompt = "You are rewriting each scripture verse ..."
# system_prompt_file = "persona.txt"

[notes]
# outline | exegetical | sermon | youth | academic
preset = "outline"
"#;
