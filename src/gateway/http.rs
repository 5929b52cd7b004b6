use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use url::Url;

use super::{ChatGateway, GenerationRequest};
use crate::error::{Result, StylerError};

static CHAT_COMPLETIONS_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)/chat/completions(\?|$)").expect("completions suffix"));

pub const DEFAULT_ENDPOINT_PATH: &str = "/chat/completions";

/// Where and how to reach an OpenAI-compatible chat-completions endpoint.
#[derive(Clone, Debug, Default)]
pub struct ConnectionSettings {
    pub endpoint_base: String,
    pub endpoint_path: String,
    /// Full URL; wins over base + path when set.
    pub completions_url: String,
    /// Blank means the endpoint takes no API key.
    pub auth_header: String,
    pub auth_prefix: String,
    pub api_key: Option<String>,
    pub model: String,
    pub extra_headers: BTreeMap<String, String>,
    pub max_tokens: Option<u32>,
    pub timeout: Option<Duration>,
}

impl ConnectionSettings {
    pub fn requires_api_key(&self) -> bool {
        !self.auth_header.trim().is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(StylerError::config("Select a model or type a custom id."));
        }
        if self.completions_url.trim().is_empty() && self.endpoint_base.trim().is_empty() {
            return Err(StylerError::config(
                "Provide an API base or a full completions URL.",
            ));
        }
        let has_key = self
            .api_key
            .as_deref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false);
        if self.requires_api_key() && !has_key {
            return Err(StylerError::config("API key required for this provider."));
        }
        Ok(())
    }
}

pub fn resolve_completions_target(settings: &ConnectionSettings) -> Result<Url> {
    let invalid =
        |e: url::ParseError| StylerError::config(format!("Invalid endpoint or path: {e}"));

    let full = settings.completions_url.trim();
    if !full.is_empty() {
        let target = if CHAT_COMPLETIONS_SUFFIX_RE.is_match(full) {
            full.to_string()
        } else {
            format!("{}{DEFAULT_ENDPOINT_PATH}", full.trim_end_matches('/'))
        };
        return Url::parse(&target).map_err(invalid);
    }

    let base = settings.endpoint_base.trim();
    if base.is_empty() {
        return Err(StylerError::config(
            "Provide an API base or a full completions URL.",
        ));
    }
    let path = match settings.endpoint_path.trim() {
        "" => DEFAULT_ENDPOINT_PATH,
        p => p,
    };
    let lower = path.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Url::parse(path).map_err(invalid);
    }
    let base = if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{base}/")
    };
    Url::parse(&base)
        .and_then(|b| b.join(path.trim_start_matches('/')))
        .map_err(invalid)
}

/// Turns an upstream status + body into reply text or a gateway error.
pub fn interpret_completion(status: u16, body: &str) -> Result<String> {
    let ok = (200..300).contains(&status);
    let json: Value = if body.trim().is_empty() {
        Value::Object(Default::default())
    } else {
        match serde_json::from_str(body) {
            Ok(v) => v,
            Err(_) if ok => return Ok(body.trim().to_string()),
            Err(_) => return Err(StylerError::gateway(Some(status), body.trim())),
        }
    };

    if !ok {
        let message = json
            .pointer("/error/message")
            .and_then(Value::as_str)
            .or_else(|| json.get("message").and_then(Value::as_str))
            .or_else(|| json.get("error").and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| format!("LLM request failed ({status})"));
        return Err(StylerError::gateway(Some(status), message));
    }

    let text = json
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .or_else(|| json.pointer("/choices/0/text").and_then(Value::as_str))
        .filter(|s| !s.is_empty())
        .or_else(|| json.get("content").and_then(Value::as_str))
        .filter(|s| !s.is_empty())
        .or_else(|| json.get("output_text").and_then(Value::as_str))
        .unwrap_or_default();
    Ok(text.trim().to_string())
}

pub struct HttpChatGateway {
    settings: ConnectionSettings,
    url: Url,
    client: reqwest::Client,
}

impl HttpChatGateway {
    /// Validates the settings up front so a misconfigured run never touches the network.
    pub fn new(settings: ConnectionSettings) -> Result<Self> {
        settings.validate()?;
        let url = resolve_completions_target(&settings)?;
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| StylerError::config(format!("build http client: {e}")))?;
        Ok(Self {
            settings,
            url,
            client,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn model(&self) -> &str {
        self.settings.model.trim()
    }

    fn request_body(&self, request: &GenerationRequest) -> Value {
        let mut body = json!({
            "model": self.model(),
            "messages": request.messages(),
            "temperature": request.temperature,
        });
        if let Some(max_tokens) = self.settings.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if !request.stop.is_empty() {
            body["stop"] = json!(request.stop);
        }
        body
    }
}

#[async_trait]
impl ChatGateway for HttpChatGateway {
    async fn chat(&self, request: &GenerationRequest) -> Result<String> {
        let mut req = self
            .client
            .post(self.url.clone())
            .header("Content-Type", "application/json");
        if self.settings.requires_api_key() {
            if let Some(key) = self.settings.api_key.as_deref() {
                req = req.header(
                    self.settings.auth_header.trim(),
                    format!("{}{}", self.settings.auth_prefix, key.trim()),
                );
            }
        }
        for (k, v) in &self.settings.extra_headers {
            req = req.header(k.as_str(), v.as_str());
        }

        tracing::debug!(
            url = %self.url,
            model = self.model(),
            temperature = request.temperature,
            "chat request"
        );
        let resp = req
            .json(&self.request_body(request))
            .send()
            .await
            .map_err(|e| StylerError::gateway(None, format!("LLM request failed: {e}")))?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| StylerError::gateway(Some(status), format!("read LLM response: {e}")))?;

        let out = interpret_completion(status, &body);
        if let Err(e) = &out {
            tracing::warn!(status, error = %e, "chat request failed");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn openai() -> ConnectionSettings {
        ConnectionSettings {
            endpoint_base: "https://api.openai.com/v1".to_string(),
            endpoint_path: "/chat/completions".to_string(),
            auth_header: "Authorization".to_string(),
            auth_prefix: "Bearer ".to_string(),
            api_key: Some("sk-test".to_string()),
            model: "gpt-4o-mini".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn base_and_path_are_joined() {
        let url = resolve_completions_target(&openai()).expect("url");
        assert_eq!(url.as_str(), "https://api.openai.com/v1/chat/completions");

        let mut s = openai();
        s.endpoint_base = "http://localhost:1234/v1/".to_string();
        s.endpoint_path = "chat/completions".to_string();
        let url = resolve_completions_target(&s).expect("url");
        assert_eq!(url.as_str(), "http://localhost:1234/v1/chat/completions");
    }

    #[test]
    fn full_url_is_completed_when_needed() {
        let mut s = openai();
        s.completions_url =
            "https://res.openai.azure.com/openai/deployments/d/chat/completions?api-version=2024-02-01"
                .to_string();
        let url = resolve_completions_target(&s).expect("url");
        assert_eq!(url.query(), Some("api-version=2024-02-01"));

        s.completions_url = "https://openrouter.ai/api/v1//".to_string();
        let url = resolve_completions_target(&s).expect("url");
        assert_eq!(url.as_str(), "https://openrouter.ai/api/v1/chat/completions");
    }

    #[test]
    fn invalid_base_is_a_config_error() {
        let mut s = openai();
        s.endpoint_base = "not a url".to_string();
        assert!(matches!(
            resolve_completions_target(&s),
            Err(StylerError::Config(_))
        ));
    }

    #[test]
    fn validation_catches_missing_settings() {
        let mut s = openai();
        s.api_key = None;
        let err = s.validate().unwrap_err();
        assert_eq!(err.to_string(), "API key required for this provider.");

        s.auth_header = String::new();
        assert!(s.validate().is_ok());

        s.model = " ".to_string();
        assert_eq!(
            s.validate().unwrap_err().to_string(),
            "Select a model or type a custom id."
        );

        let mut s = openai();
        s.endpoint_base.clear();
        assert!(matches!(HttpChatGateway::new(s), Err(StylerError::Config(_))));
    }

    #[test]
    fn completion_text_is_extracted() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"  [Genesis 1:1] Hey  "}}]}"#;
        assert_eq!(interpret_completion(200, body).expect("text"), "[Genesis 1:1] Hey");
        assert_eq!(
            interpret_completion(200, r#"{"choices":[{"text":"legacy"}]}"#).expect("text"),
            "legacy"
        );
        assert_eq!(interpret_completion(200, r#"{"output_text":"resp"}"#).expect("text"), "resp");
        assert_eq!(interpret_completion(200, "plain words").expect("text"), "plain words");
        assert_eq!(interpret_completion(200, "{}").expect("text"), "");
    }

    #[test]
    fn upstream_errors_carry_message_and_status() {
        let err = interpret_completion(401, r#"{"error":{"message":"Invalid key"}}"#).unwrap_err();
        match err {
            StylerError::Gateway { status, message } => {
                assert_eq!(status, Some(401));
                assert_eq!(message, "Invalid key");
            }
            other => panic!("unexpected {other:?}"),
        }
        let err = interpret_completion(502, "").unwrap_err();
        assert_eq!(err.to_string(), "LLM request failed (502)");
        let err = interpret_completion(500, "<html>boom</html>").unwrap_err();
        assert_eq!(err.to_string(), "<html>boom</html>");
    }

    #[test]
    fn body_carries_stop_and_max_tokens() {
        let mut s = openai();
        s.max_tokens = Some(200);
        let gw = HttpChatGateway::new(s).expect("gateway");
        let req = GenerationRequest {
            system_prompt: "sys".to_string(),
            user_prompt: "usr".to_string(),
            temperature: 0.5,
            stop: vec!["AI:".to_string()],
        };
        let body = gw.request_body(&req);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "usr");
        assert_eq!(body["max_tokens"], 200);
        assert_eq!(body["stop"][0], "AI:");

        let bare = GenerationRequest { stop: Vec::new(), ..req };
        assert!(gw.request_body(&bare).get("stop").is_none());
    }
}
