//! Chat-completion gateway consumed by the restyle pipeline and the notes generator.

mod http;

pub use http::{
    interpret_completion, resolve_completions_target, ConnectionSettings, HttpChatGateway,
};

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// One single-turn call: system prompt + user prompt at a given temperature.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub stop: Vec<String>,
}

impl GenerationRequest {
    pub fn messages(&self) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(&self.system_prompt),
            ChatMessage::user(&self.user_prompt),
        ]
    }
}

/// Returns the model's reply text, trimmed. Any failure is fatal to the current run.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn chat(&self, request: &GenerationRequest) -> Result<String>;
}

#[cfg(test)]
pub(crate) mod scripted {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::{ChatGateway, GenerationRequest};
    use crate::error::{Result, StylerError};

    type Responder = Box<dyn Fn(&GenerationRequest) -> Result<String> + Send + Sync>;

    /// Replays queued replies first, then falls back to the responder.
    pub(crate) struct ScriptedGateway {
        replies: Mutex<VecDeque<Result<String>>>,
        responder: Option<Responder>,
        calls: Mutex<Vec<GenerationRequest>>,
    }

    impl ScriptedGateway {
        pub(crate) fn with_replies(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                responder: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn with_responder<F>(f: F) -> Self
        where
            F: Fn(&GenerationRequest) -> Result<String> + Send + Sync + 'static,
        {
            Self {
                replies: Mutex::new(VecDeque::new()),
                responder: Some(Box::new(f)),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn calls(&self) -> Vec<GenerationRequest> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    #[async_trait]
    impl ChatGateway for ScriptedGateway {
        async fn chat(&self, request: &GenerationRequest) -> Result<String> {
            self.calls.lock().expect("calls lock").push(request.clone());
            if let Some(reply) = self.replies.lock().expect("replies lock").pop_front() {
                return reply;
            }
            match self.responder.as_ref() {
                Some(f) => f(request),
                None => Err(StylerError::gateway(None, "script exhausted")),
            }
        }
    }

    /// Reads the reference back out of a restyle user prompt.
    pub(crate) fn prompt_reference(request: &GenerationRequest) -> String {
        request
            .user_prompt
            .strip_prefix("Reference: ")
            .and_then(|rest| rest.split('\n').next())
            .unwrap_or_default()
            .to_string()
    }
}
