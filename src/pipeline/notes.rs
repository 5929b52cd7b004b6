use crate::error::{Result, StylerError};
use crate::gateway::{ChatGateway, GenerationRequest};

use super::prompts::{build_notes_prompt, NOTES_SYSTEM_PROMPT};

const NOTES_FALLBACK_TEMPERATURE: f32 = 0.4;

/// Notes run cooler than restyling: 0.2..=0.7, 0.4 when unset.
pub fn notes_temperature(base: f32) -> f32 {
    let t = if base.is_nan() || base == 0.0 {
        NOTES_FALLBACK_TEMPERATURE
    } else {
        base
    };
    t.clamp(0.2, 0.7)
}

/// Markdown study notes for a restyled passage.
pub async fn generate_notes(
    gateway: &dyn ChatGateway,
    passage: &str,
    preset: &str,
    base_temperature: f32,
) -> Result<String> {
    let passage = passage.trim();
    if passage.is_empty() {
        return Err(StylerError::selection(
            "No styled output to analyze. Run single or chapter first.",
        ));
    }
    let request = GenerationRequest {
        system_prompt: NOTES_SYSTEM_PROMPT.to_string(),
        user_prompt: build_notes_prompt(passage, preset),
        temperature: notes_temperature(base_temperature),
        stop: Vec::new(),
    };
    tracing::debug!(preset, temperature = request.temperature, "generate notes");
    gateway.chat(&request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::scripted::ScriptedGateway;
    use crate::pipeline::prompts::notes_instructions;

    #[test]
    fn temperature_is_clamped() {
        assert_eq!(notes_temperature(0.0), 0.4);
        assert_eq!(notes_temperature(f32::NAN), 0.4);
        assert_eq!(notes_temperature(0.9), 0.7);
        assert_eq!(notes_temperature(0.1), 0.2);
        assert_eq!(notes_temperature(0.5), 0.5);
    }

    #[tokio::test]
    async fn notes_request_carries_passage_and_preset() {
        let gw = ScriptedGateway::with_replies(vec![Ok("## Summary\nLight shows up.".to_string())]);
        let notes = generate_notes(&gw, "[Genesis 1:3] Light, dude.\n", "youth", 0.9)
            .await
            .expect("notes");
        assert_eq!(notes, "## Summary\nLight shows up.");

        let call = &gw.calls()[0];
        assert_eq!(call.system_prompt, NOTES_SYSTEM_PROMPT);
        assert!(call.user_prompt.contains("[Genesis 1:3] Light, dude."));
        assert!(call.user_prompt.ends_with(notes_instructions("youth")));
        assert_eq!(call.temperature, 0.7);
        assert!(call.stop.is_empty());
    }

    #[tokio::test]
    async fn empty_passage_is_rejected_without_a_call() {
        let gw = ScriptedGateway::with_replies(Vec::new());
        let err = generate_notes(&gw, "  \n", "outline", 0.9).await.unwrap_err();
        assert!(matches!(err, StylerError::Selection(_)));
        assert!(gw.calls().is_empty());
    }
}
