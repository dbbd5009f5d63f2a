//! Chat-completion based theme classifier.

use super::{Classifier, ThemedSpan};
use crate::config::{OpenAISettings, Prompts};
use crate::error::{Result, UndertoneError};
use crate::openai::create_client_with_timeout;
use crate::transcription::Transcript;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Classifies transcript segments into themes with a chat model.
pub struct LlmClassifier {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    prompts: Prompts,
}

impl LlmClassifier {
    pub fn with_config(settings: &OpenAISettings, prompts: Prompts) -> Result<Self> {
        Ok(Self {
            client: create_client_with_timeout(Duration::from_secs(settings.timeout_secs))?,
            model: settings.classification_model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            prompts,
        })
    }

    fn build_messages(&self, transcript: &Transcript) -> Result<Vec<ChatCompletionRequestMessage>> {
        let mut vars = HashMap::new();
        vars.insert("segments".to_string(), transcript.format_for_classification());
        vars.insert("source".to_string(), transcript.source_id.clone());

        let system_message = self
            .prompts
            .render_with_custom(&self.prompts.classification.system, &vars);
        let user_message = self
            .prompts
            .render_with_custom(&self.prompts.classification.user, &vars);

        Ok(vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system_message)
                .build()
                .map_err(|e| UndertoneError::Classification(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_message)
                .build()
                .map_err(|e| UndertoneError::Classification(e.to_string()))?
                .into(),
        ])
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    #[instrument(skip_all, fields(source = %transcript.source_id))]
    async fn classify(&self, transcript: &Transcript) -> Result<Vec<ThemedSpan>> {
        if transcript.is_empty() {
            return Ok(Vec::new());
        }

        info!("Classifying {} segments with {}", transcript.segments.len(), self.model);

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(self.build_messages(transcript)?)
            .temperature(self.temperature)
            .max_completion_tokens(self.max_tokens)
            .build()
            .map_err(|e| UndertoneError::Classification(e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            UndertoneError::OpenAI(format!("Failed to get classification response: {}", e))
        })?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| UndertoneError::Classification("Empty response from LLM".to_string()))?;

        debug!("LLM classification response: {}", truncate(content, 500));

        parse_spans(content)
    }
}

/// Parse a classifier response into spans.
///
/// Accepts a bare JSON array, an array wrapped in a ```` ```json ```` or
/// ```` ``` ```` fence, or an array embedded in surrounding prose.
pub fn parse_spans(response: &str) -> Result<Vec<ThemedSpan>> {
    let text = strip_code_fence(response.trim());

    let json_str = match (text.find('['), text.rfind(']')) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        _ => text,
    };

    serde_json::from_str(json_str).map_err(|e| {
        UndertoneError::Classification(format!(
            "Failed to parse classification response: {}. Response was: {}",
            e,
            truncate(response, 500)
        ))
    })
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    match rest.find("```") {
        Some(end) => &rest[..end],
        None => rest,
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_array() {
        let json = r#"[
            {"start": 0, "end": 30, "theme": "Hook"},
            {"start": 30.5, "end": 90, "theme": "What"}
        ]"#;

        let spans = parse_spans(json).unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0], ThemedSpan::new(0.0, 30.0, "Hook"));
        assert_eq!(spans[1].start_ms(), 30_500);
    }

    #[test]
    fn test_parse_json_fence() {
        let response = "```json\n[{\"start\": 0, \"end\": 12.5, \"theme\": \"Ending Hook\"}]\n```";
        let spans = parse_spans(response).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].theme, "Ending Hook");
    }

    #[test]
    fn test_parse_bare_fence() {
        let response = "```\n[{\"start\": 1, \"end\": 2, \"theme\": \"Why\"}]\n```";
        assert_eq!(parse_spans(response).unwrap()[0].theme, "Why");
    }

    #[test]
    fn test_parse_with_prose() {
        let response = r#"Here are the groups:
[{"start": 0, "end": 10, "theme": "How"}]
Let me know if you need anything else."#;
        assert_eq!(parse_spans(response).unwrap().len(), 1);
    }

    #[test]
    fn test_parse_missing_theme_defaults_empty() {
        let spans = parse_spans(r#"[{"start": 0, "end": 10}]"#).unwrap();
        assert_eq!(spans[0].theme, "");
        assert_eq!(spans[0].parsed_theme(), None);
    }

    #[test]
    fn test_parse_invalid() {
        let err = parse_spans("I could not classify this transcript.").unwrap_err();
        assert!(err.to_string().contains("Failed to parse classification response"));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
