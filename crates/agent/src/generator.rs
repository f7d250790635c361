//! Reply generation: turns an accepted entry into a finished reply.

use std::sync::Arc;

use chrono::Utc;
use feedreply_config::AppConfig;
use feedreply_core::error::GenerationError;
use feedreply_core::message::{ContentPart, Message};
use feedreply_core::provider::{Provider, ProviderRequest};
use feedreply_core::reply::{ReplyResult, detect_language};
use feedreply_providers::Suggestion;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::prompts::{self, ScenarioContext};
use crate::stream_event::LoopEvent;

/// What to answer.
#[derive(Debug, Clone)]
pub enum ReplyInput {
    Text {
        content: String,
        scenario: ScenarioContext,
    },
    Image {
        bytes: Vec<u8>,
        caption: String,
    },
}

/// Builds requests for the configured provider and normalizes the answer.
pub struct ReplyGenerator {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    vision_model: Option<String>,
    vision_temperature: f32,
    vision_max_tokens: u32,
    suggest_max_tokens: u32,
    stream: bool,
    events: Option<mpsc::UnboundedSender<LoopEvent>>,
}

impl ReplyGenerator {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: 150,
            vision_model: None,
            vision_temperature: 0.3,
            vision_max_tokens: 300,
            suggest_max_tokens: 500,
            stream: false,
            events: None,
        }
    }

    /// Generator with every sampling setting taken from the config.
    pub fn from_config(provider: Arc<dyn Provider>, config: &AppConfig) -> Self {
        Self::new(provider, config.default_model.clone())
            .with_temperature(config.default_temperature)
            .with_max_tokens(config.default_max_tokens)
            .with_vision(
                config.reply.vision_model.clone(),
                config.reply.vision_temperature,
                config.reply.vision_max_tokens,
            )
            .with_suggest_max_tokens(config.gateway.suggest_max_tokens)
            .with_stream(config.reply.stream)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = max;
        self
    }

    /// Model override and sampling settings for image entries.
    pub fn with_vision(mut self, model: Option<String>, temperature: f32, max_tokens: u32) -> Self {
        self.vision_model = model;
        self.vision_temperature = temperature;
        self.vision_max_tokens = max_tokens;
        self
    }

    pub fn with_suggest_max_tokens(mut self, max: u32) -> Self {
        self.suggest_max_tokens = max;
        self
    }

    /// Consume the provider's stream instead of waiting for a full response.
    pub fn with_stream(mut self, enabled: bool) -> Self {
        self.stream = enabled;
        self
    }

    /// Forward streamed fragments as [`LoopEvent::Fragment`].
    pub fn with_events(mut self, events: mpsc::UnboundedSender<LoopEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Produce a reply for one accepted entry.
    pub async fn generate(&self, input: ReplyInput) -> Result<ReplyResult, GenerationError> {
        let request = match input {
            ReplyInput::Text { content, scenario } => self.text_request(content, &scenario),
            ReplyInput::Image { bytes, caption } => self.image_request(&bytes, &caption)?,
        };

        let raw = if self.stream {
            self.collect_stream(request).await?
        } else {
            self.provider.complete(request).await?.message.content
        };

        let reply = ReplyResult::from_raw(&raw);
        if reply.is_empty() {
            return Err(GenerationError::EmptyReply);
        }
        debug!(
            provider = self.provider.name(),
            language = %reply.language,
            chars = reply.text.chars().count(),
            "Reply generated"
        );
        Ok(reply)
    }

    fn text_request(&self, content: String, scenario: &ScenarioContext) -> ProviderRequest {
        let language = detect_language(&content);
        let messages = vec![
            Message::system(prompts::reply_instructions(language, scenario)),
            Message::user(prompts::reply_user_content(language, &content)),
        ];

        let mut request = ProviderRequest::new(self.model.clone(), messages);
        request.temperature = self.temperature;
        request.max_tokens = Some(self.max_tokens);
        request.stream = self.stream;
        request.subject = Some(content);
        request
    }

    fn image_request(&self, bytes: &[u8], caption: &str) -> Result<ProviderRequest, GenerationError> {
        if !self.provider.supports_vision() {
            return Err(GenerationError::NotConfigured(format!(
                "provider '{}' cannot read images",
                self.provider.name()
            )));
        }

        let messages = vec![
            Message::system(prompts::VISION_INSTRUCTIONS),
            Message::user(prompts::vision_user_content(caption))
                .with_part(ContentPart::image_bytes(bytes)),
        ];
        let model = self.vision_model.clone().unwrap_or_else(|| self.model.clone());

        let mut request = ProviderRequest::new(model, messages);
        request.temperature = self.vision_temperature;
        request.max_tokens = Some(self.vision_max_tokens);
        request.stream = self.stream;
        Ok(request)
    }

    /// Drain the stream completely before returning; nothing is sent while
    /// fragments are still arriving.
    async fn collect_stream(&self, request: ProviderRequest) -> Result<String, GenerationError> {
        let mut rx = self.provider.stream(request).await?;
        let mut text = String::new();

        while let Some(chunk) = rx.recv().await {
            let chunk = chunk?;
            if let Some(content) = chunk.content.filter(|c| !c.is_empty()) {
                if let Some(events) = &self.events {
                    let _ = events.send(LoopEvent::fragment(content.as_str()));
                }
                text.push_str(&content);
            }
            if chunk.done {
                return Ok(text);
            }
        }

        // Sender dropped before the final chunk
        Err(GenerationError::StreamInterrupted(format!(
            "stream closed after {} chars without finishing",
            text.chars().count()
        )))
    }

    /// Structured suggestion for the HTTP front-end.
    pub async fn suggest(
        &self,
        message: &str,
        context: &ScenarioContext,
    ) -> Result<Suggestion, GenerationError> {
        let messages = vec![
            Message::system(prompts::suggest_instructions(context)),
            Message::user(prompts::suggest_user_content(message)),
        ];
        let mut request = ProviderRequest::new(self.model.clone(), messages);
        request.temperature = self.temperature;
        request.max_tokens = Some(self.suggest_max_tokens);
        request.json_response = true;
        request.subject = Some(message.to_string());

        let response = self.provider.complete(request).await?;
        let mut suggestion = parse_suggestion(&response.message.content)?;
        suggestion.timestamp = Some(Utc::now().to_rfc3339());

        info!(
            scenario = %context.scenario,
            chars = suggestion.suggestion.chars().count(),
            "Generated suggestion"
        );
        Ok(suggestion)
    }
}

/// Parse a JSON suggestion, tolerating a surrounding markdown code fence.
fn parse_suggestion(raw: &str) -> Result<Suggestion, GenerationError> {
    let body = strip_code_fence(raw.trim());
    let suggestion: Suggestion = serde_json::from_str(body)
        .map_err(|e| GenerationError::MalformedResponse(format!("suggestion JSON: {e}")))?;
    if suggestion.suggestion.trim().is_empty() {
        return Err(GenerationError::EmptyReply);
    }
    Ok(suggestion)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
