//! Chat completions client
//!
//! Sends each prompt as a two-message conversation (`system`, `user`) and
//! returns the first choice's content verbatim. Deadlines are enforced by
//! the pipeline, not here.

use crate::error::ClientError;
use async_trait::async_trait;
use diffsmith_core::{LlmConfig, PromptContext, TextSynthesizer, TransportError};
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Client for an OpenAI-compatible chat completions API
pub struct OpenAiChatClient {
    /// HTTP client for API requests
    client: Client,
    api_key: String,
    /// Base URL, overridable for testing
    api_base: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl std::fmt::Debug for OpenAiChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChatClient")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

// -- chat completions request/response types --

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl OpenAiChatClient {
    /// Client for `model` at the default OpenAI endpoint
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let defaults = LlmConfig::default();
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_base: defaults.base_url,
            model: model.into(),
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
        }
    }

    /// Client configured from `[llm]`, reading the key from `config.api_key_env`
    ///
    /// # Errors
    /// Returns [`ClientError::MissingApiKey`] when the variable is unset or empty
    pub fn from_config(config: &LlmConfig) -> Result<Self, ClientError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ClientError::MissingApiKey(config.api_key_env.clone()))?;

        Ok(Self::new(api_key, config.model.clone())
            .with_base_url(config.base_url.clone())
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens))
    }

    /// With a different API base URL
    #[must_use]
    pub fn with_base_url(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// With a sampling temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// With a reply length cap
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Model in use
    #[inline]
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one chat completion request
    ///
    /// # Errors
    /// Returns [`ClientError`] when the request fails, the service answers
    /// with an error status, or the reply has no content
    pub async fn chat(&self, prompt: &PromptContext) -> Result<String, ClientError> {
        let request = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            max_tokens: self.max_tokens,
        };

        let url = format!("{}/chat/completions", self.api_base);
        tracing::debug!("POST {} (model {})", url, self.model);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .map_or(body, |err| err.error.message);
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ClientError::EmptyResponse)
    }
}

#[async_trait]
impl TextSynthesizer for OpenAiChatClient {
    async fn complete(&self, prompt: &PromptContext) -> Result<String, TransportError> {
        Ok(self.chat(prompt).await?)
    }
}
