//! Language-model providers.
//!
//! [`OpenAiChat`] calls the chat-completions API once per question. It never
//! retries: a failed call becomes a `provider_error` answer and the user
//! asks again.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use pv_harness_core::model::{DisabledModel, LanguageModel};
use pv_harness_core::ProviderError;

use crate::config::LlmConfig;

/// Build the model selected by `[llm].provider`.
pub fn create_model(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledModel)),
        "openai" => Ok(Arc::new(OpenAiChat::new(config)?)),
        other => anyhow::bail!("Unknown llm provider: {}", other),
    }
}

pub struct OpenAiChat {
    model: String,
    max_tokens: u32,
    endpoint: String,
    timeout_secs: u64,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiChat {
    /// A missing `OPENAI_API_KEY` is not an error here; each call then
    /// fails with [`ProviderError::Auth`].
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            timeout_secs: config.timeout_secs,
            api_key: std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            client,
        })
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

fn parse_chat_response(body: &str) -> Result<String, ProviderError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Malformed(e.to_string()))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| ProviderError::Malformed("no choices in response".to_string()))
}

fn classify_status(status: reqwest::StatusCode, body: String) -> ProviderError {
    match status.as_u16() {
        401 | 403 => ProviderError::Auth(body),
        429 => ProviderError::Quota(body),
        _ => ProviderError::Network(format!("HTTP {}: {}", status, body)),
    }
}

#[async_trait]
impl LanguageModel for OpenAiChat {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::Auth("OPENAI_API_KEY not set".to_string()))?;

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": prompt },
            ],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(self.timeout_secs)
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        if !status.is_success() {
            return Err(classify_status(status, text));
        }

        debug!(model = %self.model, "chat completion received");
        parse_chat_response(&text)
    }
}
