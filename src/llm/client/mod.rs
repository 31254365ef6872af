
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{ChatMessage, ChatModel};
use crate::DealError;
use crate::config::LlmConfig;
use crate::retry::RetryPolicy;

/// Blocking client for an OpenAI-compatible `/chat/completions` endpoint
#[derive(Clone)]
pub struct ChatClient {
    endpoint: Url,
    model: String,
    api_key: String,
    agent: ureq::Agent,
    retry: RetryPolicy,
}

impl fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

impl ChatClient {
    #[inline]
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self> {
        let endpoint = config
            .endpoint_base()
            .context("Invalid chat completion base URL")?
            .join("chat/completions")
            .context("Failed to build chat completion URL")?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .build()
            .into();

        Ok(Self {
            endpoint,
            model: config.model.clone(),
            api_key,
            agent,
            retry: RetryPolicy::default(),
        })
    }

    /// Resolve the API key from the environment and build a client
    #[inline]
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config.api_key().map_err(DealError::from)?;
        Self::new(config, api_key)
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry.attempts = attempts.max(1);
        self
    }

    #[inline]
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.retry.backoff_unit = unit;
        self
    }

    #[inline]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl ChatModel for ChatClient {
    #[inline]
    fn model(&self) -> &str {
        &self.model
    }

    #[inline]
    fn complete(&self, messages: &[ChatMessage], temperature: Option<f32>) -> Result<String> {
        let request = CompletionRequest {
            model: &self.model,
            messages,
            temperature,
        };
        let request_json =
            serde_json::to_string(&request).context("Failed to serialize chat request")?;

        debug!(
            "Sending {} messages to {} ({})",
            messages.len(),
            self.endpoint,
            self.model
        );

        let authorization = format!("Bearer {}", self.api_key);
        let response_text = self
            .retry
            .run(self.endpoint.as_str(), || {
                self.agent
                    .post(self.endpoint.as_str())
                    .header("Content-Type", "application/json")
                    .header("Authorization", &authorization)
                    .send(&request_json)
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .context("Chat completion request failed")?;

        let response: CompletionResponse =
            serde_json::from_str(&response_text).context("Failed to parse chat response")?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(DealError::Llm("Chat completion returned no content".to_string()).into());
        }

        debug!("Received {} characters from chat model", content.len());
        Ok(content)
    }
}
