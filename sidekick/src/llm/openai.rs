//! OpenAI-compatible streaming chat client.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;

use super::{ChatModelConfig, ChatModelProvider, ChunkStream};
use crate::errors::CoreError;
use crate::types::ChatMessage;

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    temperature: f64,
    max_tokens: u32,
}

/// Streaming client for any OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiChatModel {
    client: reqwest::Client,
    config: ChatModelConfig,
    api_key: String,
}

impl OpenAiChatModel {
    /// Build from config; fails when the API key env var is unset or the
    /// HTTP client cannot be constructed.
    pub fn from_config(config: ChatModelConfig) -> Result<Self, CoreError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            CoreError::Config(format!("environment variable {} not set", config.api_key_env))
        })?;

        // Only the connect phase gets a deadline: an overall request timeout
        // would cut long generations off mid-stream.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .build()
            .map_err(|e| CoreError::Config(format!("http client: {e}")))?;

        Ok(Self {
            client,
            config,
            api_key,
        })
    }
}

#[async_trait]
impl ChatModelProvider for OpenAiChatModel {
    fn name(&self) -> &str {
        "openai"
    }

    async fn stream_chat(&self, messages: &[ChatMessage]) -> Result<ChunkStream, CoreError> {
        let request = CompletionRequest {
            model: &self.config.model,
            messages,
            stream: true,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| CoreError::Upstream(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let preview: String = body.chars().take(200).collect();
            return Err(CoreError::Upstream(format!(
                "chat completion returned {status}: {preview}"
            )));
        }

        let stream = response
            .bytes_stream()
            .map(|item| match item {
                Ok(bytes) => Ok(bytes.to_vec()),
                Err(e) => Err(CoreError::Upstream(e.to_string())),
            });
        Ok(Box::pin(stream))
    }
}
