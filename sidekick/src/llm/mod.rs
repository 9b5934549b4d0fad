//! Upstream generative service abstraction.
//!
//! The core only needs one operation: send a message list, get back a
//! frame-delimited event stream terminated by a sentinel. [`OpenAiChatModel`]
//! talks to any OpenAI-compatible endpoint; [`StubChatModel`] replays a
//! canned stream for tests and offline runs.

pub mod openai;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::streaming::{sse_done, sse_frame};
use crate::types::ChatMessage;

pub use openai::OpenAiChatModel;

/// Raw transport chunks of the upstream response stream. Chunk boundaries
/// carry no meaning; the processor reassembles frames itself.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, CoreError>> + Send>>;

/// Contract consumed from the generative service.
#[async_trait]
pub trait ChatModelProvider: Send + Sync {
    /// Short stable name, used as the circuit-breaker key.
    fn name(&self) -> &str;

    /// Open a streaming completion for `messages`.
    async fn stream_chat(&self, messages: &[ChatMessage]) -> Result<ChunkStream, CoreError>;
}

/// Provider configuration; the API key is read from the environment variable
/// named in `api_key_env`, never stored in config files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatModelConfig {
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub connect_timeout_seconds: u64,
}

impl Default for ChatModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.7,
            max_tokens: 1024,
            connect_timeout_seconds: 10,
        }
    }
}

/// Deterministic provider that replays a prepared chunk sequence.
#[derive(Debug, Clone, Default)]
pub struct StubChatModel {
    chunks: Vec<Vec<u8>>,
}

impl StubChatModel {
    /// Replay arbitrary transport chunks exactly as given.
    pub fn from_chunks(chunks: Vec<Vec<u8>>) -> Self {
        Self { chunks }
    }

    /// Canned assistant reply: one delta frame per text piece, then the
    /// sentinel, one transport chunk per frame.
    pub fn from_deltas(pieces: &[&str]) -> Self {
        let mut chunks: Vec<Vec<u8>> = pieces
            .iter()
            .map(|piece| {
                let payload =
                    serde_json::json!({"choices": [{"delta": {"content": piece}}]});
                sse_frame(&payload.to_string()).into_bytes()
            })
            .collect();
        chunks.push(sse_done().into_bytes());
        Self { chunks }
    }
}

#[async_trait]
impl ChatModelProvider for StubChatModel {
    fn name(&self) -> &str {
        "stub"
    }

    async fn stream_chat(&self, _messages: &[ChatMessage]) -> Result<ChunkStream, CoreError> {
        let chunks = self.chunks.clone();
        Ok(Box::pin(futures::stream::iter(
            chunks.into_iter().map(Ok),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn stub_replays_deltas_and_sentinel() {
        let stub = StubChatModel::from_deltas(&["Привет", "!"]);
        let mut stream = stub.stream_chat(&[ChatMessage::user("hi")]).await.unwrap();

        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.extend_from_slice(&chunk.unwrap());
        }
        let text = String::from_utf8(collected).unwrap();
        assert!(text.contains("Привет"));
        assert!(text.trim_end().ends_with("data: [DONE]"));
    }
}
