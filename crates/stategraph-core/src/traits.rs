use futures::future::BoxFuture;
use futures::stream::{BoxStream, StreamExt};

use crate::config::ModelConfig;
use crate::error::Result;
use crate::types::*;

/// LLM client — streaming chat completion.
pub trait LlmClient: Send + Sync + 'static {
    /// Send a chat request and receive a stream of deltas.
    fn chat_stream(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>>;
}

/// Drain a delta stream, concatenating every text delta.
///
/// The first stream error aborts collection and is returned.
pub async fn collect_text(mut stream: BoxStream<'_, Result<StreamDelta>>) -> Result<String> {
    let mut response = String::new();
    while let Some(delta) = stream.next().await {
        if let StreamDelta::TextDelta(text) = delta? {
            response.push_str(&text);
        }
    }
    Ok(response)
}
