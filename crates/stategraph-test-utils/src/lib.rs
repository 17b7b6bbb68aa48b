//! Test doubles shared across the workspace.

use std::io::Write;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use futures::stream::{self, BoxStream, StreamExt};

use stategraph_core::config::ModelConfig;
use stategraph_core::error::{GraphError, Result};
use stategraph_core::traits::LlmClient;
use stategraph_core::types::{ChatMessage, StopReason, StreamDelta};

/// An `LlmClient` that replays scripted replies in order.
///
/// Each reply is streamed word by word. Once the script runs out, requests
/// fail with `LlmRequest`. Every request's messages are recorded.
#[derive(Clone, Default)]
pub struct MockLlmClient {
    replies: Arc<Mutex<Vec<Result<String>>>>,
    requests: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply.
    pub fn with_reply(self, text: impl Into<String>) -> Self {
        self.lock_replies().push(Ok(text.into()));
        self
    }

    /// Queue a failed request.
    pub fn with_error(self, error: GraphError) -> Self {
        self.lock_replies().push(Err(error));
        self
    }

    /// Messages sent with each request so far.
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn lock_replies(&self) -> std::sync::MutexGuard<'_, Vec<Result<String>>> {
        self.replies.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LlmClient for MockLlmClient {
    fn chat_stream(
        &self,
        _config: &ModelConfig,
        messages: Vec<ChatMessage>,
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(messages);
        }
        let next = {
            let mut replies = self.lock_replies();
            if replies.is_empty() {
                None
            } else {
                Some(replies.remove(0))
            }
        };

        Box::pin(async move {
            let text = next
                .unwrap_or_else(|| Err(GraphError::LlmRequest("mock script exhausted".into())))?;
            let mut deltas: Vec<Result<StreamDelta>> = text
                .split_inclusive(' ')
                .map(|word| Ok(StreamDelta::TextDelta(word.to_string())))
                .collect();
            deltas.push(Ok(StreamDelta::Stop(StopReason::EndTurn)));
            Ok(stream::iter(deltas).boxed())
        })
    }
}

/// A model config pointing at nothing, with a dummy key.
pub fn test_model_config() -> ModelConfig {
    ModelConfig {
        api_key: Some("test-key".into()),
        ..ModelConfig::default()
    }
}

/// Write `contents` to a temporary `.toml` file that lives as long as the handle.
pub fn write_temp_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write temp config");
    file
}
