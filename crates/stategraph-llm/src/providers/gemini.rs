use futures::future::BoxFuture;
use futures::stream::{BoxStream, Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use stategraph_core::config::ModelConfig;
use stategraph_core::error::{GraphError, Result};
use stategraph_core::traits::LlmClient;
use stategraph_core::types::*;

use crate::streaming::{SseEvent, SseStream};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini native API client.
pub struct GeminiClient {
    http: Client,
}

impl GeminiClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }
}

impl Default for GeminiClient {
    fn default() -> Self {
        Self::new()
    }
}

// ── Request types ────────────────────────────────────────────────

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize, Deserialize, Debug)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize, Debug)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

// ── Response types ───────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct GeminiStreamChunk {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default, rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Deserialize, Debug)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    #[serde(default, rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct GeminiUsage {
    #[serde(default, rename = "promptTokenCount")]
    prompt_token_count: u64,
    #[serde(default, rename = "candidatesTokenCount")]
    candidates_token_count: u64,
}

// ── Conversion ───────────────────────────────────────────────────

fn text_content(role: Option<&str>, text: String) -> GeminiContent {
    GeminiContent {
        role: role.map(str::to_string),
        parts: vec![GeminiPart { text }],
    }
}

/// Split messages into the system instruction and the turn list.
///
/// Several system messages are joined with blank lines.
fn convert_messages(messages: Vec<ChatMessage>) -> (Option<GeminiContent>, Vec<GeminiContent>) {
    let mut system: Vec<String> = Vec::new();
    let mut contents = Vec::new();

    for msg in messages {
        match msg.role {
            Role::System => system.push(msg.content),
            Role::User => contents.push(text_content(Some("user"), msg.content)),
            Role::Assistant => contents.push(text_content(Some("model"), msg.content)),
        }
    }

    let system = if system.is_empty() {
        None
    } else {
        Some(text_content(None, system.join("\n\n")))
    };
    (system, contents)
}

/// Turn one SSE chunk into deltas. A chunk can carry text, a finish reason
/// and usage at once; they are emitted in that order.
fn parse_gemini_chunk(event: &SseEvent) -> Vec<Result<StreamDelta>> {
    if event.data.trim() == "[DONE]" {
        return vec![];
    }

    let chunk: GeminiStreamChunk = match serde_json::from_str(&event.data) {
        Ok(chunk) => chunk,
        Err(e) => {
            warn!(data = %event.data, error = %e, "Failed to parse Gemini SSE chunk");
            return vec![Err(GraphError::LlmParse(e.to_string()))];
        }
    };

    let mut deltas = Vec::new();

    if let Some(candidate) = chunk.candidates.into_iter().next() {
        if let Some(content) = candidate.content {
            let text: String = content.parts.into_iter().map(|p| p.text).collect();
            if !text.is_empty() {
                deltas.push(Ok(StreamDelta::TextDelta(text)));
            }
        }
        if let Some(reason) = candidate.finish_reason {
            let stop = match reason.as_str() {
                "MAX_TOKENS" => StopReason::MaxTokens,
                "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" => StopReason::Safety,
                _ => StopReason::EndTurn,
            };
            deltas.push(Ok(StreamDelta::Stop(stop)));
        }
    }

    if let Some(usage) = chunk.usage_metadata {
        deltas.push(Ok(StreamDelta::Usage {
            input_tokens: usage.prompt_token_count,
            output_tokens: usage.candidates_token_count,
        }));
    }

    deltas
}

/// Flatten SSE events into deltas. A stream error is passed through as-is.
fn delta_stream<'a, S>(events: S) -> BoxStream<'a, Result<StreamDelta>>
where
    S: Stream<Item = Result<SseEvent>> + Send + 'a,
{
    events
        .flat_map(|event| {
            let deltas = match event {
                Ok(event) => parse_gemini_chunk(&event),
                Err(e) => vec![Err(e)],
            };
            futures::stream::iter(deltas)
        })
        .boxed()
}

/// The key travels in the `x-goog-api-key` header, never in the URL.
fn request_url(config: &ModelConfig) -> String {
    let base = config
        .base_url
        .as_deref()
        .unwrap_or(DEFAULT_BASE_URL)
        .trim_end_matches('/');
    format!("{}/models/{}:streamGenerateContent?alt=sse", base, config.model_id)
}

impl LlmClient for GeminiClient {
    fn chat_stream(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        let config = config.clone();

        Box::pin(async move {
            let api_key = config
                .api_key
                .as_deref()
                .filter(|k| !k.is_empty())
                .ok_or_else(|| GraphError::Config("Gemini: api_key is required".into()))?;

            let url = request_url(&config);
            let (system_instruction, contents) = convert_messages(messages);

            let body = GeminiRequest {
                contents,
                system_instruction,
                generation_config: Some(GenerationConfig {
                    max_output_tokens: Some(config.max_tokens),
                    temperature: if config.temperature > 0.0 {
                        Some(config.temperature)
                    } else {
                        None
                    },
                }),
            };

            debug!(model = %config.model_id, "Sending Gemini request");
            let response = self
                .http
                .post(&url)
                .header("x-goog-api-key", api_key)
                .header("content-type", "application/json")
                .json(&body)
                .send()
                .await
                .map_err(|e| GraphError::LlmRequest(e.without_url().to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown".to_string());
                return Err(GraphError::LlmRequest(format!("HTTP {}: {}", status, body)));
            }

            let bytes = response.bytes_stream().map(|chunk| chunk.map_err(|e| e.without_url()));
            Ok(delta_stream(SseStream::new(bytes)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(data: &str) -> SseEvent {
        SseEvent {
            event_type: None,
            data: data.to_string(),
        }
    }

    #[test]
    fn test_convert_messages_roles() {
        let (system, contents) = convert_messages(vec![
            ChatMessage::system("Be brief."),
            ChatMessage::user("Hi"),
            ChatMessage::assistant_text("Hello!"),
            ChatMessage::user("How are you?"),
        ]);

        let system = system.expect("system instruction");
        assert!(system.role.is_none());
        assert_eq!(system.parts[0].text, "Be brief.");

        let roles: Vec<_> = contents.iter().map(|c| c.role.as_deref().unwrap()).collect();
        assert_eq!(roles, vec!["user", "model", "user"]);
    }

    #[test]
    fn test_request_body_shape() {
        let (system_instruction, contents) = convert_messages(vec![ChatMessage::user("Hi")]);
        let body = GeminiRequest {
            contents,
            system_instruction,
            generation_config: Some(GenerationConfig {
                max_output_tokens: Some(128),
                temperature: None,
            }),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "contents": [{"role": "user", "parts": [{"text": "Hi"}]}],
                "generation_config": {"max_output_tokens": 128}
            })
        );
    }

    #[test]
    fn test_parse_text_chunk() {
        let deltas = parse_gemini_chunk(&event(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hel"},{"text":"lo"}]}}]}"#,
        ));
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].as_ref().unwrap(), &StreamDelta::TextDelta("Hello".into()));
    }

    #[test]
    fn test_parse_final_chunk_keeps_text_stop_and_usage() {
        let deltas = parse_gemini_chunk(&event(
            r#"{"candidates":[{"content":{"parts":[{"text":"!"}]},"finishReason":"STOP"}],
               "usageMetadata":{"promptTokenCount":7,"candidatesTokenCount":3}}"#,
        ));
        let deltas: Vec<StreamDelta> = deltas.into_iter().map(|d| d.unwrap()).collect();
        assert_eq!(
            deltas,
            vec![
                StreamDelta::TextDelta("!".into()),
                StreamDelta::Stop(StopReason::EndTurn),
                StreamDelta::Usage {
                    input_tokens: 7,
                    output_tokens: 3
                },
            ]
        );
    }

    #[test]
    fn test_parse_safety_stop() {
        let deltas = parse_gemini_chunk(&event(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#));
        assert_eq!(deltas[0].as_ref().unwrap(), &StreamDelta::Stop(StopReason::Safety));
    }

    #[test]
    fn test_parse_malformed_chunk() {
        let deltas = parse_gemini_chunk(&event("{not json"));
        assert!(matches!(deltas[0], Err(GraphError::LlmParse(_))));
        assert!(parse_gemini_chunk(&event("[DONE]")).is_empty());
    }

    #[test]
    fn test_request_url_respects_base_url() {
        let mut config = ModelConfig::default();
        assert_eq!(
            request_url(&config),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:streamGenerateContent?alt=sse"
        );
        config.base_url = Some("http://localhost:8080/".into());
        assert_eq!(
            request_url(&config),
            "http://localhost:8080/models/gemini-2.5-flash:streamGenerateContent?alt=sse"
        );
    }

    #[tokio::test]
    async fn test_missing_api_key_is_config_error() {
        let config = ModelConfig {
            api_key: None,
            ..ModelConfig::default()
        };
        let client = GeminiClient::new();
        let result = client.chat_stream(&config, vec![ChatMessage::user("hi")]).await;
        assert!(matches!(result, Err(GraphError::Config(_))));
    }

    #[tokio::test]
    async fn test_connection_error_does_not_leak_api_key() {
        let config = ModelConfig {
            api_key: Some("SECRET123".into()),
            base_url: Some("http://127.0.0.1:1".into()),
            ..ModelConfig::default()
        };
        let client = GeminiClient::new();
        let err = match client.chat_stream(&config, vec![ChatMessage::user("hi")]).await {
            Err(e) => e,
            Ok(_) => panic!("expected connection failure"),
        };

        assert!(matches!(err, GraphError::LlmRequest(_)));
        assert!(!err.to_string().contains("SECRET123"));
    }

    #[tokio::test]
    async fn test_stream_error_mid_reply_fails_collection() {
        let text_chunk =
            r#"data: {"candidates":[{"content":{"parts":[{"text":"Half a "}]}}]}"#.to_string() + "\n\n";
        let bytes = futures::stream::iter(vec![
            Ok(bytes::Bytes::from(text_chunk)),
            Err("connection reset".to_string()),
        ]);

        let mut deltas = delta_stream(SseStream::new(bytes));
        assert_eq!(
            deltas.next().await.unwrap().unwrap(),
            StreamDelta::TextDelta("Half a ".into())
        );
        assert!(matches!(deltas.next().await, Some(Err(GraphError::LlmStream(_)))));
        assert!(deltas.next().await.is_none());
    }

    #[tokio::test]
    async fn test_truncated_reply_is_not_returned_as_text() {
        let bytes = futures::stream::iter(vec![
            Ok(bytes::Bytes::from_static(
                b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"cut\"}]}}]}\n\n",
            )),
            Err("eof".to_string()),
        ]);
        let err = stategraph_core::traits::collect_text(delta_stream(SseStream::new(bytes)))
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::LlmStream(_)));
    }
}
