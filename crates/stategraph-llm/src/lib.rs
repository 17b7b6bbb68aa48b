pub mod providers;
pub mod streaming;

use stategraph_core::config::ModelConfig;
use stategraph_core::error::{GraphError, Result};
use stategraph_core::traits::LlmClient;

pub use providers::gemini::GeminiClient;

/// Create an LLM client based on the provider name.
pub fn create_client(config: &ModelConfig) -> Result<Box<dyn LlmClient>> {
    match config.provider.as_str() {
        "gemini" | "google" => Ok(Box::new(GeminiClient::new())),
        other => Err(GraphError::UnsupportedProvider(other.to_string())),
    }
}
