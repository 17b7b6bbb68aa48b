use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};

/// Top-level stategraph configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub graph: GraphConfig,
}

/// Connection settings for the hosted model used by LLM-backed steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model_id: default_model_id(),
            api_key: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

fn default_provider() -> String { "gemini".to_string() }
fn default_model_id() -> String { "gemini-2.5-flash".to_string() }
fn default_max_tokens() -> u32 { 8192 }
fn default_temperature() -> f32 { 0.0 }

/// Executor settings applied to every compiled workflow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Abort a run after this many step executions. Unbounded when unset.
    #[serde(default)]
    pub step_limit: Option<usize>,
}

/// Environment variable consulted for the model API key when no config file sets one.
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| GraphError::ConfigNotFound(path.display().to_string()))?;

        Self::parse(&content)
    }

    /// Parse TOML config text, expanding `${ENV_VAR}` references first.
    pub fn parse(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);

        let mut config: AppConfig =
            toml::from_str(&expanded).map_err(|e| GraphError::Config(e.to_string()))?;
        config.model.fill_api_key_from_env();
        Ok(config)
    }

    /// Build the default configuration, taking the API key from the environment.
    pub fn from_env() -> Self {
        let mut config = Self {
            model: ModelConfig::default(),
            graph: GraphConfig::default(),
        };
        config.model.fill_api_key_from_env();
        config
    }

    /// Load `path` if it exists, otherwise fall back to [`AppConfig::from_env`].
    pub fn load_or_env(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "Config file not found, using environment");
            Ok(Self::from_env())
        }
    }
}

impl ModelConfig {
    fn fill_api_key_from_env(&mut self) {
        let unresolved = match self.api_key.as_deref() {
            None => true,
            Some(key) => key.is_empty() || key.starts_with("${"),
        };
        if unresolved {
            if let Ok(key) = std::env::var(API_KEY_ENV) {
                if !key.is_empty() {
                    self.api_key = Some(key);
                }
            }
        }
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}
