use serde::{Deserialize, Serialize};

/// Configuration for the completion model behind the reasoning call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider model identifier, e.g. `gpt-4o-mini`.
    pub model_id: String,
    /// Bearer token for the provider.
    pub api_key: String,
    /// Override for the provider base URL. Any OpenAI-compatible chat
    /// completions endpoint works (OpenAI, OpenRouter, Groq, Ollama).
    pub api_base_url: Option<String>,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Completion token ceiling per call.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1024
}

impl ModelConfig {
    /// Effective base URL, defaulting to the OpenAI endpoint.
    pub fn base_url(&self) -> &str {
        self.api_base_url
            .as_deref()
            .unwrap_or("https://api.openai.com")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_minimal_toml_shape() {
        let config: ModelConfig = serde_json::from_str(
            r#"{"model_id": "gpt-4o-mini", "api_key": "k"}"#,
        )
        .unwrap();
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.max_tokens, 1024);
        assert_eq!(config.base_url(), "https://api.openai.com");
    }

    #[test]
    fn test_base_url_override() {
        let config = ModelConfig {
            model_id: "local".into(),
            api_key: String::new(),
            api_base_url: Some("http://localhost:11434".into()),
            temperature: 0.2,
            max_tokens: 512,
        };
        assert_eq!(config.base_url(), "http://localhost:11434");
    }
}
