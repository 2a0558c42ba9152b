use crate::config::ModelConfig;
use async_trait::async_trait;
use taskfleet_core::{FleetError, FleetResult};

/// A black-box text-completion service.
///
/// The engine only ever sends a persona (system prompt) and a free-text
/// prompt, and receives free text back. Implement this trait to plug in a
/// different provider; tests use scripted implementations.
#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    /// One completion call: persona plus prompt in, raw reply text out.
    async fn complete(&self, system_prompt: &str, prompt: &str) -> FleetResult<String>;
}

/// OpenAI-compatible chat completions backend.
pub struct HttpBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl HttpBackend {
    /// Backend with a fresh connection pool for the configured provider.
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ReasoningBackend for HttpBackend {
    async fn complete(&self, system_prompt: &str, prompt: &str) -> FleetResult<String> {
        let url = format!("{}/v1/chat/completions", self.config.base_url());

        let body = serde_json::json!({
            "model": self.config.model_id,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": prompt},
            ],
        });

        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| FleetError::Reason(e.to_string()))?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| FleetError::Reason(e.to_string()))?;

        if !status.is_success() {
            return Err(FleetError::Reason(format!(
                "completion API error {status}: {resp_body}"
            )));
        }

        resp_body["choices"][0]["message"]["content"]
            .as_str()
            .map(std::string::ToString::to_string)
            .ok_or_else(|| {
                FleetError::Reason(format!("completion reply missing content: {resp_body}"))
            })
    }
}
