//! Local model fallback transport (Ollama-compatible generate API).
//!
//! This is the only backend with a cancellable in-flight call: the current
//! request's cancellation token is tracked so the dispatcher's cancel
//! operation can abort it mid-flight.

use crate::config::AppConfig;
use crate::error::ProviderError;
use crate::providers::AnswerProvider;
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

pub struct OllamaProvider {
    http: reqwest::Client,
    url: String,
    model: String,
    current: Mutex<Option<CancellationToken>>,
}

impl OllamaProvider {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: cfg.ollama_url().to_string(),
            model: cfg.ollama_model().to_string(),
            current: Mutex::new(None),
        }
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let response = self
            .http
            .post(format!("{}/api/generate", self.url))
            .timeout(REQUEST_TIMEOUT)
            .json(&serde_json::json!({
                "model": self.model,
                "prompt": prompt,
                "stream": false,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("[OLLAMA] API returned {}: {}", status, body);
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body: serde_json::Value = response.json().await?;
        match body.get("response").and_then(|v| v.as_str()) {
            Some(answer) if !answer.trim().is_empty() => Ok(answer.to_string()),
            _ => Err(ProviderError::EmptyResponse),
        }
    }
}

#[async_trait]
impl AnswerProvider for OllamaProvider {
    fn id(&self) -> &'static str {
        "ollama"
    }

    async fn request(&self, prompt: &str) -> Result<String, ProviderError> {
        let token = CancellationToken::new();
        *self.current.lock().unwrap() = Some(token.clone());

        let result = tokio::select! {
            _ = token.cancelled() => {
                log::info!("[OLLAMA] In-flight request cancelled");
                Err(ProviderError::Cancelled)
            }
            result = self.generate(prompt) => result,
        };

        *self.current.lock().unwrap() = None;
        result
    }

    fn cancel_inflight(&self) {
        if let Some(token) = self.current.lock().unwrap().take() {
            token.cancel();
        }
    }
}
