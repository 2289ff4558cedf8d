//! Third-party token-authenticated transport (OpenAI-style chat API).
//!
//! Sits outside the fallback chain: it is only reached when the user
//! explicitly selects it, and the dispatcher fails fast if no credential is
//! configured. The credential and system prompt come in per call — this
//! transport holds no secrets of its own.

use crate::config::AppConfig;
use crate::error::ProviderError;

pub struct OpenAiProvider {
    http: reqwest::Client,
    url: String,
    model: String,
}

impl OpenAiProvider {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: cfg.openai_url().to_string(),
            model: cfg.openai_model().to_string(),
        }
    }

    pub async fn request(
        &self,
        prompt: &str,
        credential: &str,
        system_prompt: &str,
    ) -> Result<String, ProviderError> {
        log::info!("[OPENAI] Sending request, model: {}", self.model);
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(credential)
            .json(&serde_json::json!({
                "model": self.model,
                "messages": [
                    {"role": "system", "content": system_prompt},
                    {"role": "user", "content": prompt},
                ],
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("[OPENAI] API returned {}: {}", status, body);
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body: serde_json::Value = response.json().await?;
        match body["choices"][0]["message"]["content"].as_str() {
            Some(answer) if !answer.trim().is_empty() => Ok(answer.to_string()),
            _ => Err(ProviderError::EmptyResponse),
        }
    }
}
