//! Relay transport — the primary answer backend.
//!
//! The relay's base URL is not fixed: unless `RELAY_URL` pins it, the URL
//! is discovered from a directory endpoint (the latest entry's `content`
//! field) and cached. A connection-refused or 404 invalidates the cache so
//! the next call re-discovers — the relay moves around.
//!
//! `ping()` is the out-of-band health probe the dispatcher uses to restore
//! the circuit breaker.

use crate::config::AppConfig;
use crate::error::ProviderError;
use crate::providers::AnswerProvider;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);
const PING_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct DirectoryEntry {
    content: Option<String>,
}

pub struct RelayProvider {
    http: reqwest::Client,
    fixed_url: Option<String>,
    directory_url: Option<String>,
    token: Option<String>,
    language_tag: &'static str,
    base: Mutex<Option<String>>,
}

impl RelayProvider {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            fixed_url: cfg.relay_url().map(str::to_string),
            directory_url: cfg.relay_directory_url().map(str::to_string),
            token: cfg.relay_token().map(str::to_string),
            language_tag: cfg.language().relay_tag(),
            base: Mutex::new(None),
        }
    }

    /// Resolve the base URL: pinned, cached, or freshly discovered.
    async fn base_url(&self) -> Result<String, ProviderError> {
        if let Some(url) = &self.fixed_url {
            return Ok(url.clone());
        }
        if let Some(url) = self.base.lock().unwrap().clone() {
            return Ok(url);
        }
        let discovered = self.discover().await?;
        *self.base.lock().unwrap() = Some(discovered.clone());
        Ok(discovered)
    }

    async fn discover(&self) -> Result<String, ProviderError> {
        let directory = self
            .directory_url
            .as_deref()
            .ok_or(ProviderError::NoEndpoint)?;
        let entries: Vec<DirectoryEntry> = self
            .http
            .get(directory)
            .timeout(PING_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match entries.into_iter().rev().find_map(|e| e.content) {
            Some(url) if !url.trim().is_empty() => {
                log::info!("[RELAY] Discovered base URL: {}", url);
                Ok(url.trim().to_string())
            }
            _ => {
                log::error!("[RELAY] Directory returned no usable entry");
                Err(ProviderError::NoEndpoint)
            }
        }
    }

    /// The relay may have moved; forget the cached URL.
    fn clear_base(&self) {
        if self.base.lock().unwrap().take().is_some() {
            log::info!("[RELAY] Base URL might be outdated — cleared");
        }
    }

    fn apply_headers(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "prompt": prompt,
            "language": self.language_tag,
        })
    }

    /// Health probe: 200 from `/ping` within 5s.
    pub async fn ping(&self) -> bool {
        let base = match self.base_url().await {
            Ok(base) => base,
            Err(_) => return false,
        };
        let result = self
            .apply_headers(self.http.get(format!("{}/ping", base)))
            .timeout(PING_TIMEOUT)
            .send()
            .await;
        match result {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                log::warn!("[RELAY] Ping failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl AnswerProvider for RelayProvider {
    fn id(&self) -> &'static str {
        "relay"
    }

    async fn request(&self, prompt: &str) -> Result<String, ProviderError> {
        let base = self.base_url().await?;
        let result = self
            .apply_headers(self.http.post(format!("{}/answer", base)))
            .timeout(REQUEST_TIMEOUT)
            .json(&self.request_body(prompt))
            .send()
            .await;

        let response = match result {
            Ok(resp) => resp,
            Err(e) => {
                let err = ProviderError::from(e);
                if err.is_endpoint_stale() {
                    self.clear_base();
                }
                return Err(err);
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("[RELAY] API returned {}: {}", status, body);
            if status.as_u16() == 404 {
                self.clear_base();
            }
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await.map_err(ProviderError::from)?;

        // The relay answers either {"response": "..."} or the text directly.
        let answer = match serde_json::from_str::<serde_json::Value>(&body) {
            Ok(value) => value
                .get("response")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or(body),
            Err(_) => body,
        };

        if answer.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(answer)
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    async fn request_stream(
        &self,
        prompt: &str,
        chunks: UnboundedSender<Vec<u8>>,
    ) -> Result<(), ProviderError> {
        let base = self.base_url().await?;
        let mut response = self
            .apply_headers(self.http.post(format!("{}/answer/stream", base)))
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| {
                let err = ProviderError::from(e);
                if err.is_endpoint_stale() {
                    self.clear_base();
                }
                err
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("[RELAY] Stream API returned {}: {}", status, body);
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body,
            });
        }

        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    // Receiver gone means the consumer saw its terminal
                    // sentinel and stopped — not an error.
                    if chunks.send(chunk.to_vec()).is_err() {
                        return Ok(());
                    }
                }
                Ok(None) => return Ok(()),
                Err(e) => {
                    log::error!("[RELAY] Stream error: {}", e);
                    return Err(ProviderError::from(e));
                }
            }
        }
    }

    async fn probe(&self) -> bool {
        self.ping().await
    }
}
