//! Answer providers — interchangeable backends behind one contract.
//!
//! Backends:
//!   - Relay (relay.rs)   — primary network service, streaming-capable
//!   - Ollama (ollama.rs) — local generate API, the cancellable fallback
//!   - OpenAI (openai.rs) — token-authenticated third-party service
//!
//! The dispatcher holds the relay/ollama pair as an ordered fallback chain
//! of `dyn AnswerProvider`; the third-party backend sits outside the chain
//! and is only reached by explicit selection.

mod ollama;
mod openai;
mod relay;

pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use relay::RelayProvider;

use crate::error::ProviderError;
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

/// Capability contract implemented by every fallback-chain backend.
#[async_trait]
pub trait AnswerProvider: Send + Sync {
    /// Stable identifier used in logs.
    fn id(&self) -> &'static str;

    /// Turn a prompt into an answer. Errors on any transport failure.
    async fn request(&self, prompt: &str) -> Result<String, ProviderError>;

    fn supports_streaming(&self) -> bool {
        false
    }

    /// Stream the raw response body into `chunks` as it arrives. The parser
    /// downstream owns line splitting; this just moves bytes. A closed
    /// receiver means the consumer is done — stop quietly.
    async fn request_stream(
        &self,
        _prompt: &str,
        _chunks: UnboundedSender<Vec<u8>>,
    ) -> Result<(), ProviderError> {
        Err(ProviderError::StreamUnsupported)
    }

    /// Out-of-band health probe. Only the primary transport implements one.
    async fn probe(&self) -> bool {
        false
    }

    /// Cooperatively cancel the tracked in-flight call, if this transport
    /// tracks one. Default is a no-op — most transports do not.
    fn cancel_inflight(&self) {}
}

/// Provider metadata for the startup log.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub needs_credential: bool,
}

/// All known backends and their display info.
pub fn all_providers() -> Vec<ProviderInfo> {
    vec![
        ProviderInfo {
            id: "relay",
            name: "Relay backend — primary, streaming",
            needs_credential: false,
        },
        ProviderInfo {
            id: "ollama",
            name: "Local model — fallback",
            needs_credential: false,
        },
        ProviderInfo {
            id: "openai",
            name: "OpenAI — third-party, token-authenticated",
            needs_credential: true,
        },
    ]
}
