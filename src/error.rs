//! Error taxonomy for the dispatch core.
//!
//! Transport-level failures (`ProviderError`) are caught at the Dispatcher
//! boundary and converted to the caller-facing `DispatchError` taxonomy.
//! A failed call never leaves a session half-updated — the dispatcher rolls
//! back the tentative user message on every failure path.

use thiserror::Error;

/// Failure of a single provider transport.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The provider answered with a non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Network-level failure (connect, timeout, body read).
    #[error("network error: {0}")]
    Network(String),

    /// No relay endpoint could be discovered.
    #[error("no relay endpoint available")]
    NoEndpoint,

    /// The in-flight call was cancelled cooperatively.
    #[error("request cancelled")]
    Cancelled,

    /// The provider returned a success status but no usable answer text.
    #[error("empty response from provider")]
    EmptyResponse,

    /// This provider has no streaming transport.
    #[error("streaming not supported by this provider")]
    StreamUnsupported,
}

impl ProviderError {
    /// True for failures that suggest the cached endpoint went stale
    /// (the relay invalidates its discovered URL on these).
    pub fn is_endpoint_stale(&self) -> bool {
        matches!(
            self,
            ProviderError::Network(_) | ProviderError::Http { status: 404, .. }
        )
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => ProviderError::Http {
                status: status.as_u16(),
                body: err.to_string(),
            },
            None => ProviderError::Network(err.to_string()),
        }
    }
}

/// Terminal outcome surfaced to dispatch callers.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The third-party provider was selected but no credential is
    /// configured. Fails fast: no network call, no session mutation.
    #[error("no credential configured for the selected provider")]
    MissingCredential,

    /// Every attempted provider failed. The session has been rolled back.
    #[error("all providers failed (last: {last})")]
    AllProvidersFailed { last: String },

    /// The selected provider has no streaming transport.
    #[error("streaming not supported by the selected provider")]
    StreamUnsupported,
}
