//! Answer dispatch — provider selection, circuit-breaker fallback, session
//! commit/rollback discipline.
//!
//! One dispatch is one logical request: the caller sees a single outcome
//! even when the primary provider fails and the fallback answers. Fallback
//! attempts are strictly sequential — never concurrent — so a turn is never
//! billed or committed twice.
//!
//! The circuit breaker is a cached belief about primary reachability: any
//! primary failure opens it, and only the out-of-band health probe closes
//! it again. An open breaker never blocks a dispatch — the fallback is
//! always tried.

use crate::clock::Clock;
use crate::config::{AppConfig, ProviderChoice, SYSTEM_PROMPT};
use crate::error::{DispatchError, ProviderError};
use crate::providers::{AnswerProvider, OpenAiProvider};
use crate::session::SessionStore;
use crate::stream::StreamParser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};

/// Lifecycle events of a streaming dispatch, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Token(String),
    /// The turn is complete; `full_text` is what was committed to the
    /// session (empty when the feed produced no tokens).
    Complete { full_text: String },
    Error(String),
}

pub struct Dispatcher {
    /// Ordered fallback chain: primary first.
    chain: Vec<Arc<dyn AnswerProvider>>,
    third_party: Arc<OpenAiProvider>,
    sessions: Mutex<SessionStore>,
    primary_online: AtomicBool,
    config: Arc<AppConfig>,
}

impl Dispatcher {
    pub fn new(
        chain: Vec<Arc<dyn AnswerProvider>>,
        third_party: Arc<OpenAiProvider>,
        config: Arc<AppConfig>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            chain,
            third_party,
            sessions: Mutex::new(SessionStore::new(clock)),
            primary_online: AtomicBool::new(false),
            config,
        }
    }

    pub fn primary_online(&self) -> bool {
        self.primary_online.load(Ordering::SeqCst)
    }

    /// Record the result of an out-of-band health check. This is the only
    /// path that closes the circuit breaker.
    pub fn set_primary_online(&self, online: bool) {
        self.primary_online.store(online, Ordering::SeqCst);
    }

    /// Probe the primary transport and update the breaker accordingly.
    pub async fn probe_primary(&self) -> bool {
        let online = match self.chain.first() {
            Some(primary) => primary.probe().await,
            None => false,
        };
        self.set_primary_online(online);
        log::info!(
            "[DISPATCH] Primary provider {}",
            if online { "online" } else { "offline" }
        );
        online
    }

    /// Turn `text` into an answer, committing the (user, assistant) pair to
    /// the session on success and rolling the tentative user message back
    /// on failure.
    pub async fn dispatch(
        &self,
        text: &str,
        preference: ProviderChoice,
        session_id: &str,
    ) -> Result<String, DispatchError> {
        match preference {
            ProviderChoice::ThirdParty => self.dispatch_third_party(text, session_id).await,
            ProviderChoice::Auto => self.dispatch_chain(text, session_id).await,
        }
    }

    async fn dispatch_third_party(
        &self,
        text: &str,
        session_id: &str,
    ) -> Result<String, DispatchError> {
        // Fail fast: no network call, no session mutation.
        let credential = self
            .config
            .openai_token()
            .ok_or(DispatchError::MissingCredential)?;

        let lane = lane_key(ProviderChoice::ThirdParty, session_id);
        let prompt = self.begin_turn(&lane, text);
        match self
            .third_party
            .request(&prompt, &credential, SYSTEM_PROMPT)
            .await
        {
            Ok(answer) => {
                self.commit_turn(&lane, &answer);
                Ok(answer)
            }
            Err(e) => {
                log::error!("[DISPATCH] Third-party provider failed: {}", e);
                self.abort_turn(&lane);
                Err(DispatchError::AllProvidersFailed {
                    last: e.to_string(),
                })
            }
        }
    }

    async fn dispatch_chain(&self, text: &str, session_id: &str) -> Result<String, DispatchError> {
        let lane = lane_key(ProviderChoice::Auto, session_id);
        let prompt = self.begin_turn(&lane, text);

        // An open breaker skips the primary outright.
        let start = if self.primary_online() { 0 } else { 1 };
        let mut last_error = String::from("no provider attempted");

        for (idx, provider) in self.chain.iter().enumerate().skip(start) {
            if idx > start {
                log::info!("[DISPATCH] Falling back to {}", provider.id());
            } else {
                log::info!("[DISPATCH] Trying provider: {}", provider.id());
            }
            match provider.request(&prompt).await {
                Ok(answer) => {
                    self.commit_turn(&lane, &answer);
                    return Ok(answer);
                }
                Err(e) => {
                    log::warn!("[DISPATCH] Provider {} failed: {}", provider.id(), e);
                    if idx == 0 {
                        self.primary_online.store(false, Ordering::SeqCst);
                        log::info!("[DISPATCH] Circuit breaker opened");
                    }
                    last_error = e.to_string();
                }
            }
        }

        self.abort_turn(&lane);
        Err(DispatchError::AllProvidersFailed { last: last_error })
    }

    /// Streaming dispatch through the primary transport. Tokens are
    /// forwarded to `events` as they arrive; the assistant turn is
    /// committed exactly once, on the terminal sentinel or — when the feed
    /// closes early — from whatever accumulated.
    ///
    /// No fallback here: a transport failure opens the breaker so the next
    /// plain dispatch routes around the primary.
    pub async fn dispatch_stream(
        &self,
        text: &str,
        session_id: &str,
        events: UnboundedSender<StreamEvent>,
    ) -> Result<(), DispatchError> {
        let primary = match self.chain.first() {
            Some(p) if p.supports_streaming() => p.clone(),
            _ => return Err(DispatchError::StreamUnsupported),
        };

        let lane = lane_key(ProviderChoice::Auto, session_id);
        let prompt = self.begin_turn(&lane, text);

        let (chunk_tx, mut chunk_rx) = unbounded_channel::<Vec<u8>>();
        let transport = tokio::spawn(async move { primary.request_stream(&prompt, chunk_tx).await });

        let mut parser = StreamParser::new();
        while let Some(chunk) = chunk_rx.recv().await {
            let update = parser.push(&chunk);
            for token in update.tokens {
                let _ = events.send(StreamEvent::Token(token));
            }
            if update.terminal {
                break;
            }
        }
        // Past the sentinel (or the feed closed): stop consuming. Dropping
        // the receiver tells a still-streaming transport to wind down.
        drop(chunk_rx);

        let transport_result = match transport.await {
            Ok(result) => result,
            Err(e) => Err(ProviderError::Network(format!("stream task failed: {}", e))),
        };

        if parser.is_terminated() || transport_result.is_ok() {
            if !parser.is_terminated() {
                log::warn!(
                    "[DISPATCH] Feed closed without sentinel — treating accumulated text as final"
                );
            }
            let full_text = parser.full_text().to_string();
            if full_text.is_empty() {
                // Empty-result outcome: nothing to commit.
                self.abort_turn(&lane);
                log::warn!("[DISPATCH] Stream completed with no tokens");
            } else {
                self.commit_turn(&lane, &full_text);
            }
            let _ = events.send(StreamEvent::Complete { full_text });
            Ok(())
        } else {
            let err = transport_result.unwrap_err();
            log::error!("[DISPATCH] Stream transport failed: {}", err);
            self.primary_online.store(false, Ordering::SeqCst);
            self.abort_turn(&lane);
            let _ = events.send(StreamEvent::Error(err.to_string()));
            Err(DispatchError::AllProvidersFailed {
                last: err.to_string(),
            })
        }
    }

    /// Cancel the currently tracked in-flight call. Only the fallback
    /// transport tracks one — primary and third-party calls cannot be
    /// cancelled mid-flight (known limitation).
    pub fn cancel_inflight(&self) {
        for provider in &self.chain {
            provider.cancel_inflight();
        }
        log::info!("[DISPATCH] Cancel requested");
    }

    /// Message count of the session lane used for `preference`.
    pub fn session_message_count(&self, preference: ProviderChoice, session_id: &str) -> usize {
        self.sessions
            .lock()
            .unwrap()
            .message_count(&lane_key(preference, session_id))
    }

    /// Record the tentative user message and compose the outgoing prompt:
    /// prior-turn context (when any), then the instruction prefix and the
    /// question itself.
    fn begin_turn(&self, lane: &str, text: &str) -> String {
        let mut store = self.sessions.lock().unwrap();
        store.get_or_create(lane, SYSTEM_PROMPT);
        let context = store.context_block(lane);
        store.append_user(lane, text);

        let question = format!("{}{}", self.config.prompt_instruction(), text);
        if context.is_empty() {
            question
        } else {
            format!("{}\n\n{}", context, question)
        }
    }

    fn commit_turn(&self, lane: &str, answer: &str) {
        self.sessions.lock().unwrap().append_assistant(lane, answer);
    }

    fn abort_turn(&self, lane: &str) {
        self.sessions.lock().unwrap().rollback_last_user(lane);
    }
}

fn lane_key(preference: ProviderChoice, session_id: &str) -> String {
    match preference {
        // Primary and fallback share one lane: the fallback is transparent,
        // so there is one history and rollback always targets the session
        // the tentative user message went into.
        ProviderChoice::Auto => format!("chain:{}", session_id),
        ProviderChoice::ThirdParty => format!("openai:{}", session_id),
    }
}
