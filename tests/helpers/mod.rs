//! Shared test doubles: scripted providers, a recording surface host, a
//! queue-backed clipboard source, and gated extractors.

// Each test binary compiles this module separately and uses a subset of it.
#![allow(dead_code)]

use answerglass::clipboard::ClipboardImageSource;
use answerglass::clock::ManualClock;
use answerglass::config::AppConfig;
use answerglass::dispatch::Dispatcher;
use answerglass::error::ProviderError;
use answerglass::ocr::TextExtractor;
use answerglass::overlay::{Surface, SurfaceHost, SurfaceKind, SurfaceSequencer};
use answerglass::pipeline::AnswerPipeline;
use answerglass::providers::{AnswerProvider, OpenAiProvider};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedSender;

// ── Providers ────────────────────────────────────────────────────────

enum Script {
    AlwaysOk(String),
    AlwaysFail(String),
    Sequence(VecDeque<Result<String, String>>),
}

/// Provider whose answers follow a script. Counts calls.
pub struct ScriptedProvider {
    id: &'static str,
    script: Mutex<Script>,
    calls: AtomicUsize,
    probe_ok: bool,
}

impl ScriptedProvider {
    pub fn ok(id: &'static str, answer: &str) -> Arc<Self> {
        Arc::new(Self {
            id,
            script: Mutex::new(Script::AlwaysOk(answer.to_string())),
            calls: AtomicUsize::new(0),
            probe_ok: false,
        })
    }

    /// Like `ok`, but the health probe succeeds too.
    pub fn ok_with_probe(id: &'static str, answer: &str) -> Arc<Self> {
        Arc::new(Self {
            id,
            script: Mutex::new(Script::AlwaysOk(answer.to_string())),
            calls: AtomicUsize::new(0),
            probe_ok: true,
        })
    }

    pub fn failing(id: &'static str) -> Arc<Self> {
        Arc::new(Self {
            id,
            script: Mutex::new(Script::AlwaysFail(format!("{} unreachable", id))),
            calls: AtomicUsize::new(0),
            probe_ok: false,
        })
    }

    pub fn sequence(id: &'static str, outcomes: Vec<Result<&str, &str>>) -> Arc<Self> {
        let queue = outcomes
            .into_iter()
            .map(|o| o.map(str::to_string).map_err(str::to_string))
            .collect();
        Arc::new(Self {
            id,
            script: Mutex::new(Script::Sequence(queue)),
            calls: AtomicUsize::new(0),
            probe_ok: false,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnswerProvider for ScriptedProvider {
    fn id(&self) -> &'static str {
        self.id
    }

    async fn request(&self, _prompt: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = match &mut *self.script.lock().unwrap() {
            Script::AlwaysOk(answer) => Ok(answer.clone()),
            Script::AlwaysFail(error) => Err(error.clone()),
            Script::Sequence(queue) => queue
                .pop_front()
                .unwrap_or_else(|| Err("script exhausted".to_string())),
        };
        outcome.map_err(ProviderError::Network)
    }

    async fn probe(&self) -> bool {
        self.probe_ok
    }
}

/// Provider that streams preset byte chunks, optionally erroring afterwards.
pub struct StreamingProvider {
    chunks: Vec<Vec<u8>>,
    fail_after: Option<String>,
}

impl StreamingProvider {
    pub fn new(chunks: Vec<&[u8]>) -> Arc<Self> {
        Arc::new(Self {
            chunks: chunks.into_iter().map(|c| c.to_vec()).collect(),
            fail_after: None,
        })
    }

    pub fn failing_after(chunks: Vec<&[u8]>, error: &str) -> Arc<Self> {
        Arc::new(Self {
            chunks: chunks.into_iter().map(|c| c.to_vec()).collect(),
            fail_after: Some(error.to_string()),
        })
    }
}

#[async_trait]
impl AnswerProvider for StreamingProvider {
    fn id(&self) -> &'static str {
        "scripted-stream"
    }

    async fn request(&self, _prompt: &str) -> Result<String, ProviderError> {
        Err(ProviderError::Network("request not scripted".to_string()))
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    async fn request_stream(
        &self,
        _prompt: &str,
        chunks: UnboundedSender<Vec<u8>>,
    ) -> Result<(), ProviderError> {
        for chunk in &self.chunks {
            if chunks.send(chunk.clone()).is_err() {
                return Ok(());
            }
        }
        match &self.fail_after {
            Some(error) => Err(ProviderError::Network(error.clone())),
            None => Ok(()),
        }
    }
}

// ── Presentation ─────────────────────────────────────────────────────

/// Surface host recording create/destroy calls in order.
pub struct RecordingHost {
    events: Mutex<Vec<String>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl SurfaceHost for RecordingHost {
    async fn create(&self, surface: &Surface) {
        self.events
            .lock()
            .unwrap()
            .push(format!("create:{:?}", surface.kind()));
    }

    async fn destroy(&self, kind: SurfaceKind) {
        self.events.lock().unwrap().push(format!("destroy:{:?}", kind));
    }
}

// ── Clipboard / extraction ───────────────────────────────────────────

/// Clipboard source that replays a queue of poll results.
pub struct QueueSource {
    polls: Mutex<VecDeque<Option<Vec<u8>>>>,
}

impl QueueSource {
    pub fn new(polls: Vec<Option<&[u8]>>) -> Arc<Self> {
        Arc::new(Self {
            polls: Mutex::new(polls.into_iter().map(|p| p.map(|b| b.to_vec())).collect()),
        })
    }

    pub fn push(&self, poll: Option<&[u8]>) {
        self.polls
            .lock()
            .unwrap()
            .push_back(poll.map(|b| b.to_vec()));
    }
}

#[async_trait]
impl ClipboardImageSource for QueueSource {
    async fn read_image(&self) -> Option<Vec<u8>> {
        self.polls.lock().unwrap().pop_front().flatten()
    }
}

/// Extractor returning a fixed string.
pub struct StaticExtractor(pub String);

#[async_trait]
impl TextExtractor for StaticExtractor {
    async fn extract_text(&self, _image: &[u8]) -> String {
        self.0.clone()
    }
}

/// Extractor that blocks on a gate, for single-flight tests.
pub struct GatedExtractor {
    pub gate: Arc<tokio::sync::Mutex<()>>,
    pub text: String,
}

#[async_trait]
impl TextExtractor for GatedExtractor {
    async fn extract_text(&self, _image: &[u8]) -> String {
        let _open = self.gate.lock().await;
        self.text.clone()
    }
}

// ── Harness ──────────────────────────────────────────────────────────

pub struct Harness {
    pub dispatcher: Arc<Dispatcher>,
    pub pipeline: Arc<AnswerPipeline>,
    pub host: Arc<RecordingHost>,
    pub clock: Arc<ManualClock>,
    pub config: Arc<AppConfig>,
}

/// Wire a dispatcher + pipeline around the given fallback chain, with a
/// manual clock and a recording surface host.
pub fn harness(chain: Vec<Arc<dyn AnswerProvider>>) -> Harness {
    let config = Arc::new(AppConfig::from_env());
    let clock = Arc::new(ManualClock::new());
    let third_party = Arc::new(OpenAiProvider::from_config(&config));
    let dispatcher = Arc::new(Dispatcher::new(
        chain,
        third_party,
        config.clone(),
        clock.clone(),
    ));
    let host = Arc::new(RecordingHost::new());
    let sequencer = SurfaceSequencer::new(host.clone(), clock.clone());
    let pipeline = Arc::new(AnswerPipeline::new(
        dispatcher.clone(),
        sequencer,
        config.clone(),
    ));
    Harness {
        dispatcher,
        pipeline,
        host,
        clock,
        config,
    }
}
