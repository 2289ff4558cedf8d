//! answerglass — desktop answer helper core.
//!
//! This is the shell that wires the domains together. No business logic
//! lives here — only module declarations, component construction, and the
//! background loops.
//!
//! Domains:
//!   - dispatch.rs / providers/  — provider selection, fallback, sessions
//!   - watcher.rs / clipboard.rs — clipboard image ingestion
//!   - overlay.rs / pipeline.rs  — transient presentation surfaces
//!   - stream.rs                 — token stream parsing
//!   - ocr.rs                    — text extraction collaborator

pub mod clipboard;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod format;
pub mod ocr;
pub mod overlay;
pub mod pipeline;
pub mod providers;
pub mod session;
pub mod stream;
pub mod watcher;

use clipboard::ArboardSource;
use clock::{Clock, SystemClock};
use config::AppConfig;
use dispatch::{Dispatcher, StreamEvent};
use ocr::TesseractExtractor;
use overlay::{LogSurfaceHost, SurfaceSequencer};
use pipeline::AnswerPipeline;
use providers::{AnswerProvider, OllamaProvider, OpenAiProvider, RelayProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use watcher::ClipboardWatcher;

/// How often the primary provider is health-probed.
const PROBE_INTERVAL: Duration = Duration::from_secs(30);

/// Auto-expire check cadence for the response surface.
const EXPIRE_TICK: Duration = Duration::from_millis(500);

/// Entry point — builds the components and runs until stdin closes.
pub async fn run() {
    // Load .env.local → .env from the project root before anything reads
    // the environment.
    let manifest_dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR"));
    'env_load: for env_file in [".env.local", ".env"] {
        let path = manifest_dir.join(env_file);
        if path.exists() {
            match dotenvy::from_path(&path) {
                Ok(_) => eprintln!("[STARTUP] Loaded {}", path.display()),
                Err(e) => eprintln!("[STARTUP] Failed to load {}: {}", path.display(), e),
            }
            break 'env_load;
        }
    }

    env_logger::init();
    log::info!("answerglass starting up");

    let config = Arc::new(AppConfig::from_env());
    for info in providers::all_providers() {
        log::info!("[STARTUP] Backend: {} — {}", info.id, info.name);
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let relay = Arc::new(RelayProvider::from_config(&config));
    let ollama = Arc::new(OllamaProvider::from_config(&config));
    let chain: Vec<Arc<dyn AnswerProvider>> = vec![
        relay as Arc<dyn AnswerProvider>,
        ollama as Arc<dyn AnswerProvider>,
    ];
    let third_party = Arc::new(OpenAiProvider::from_config(&config));

    let dispatcher = Arc::new(Dispatcher::new(
        chain,
        third_party,
        config.clone(),
        clock.clone(),
    ));
    let sequencer = SurfaceSequencer::new(Arc::new(LogSurfaceHost), clock.clone());
    let pipeline = Arc::new(AnswerPipeline::new(
        dispatcher.clone(),
        sequencer,
        config.clone(),
    ));
    let watcher = Arc::new(ClipboardWatcher::new(
        Arc::new(ArboardSource),
        Arc::new(TesseractExtractor::new(config.ocr_languages())),
        pipeline.clone(),
        clock.clone(),
        config.cooldown(),
    ));
    watcher.set_enabled(config.clipboard_watch());

    // Health probe loop — the only thing that closes the circuit breaker.
    {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            loop {
                dispatcher.probe_primary().await;
                tokio::time::sleep(PROBE_INTERVAL).await;
            }
        });
    }

    // Clipboard poll loop. Keeps ticking while a pipeline is in flight.
    {
        let watcher = watcher.clone();
        tokio::spawn(async move {
            loop {
                let report = watcher.tick().await;
                log::debug!("[WATCHER] Tick: {:?}", report);
                tokio::time::sleep(watcher::POLL_INTERVAL).await;
            }
        });
    }

    // Response auto-expiry loop.
    {
        let pipeline = pipeline.clone();
        tokio::spawn(async move {
            loop {
                pipeline.expire_tick().await;
                tokio::time::sleep(EXPIRE_TICK).await;
            }
        });
    }

    // Manual input: one question per stdin line.
    log::info!("[STARTUP] Ready — type a question and press Enter (Ctrl-D quits)");
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text == "/cancel" {
            dispatcher.cancel_inflight();
            continue;
        }

        if config.stream_responses() {
            let (events, mut rx) = tokio::sync::mpsc::unbounded_channel();
            let printer = tokio::spawn(async move {
                use std::io::Write;
                while let Some(event) = rx.recv().await {
                    match event {
                        StreamEvent::Token(token) => {
                            print!("{}", token);
                            let _ = std::io::stdout().flush();
                        }
                        StreamEvent::Complete { .. } => println!(),
                        StreamEvent::Error(e) => eprintln!("stream error: {}", e),
                    }
                }
            });
            let _ = pipeline.answer_question_streaming(text, events).await;
            let _ = printer.await;
        } else {
            match pipeline.answer_question(text).await {
                Ok(answer) => {
                    let plain = format::to_plain_text(&format::to_html(&answer));
                    for chunk in format::chunk_text(&plain) {
                        println!("{}", chunk);
                    }
                }
                Err(e) => eprintln!("error: {}", e),
            }
        }
    }

    log::info!("answerglass shutting down");
}
