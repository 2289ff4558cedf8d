//! Question-to-answer orchestration.
//!
//! The multi-step flow shared by every input path (clipboard ingestion,
//! manual input, transcription): loading surface → dispatch → formatted
//! response surface. Error outcomes become response surfaces too — the
//! user always gets exactly one terminal notification per question.

use crate::config::AppConfig;
use crate::dispatch::{Dispatcher, StreamEvent};
use crate::error::DispatchError;
use crate::format;
use crate::overlay::{Surface, SurfaceSequencer};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio::sync::Mutex;

pub const DEFAULT_SESSION: &str = "default";

pub struct AnswerPipeline {
    dispatcher: Arc<Dispatcher>,
    sequencer: Mutex<SurfaceSequencer>,
    config: Arc<AppConfig>,
}

impl AnswerPipeline {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        sequencer: SurfaceSequencer,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            dispatcher,
            sequencer: Mutex::new(sequencer),
            config,
        }
    }

    /// Full flow for one question: loading surface, dispatch with fallback,
    /// response surface (answer or error text).
    pub async fn answer_question(&self, text: &str) -> Result<String, DispatchError> {
        log::info!("[PIPELINE] Question: {} chars", text.len());
        self.show(Surface::Loading("Generating an answer…".to_string()))
            .await;

        let preference = self.config.selected_provider();
        match self
            .dispatcher
            .dispatch(text, preference, DEFAULT_SESSION)
            .await
        {
            Ok(answer) => {
                self.show(Surface::Response {
                    html: format::to_html(&answer),
                    auto_expire: true,
                })
                .await;
                Ok(answer)
            }
            Err(e) => {
                log::error!("[PIPELINE] Dispatch failed: {}", e);
                let notice = match &e {
                    DispatchError::MissingCredential => {
                        "The third-party token is not configured."
                    }
                    _ => "Could not generate an answer from any source.",
                };
                self.show(Surface::Response {
                    html: format::to_html(notice),
                    auto_expire: true,
                })
                .await;
                Err(e)
            }
        }
    }

    /// Streaming flow: tokens are forwarded to `events` as they arrive and
    /// the finished answer becomes the response surface.
    pub async fn answer_question_streaming(
        &self,
        text: &str,
        events: UnboundedSender<StreamEvent>,
    ) -> Result<(), DispatchError> {
        log::info!("[PIPELINE] Question (streaming): {} chars", text.len());
        self.show(Surface::Loading("Generating an answer…".to_string()))
            .await;

        // Tap the event stream so the finished text can drive the surface
        // while the caller still sees every event live.
        let (tap_tx, mut tap_rx) = unbounded_channel::<StreamEvent>();
        let forward = tokio::spawn(async move {
            let mut full_text = None;
            while let Some(event) = tap_rx.recv().await {
                if let StreamEvent::Complete { full_text: text } = &event {
                    full_text = Some(text.clone());
                }
                let _ = events.send(event);
            }
            full_text
        });

        let result = self
            .dispatcher
            .dispatch_stream(text, DEFAULT_SESSION, tap_tx)
            .await;
        let full_text = forward.await.ok().flatten();

        match (&result, full_text) {
            (Ok(()), Some(full)) if !full.is_empty() => {
                self.show(Surface::Response {
                    html: format::to_html(&full),
                    auto_expire: true,
                })
                .await;
            }
            (Ok(()), _) => {
                self.show(Surface::Response {
                    html: format::to_html("The answer came back empty."),
                    auto_expire: true,
                })
                .await;
            }
            (Err(e), _) => {
                log::error!("[PIPELINE] Stream dispatch failed: {}", e);
                self.show(Surface::Response {
                    html: format::to_html("Could not generate an answer from any source."),
                    auto_expire: true,
                })
                .await;
            }
        }
        result
    }

    /// Shown by the watcher when a fresh clipboard image enters the
    /// pipeline, before extraction starts.
    pub async fn report_image_detected(&self) {
        self.show(Surface::Loading(
            "New image detected — extracting text…".to_string(),
        ))
        .await;
    }

    /// Extraction found no text — a valid outcome, surfaced as a response.
    pub async fn report_extraction_empty(&self) {
        self.show(Surface::Response {
            html: format::to_html("No text found in the image."),
            auto_expire: true,
        })
        .await;
    }

    /// Drive response auto-expiry. Called from the runtime's timer loop.
    pub async fn expire_tick(&self) {
        self.sequencer.lock().await.tick().await;
    }

    async fn show(&self, surface: Surface) {
        self.sequencer.lock().await.show(surface).await;
    }
}
