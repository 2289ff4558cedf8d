//! Clipboard image watcher.
//!
//! Polls the clipboard on a fixed interval and routes newly-copied images
//! into text extraction and dispatch. Two hashes keep the bookkeeping
//! honest: `last_seen` distinguishes "still the same clipboard content"
//! from new content, and `last_processed` (+ timestamp) gates reprocessing
//! of an image that was already answered within the cooldown window.
//!
//! At most one image pipeline runs at a time. The poll keeps ticking while
//! one is in flight; candidates seen meanwhile are hash-recorded but never
//! dispatched. The single-flight lock is released by an RAII guard on
//! every exit path.

use crate::clipboard::ClipboardImageSource;
use crate::clock::Clock;
use crate::ocr::TextExtractor;
use crate::pipeline::AnswerPipeline;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Clipboard poll cadence.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// What one poll tick did. Logged, and asserted on by tests.
#[derive(Debug, Clone, PartialEq)]
pub enum TickReport {
    /// Ingestion is switched off.
    Disabled,
    /// No image on the clipboard (and none last tick either).
    NoImage,
    /// The clipboard no longer holds an image; `last_seen` was reset.
    Cleared,
    /// Same image as last tick.
    Unchanged,
    /// Already processed recently; recorded as seen, not dispatched.
    CooldownSuppressed,
    /// Another image is mid-pipeline; recorded as seen, not dispatched.
    Busy,
    /// Extraction found no text — valid empty outcome.
    ExtractionEmpty,
    /// The image went all the way to an answer.
    Dispatched,
    /// Extraction succeeded but dispatch failed.
    DispatchFailed(String),
}

#[derive(Default)]
struct FingerprintState {
    last_seen: Option<String>,
    last_processed: Option<String>,
    last_processed_at: Option<Instant>,
}

pub struct ClipboardWatcher {
    source: Arc<dyn ClipboardImageSource>,
    extractor: Arc<dyn TextExtractor>,
    pipeline: Arc<AnswerPipeline>,
    clock: Arc<dyn Clock>,
    cooldown: Duration,
    enabled: AtomicBool,
    state: Mutex<FingerprintState>,
    processing: Arc<AtomicBool>,
}

/// Releases the single-flight lock when dropped, whatever the exit path.
struct ProcessingGuard(Arc<AtomicBool>);

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Content hash used to recognize repeat images without comparing bytes.
pub fn fingerprint(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

impl ClipboardWatcher {
    pub fn new(
        source: Arc<dyn ClipboardImageSource>,
        extractor: Arc<dyn TextExtractor>,
        pipeline: Arc<AnswerPipeline>,
        clock: Arc<dyn Clock>,
        cooldown: Duration,
    ) -> Self {
        Self {
            source,
            extractor,
            pipeline,
            clock,
            cooldown,
            enabled: AtomicBool::new(true),
            state: Mutex::new(FingerprintState::default()),
            processing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        log::info!(
            "[WATCHER] Clipboard ingestion {}",
            if enabled { "enabled" } else { "disabled" }
        );
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// One poll of the clipboard state machine.
    pub async fn tick(&self) -> TickReport {
        if !self.enabled.load(Ordering::SeqCst) {
            return TickReport::Disabled;
        }

        let bytes = match self.source.read_image().await {
            Some(bytes) => bytes,
            None => {
                let mut state = self.state.lock().unwrap();
                if state.last_seen.take().is_some() {
                    log::debug!("[WATCHER] Clipboard emptied of image");
                    return TickReport::Cleared;
                }
                return TickReport::NoImage;
            }
        };

        let hash = fingerprint(&bytes);

        // All bookkeeping decisions happen under the state lock, with no
        // suspension points until the pipeline is entered.
        {
            let mut state = self.state.lock().unwrap();

            if state.last_seen.as_deref() == Some(hash.as_str()) {
                return TickReport::Unchanged;
            }

            let now = self.clock.now();
            let in_cooldown = state.last_processed.as_deref() == Some(hash.as_str())
                && state
                    .last_processed_at
                    .map(|at| now.duration_since(at) < self.cooldown)
                    .unwrap_or(false);
            if in_cooldown {
                log::debug!("[WATCHER] Image within cooldown — recorded, not dispatched");
                state.last_seen = Some(hash);
                return TickReport::CooldownSuppressed;
            }

            if self
                .processing
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                log::debug!("[WATCHER] Pipeline busy — recorded, not dispatched");
                state.last_seen = Some(hash);
                return TickReport::Busy;
            }

            state.last_processed = Some(hash.clone());
            state.last_processed_at = Some(now);
            state.last_seen = Some(hash);
        }

        // Single-flight lock is held from here; the guard releases it on
        // every exit path below.
        let _guard = ProcessingGuard(self.processing.clone());

        log::info!("[WATCHER] New clipboard image — processing");
        self.pipeline.report_image_detected().await;

        let text = self.extractor.extract_text(&bytes).await;
        if text.trim().is_empty() {
            log::warn!("[WATCHER] No text found in clipboard image");
            self.pipeline.report_extraction_empty().await;
            return TickReport::ExtractionEmpty;
        }

        match self.pipeline.answer_question(&text).await {
            Ok(_) => TickReport::Dispatched,
            Err(e) => TickReport::DispatchFailed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_and_content_sensitive() {
        let a = fingerprint(b"image-a");
        assert_eq!(a, fingerprint(b"image-a"));
        assert_ne!(a, fingerprint(b"image-b"));
        assert_eq!(a.len(), 64);
    }
}
