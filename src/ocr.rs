//! Text extraction collaborator.
//!
//! The dispatcher-facing contract is deliberately forgiving: extraction
//! returns a string, possibly empty, and never an error — failures are
//! logged and treated as "no text found". The default adapter shells out
//! to the tesseract binary, which is how every capture tool on this path
//! gets invoked.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

/// Extract text from an encoded image. Empty string means no text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, image: &[u8]) -> String;
}

/// Shell adapter around the tesseract CLI.
pub struct TesseractExtractor {
    binary: Option<PathBuf>,
    languages: String,
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

impl TesseractExtractor {
    /// Locates the tesseract binary on PATH. Extraction degrades to empty
    /// results when it is missing (the degradation is logged once here).
    pub fn new(languages: &str) -> Self {
        let binary = which::which("tesseract").ok();
        if binary.is_none() {
            log::warn!("[OCR] tesseract not found on PATH — extraction will return empty text");
        }
        Self {
            binary,
            languages: languages.to_string(),
        }
    }

    fn temp_path() -> PathBuf {
        let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("answerglass-ocr-{}-{}.png", std::process::id(), n))
    }
}

#[async_trait]
impl TextExtractor for TesseractExtractor {
    async fn extract_text(&self, image: &[u8]) -> String {
        let binary = match &self.binary {
            Some(b) => b.clone(),
            None => return String::new(),
        };

        let input = Self::temp_path();
        if let Err(e) = tokio::fs::write(&input, image).await {
            log::error!("[OCR] Failed to write temp image: {}", e);
            return String::new();
        }

        // `stdout` as the output base makes tesseract print the text
        // instead of writing a file.
        let output = tokio::process::Command::new(&binary)
            .arg(&input)
            .arg("stdout")
            .arg("-l")
            .arg(&self.languages)
            .output()
            .await;

        let _ = tokio::fs::remove_file(&input).await;

        match output {
            Ok(out) if out.status.success() => {
                let text = String::from_utf8_lossy(&out.stdout).trim().to_string();
                log::info!("[OCR] Extracted {} chars", text.len());
                text
            }
            Ok(out) => {
                log::error!(
                    "[OCR] tesseract exited with {}: {}",
                    out.status,
                    String::from_utf8_lossy(&out.stderr).trim()
                );
                String::new()
            }
            Err(e) => {
                log::error!("[OCR] Failed to run tesseract: {}", e);
                String::new()
            }
        }
    }
}
