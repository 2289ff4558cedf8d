//! Ephemeral presentation surfaces — the sequencer that keeps at most one
//! alive.
//!
//! Any transition first fully tears down the current surface and waits for
//! the host to acknowledge teardown (its `destroy()` returning) before the
//! next surface is constructed. This replaces the sleep-then-create pattern
//! with an explicit completion guard, so no two surfaces ever overlap.
//!
//! Response surfaces auto-expire after a fixed duration unless superseded
//! earlier; expiry is driven by `tick()` against the injected clock, not by
//! a real timer.

use crate::clock::Clock;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long a response surface stays up before expiring back to idle.
pub const RESPONSE_TTL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq)]
pub enum Surface {
    Loading(String),
    Recording(String),
    Response { html: String, auto_expire: bool },
    CaptureIndicator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    Loading,
    Recording,
    Response,
    CaptureIndicator,
}

impl Surface {
    pub fn kind(&self) -> SurfaceKind {
        match self {
            Surface::Loading(_) => SurfaceKind::Loading,
            Surface::Recording(_) => SurfaceKind::Recording,
            Surface::Response { .. } => SurfaceKind::Response,
            Surface::CaptureIndicator => SurfaceKind::CaptureIndicator,
        }
    }
}

/// Renders surfaces. `destroy()` must not return until teardown is complete
/// (listeners unregistered, window gone) — the sequencer relies on that as
/// its ordering guarantee.
#[async_trait]
pub trait SurfaceHost: Send + Sync {
    async fn create(&self, surface: &Surface);
    async fn destroy(&self, kind: SurfaceKind);
}

/// Headless host: surfaces go to the log. The default when no windowing
/// collaborator is wired in.
pub struct LogSurfaceHost;

#[async_trait]
impl SurfaceHost for LogSurfaceHost {
    async fn create(&self, surface: &Surface) {
        match surface {
            Surface::Loading(text) => log::info!("[OVERLAY] ⏳ {}", text),
            Surface::Recording(text) => log::info!("[OVERLAY] ● {}", text),
            Surface::Response { html, .. } => log::info!("[OVERLAY] Response: {}", html),
            Surface::CaptureIndicator => log::info!("[OVERLAY] Capturing…"),
        }
    }

    async fn destroy(&self, kind: SurfaceKind) {
        log::debug!("[OVERLAY] Destroyed {:?}", kind);
    }
}

pub struct SurfaceSequencer {
    host: Arc<dyn SurfaceHost>,
    clock: Arc<dyn Clock>,
    current: Option<SurfaceKind>,
    expires_at: Option<Instant>,
}

impl SurfaceSequencer {
    pub fn new(host: Arc<dyn SurfaceHost>, clock: Arc<dyn Clock>) -> Self {
        Self {
            host,
            clock,
            current: None,
            expires_at: None,
        }
    }

    /// Replace whatever is showing with `surface`. The previous surface is
    /// fully destroyed — and its teardown awaited — before construction.
    pub async fn show(&mut self, surface: Surface) {
        if let Some(kind) = self.current.take() {
            self.host.destroy(kind).await;
        }
        self.expires_at = match &surface {
            Surface::Response {
                auto_expire: true, ..
            } => Some(self.clock.now() + RESPONSE_TTL),
            _ => None,
        };
        self.host.create(&surface).await;
        self.current = Some(surface.kind());
    }

    /// Tear down the current surface, returning to idle.
    pub async fn clear(&mut self) {
        if let Some(kind) = self.current.take() {
            self.host.destroy(kind).await;
        }
        self.expires_at = None;
    }

    /// Drive auto-expiry. A response surface past its deadline is torn
    /// down; anything shown since has already cleared the deadline.
    pub async fn tick(&mut self) {
        if let Some(deadline) = self.expires_at {
            if self.clock.now() >= deadline {
                log::info!("[OVERLAY] Response expired");
                self.clear().await;
            }
        }
    }

    pub fn current(&self) -> Option<SurfaceKind> {
        self.current
    }
}
