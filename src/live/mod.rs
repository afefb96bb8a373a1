//! Live translation connection: capability interface and bindings.
//!
//! The session controller talks to the remote streaming service only
//! through [`LiveConnection`]; the concrete WebSocket binding lives in
//! [`gemini`]. Tests substitute scripted fakes.

pub mod gemini;

use async_trait::async_trait;

use crate::audio::EncodedFrame;
use crate::config::AppConfig;

// ── Inbound events ─────────────────────────────────────────────────

/// Events produced by a live translation connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveEvent {
    /// The remote session is set up and ready to stream.
    Opened,
    /// One synthesized audio segment: base64 PCM16LE at the configured
    /// output sample rate. Left undecoded — the playback scheduler owns
    /// decoding and decode-failure recovery.
    AudioSegment { data: String },
    /// A fragment of translated transcript text for the current turn.
    PartialText { text: String },
    /// The current response turn is complete.
    TurnComplete,
    /// Synthesized output was cut off by new user speech.
    Interrupted,
    /// Remote error.
    Error { message: String },
    /// The connection closed.
    Closed,
}

// ── Capability interface ───────────────────────────────────────────

/// One open streaming connection to the translation service.
#[async_trait]
pub trait LiveConnection: Send + Sync {
    /// Send one captured audio frame. Transport rejections are the
    /// caller's cue to drop the frame, not to retry.
    async fn send_frame(&self, frame: EncodedFrame) -> anyhow::Result<()>;

    /// Send a manual text-translation request as a complete turn.
    async fn send_text(&self, text: &str) -> anyhow::Result<()>;

    /// Receive the next inbound event. `None` when the connection is
    /// gone and fully drained.
    async fn recv_event(&self) -> Option<LiveEvent>;

    /// Close the connection gracefully.
    async fn close(&self);
}

/// Opens [`LiveConnection`]s; the seam for injecting fakes in tests.
#[async_trait]
pub trait LiveConnector: Send + Sync {
    async fn connect(&self, config: &AppConfig) -> anyhow::Result<Box<dyn LiveConnection>>;
}

#[allow(unused_imports)]
pub use gemini::{GeminiConnector, GeminiLiveConnection};
