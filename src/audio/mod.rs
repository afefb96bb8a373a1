//! Streaming audio I/O: capture/encode path and gapless playback path.
//!
//! ```text
//! microphone ─▸ FrameChunker ─▸ FrameEncoder ─▸ EncodedFrame ─▸ wire
//! wire ─▸ base64 segment ─▸ PlaybackScheduler ─▸ OutputSink ─▸ speaker
//! ```
//!
//! The capture and playback paths are independent; they meet only in
//! the session controller. Device access lives behind the
//! [`InputSource`] and [`playback::OutputSink`] traits so the whole
//! pipeline runs against test doubles.

pub mod capture;
pub mod device;
pub mod pcm;
pub mod playback;

use tokio::sync::mpsc;

use crate::error::SessionError;

/// Abstraction over the microphone capture subsystem.
///
/// `start` wires the device to a frame channel; implementations send
/// one [`EncodedFrame`] per captured frame with `try_send` (frames are
/// dropped, never queued, when the transport lags). `stop` releases the
/// device and is safe to call repeatedly.
pub trait InputSource: Send {
    fn start(&mut self, frames: mpsc::Sender<EncodedFrame>) -> Result<(), SessionError>;
    fn stop(&mut self);
    /// Most recent RMS input level, for the visualization meter.
    fn level(&self) -> f32;
}

#[allow(unused_imports)]
pub use capture::{CaptureError, EncodedFrame, FrameChunker, FrameEncoder};
#[allow(unused_imports)]
pub use device::{CpalInput, CpalOutput};
#[allow(unused_imports)]
pub use playback::{OutputSink, PlaybackScheduler, ScheduledSource, SourceId};
