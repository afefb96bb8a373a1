//! Capture encoder: fixed-size microphone frames → base64 PCM16LE wire
//! frames.
//!
//! The encoder is synchronous and stateless beyond its configuration:
//! one [`EncodedFrame`] per input frame, produced the moment the frame
//! arrives. Device callbacks deliver arbitrary buffer sizes, so the
//! [`FrameChunker`] sits in front of the encoder and re-cuts them into
//! exact frames.

use base64::Engine;
use thiserror::Error;

use super::pcm;

/// A base64-encoded PCM16LE frame ready for the outbound wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    /// MIME-like descriptor carrying the sample rate, e.g.
    /// `audio/pcm;rate=16000`.
    pub mime_type: String,
    /// Base64 of the frame's little-endian 16-bit samples.
    pub data: String,
}

/// Capture-side errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    /// The frame does not match the configured frame size. Frames are
    /// never resized or passed through at the wrong length.
    #[error("frame of {got} samples does not match configured frame size {want}")]
    FrameSize { got: usize, want: usize },
}

// ── Frame encoder ──────────────────────────────────────────────────

/// Converts fixed-size f32 frames into [`EncodedFrame`]s.
#[derive(Debug, Clone)]
pub struct FrameEncoder {
    frame_size: usize,
    mime_type: String,
}

impl FrameEncoder {
    /// Frame size and sample rate are fixed for the session.
    pub fn new(frame_size: usize, sample_rate: u32) -> Self {
        Self {
            frame_size,
            mime_type: format!("audio/pcm;rate={sample_rate}"),
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Encode one frame. Rejects frames of any other length.
    pub fn encode(&self, frame: &[f32]) -> Result<EncodedFrame, CaptureError> {
        if frame.len() != self.frame_size {
            return Err(CaptureError::FrameSize {
                got: frame.len(),
                want: self.frame_size,
            });
        }

        let pcm = pcm::i16_to_le_bytes(&pcm::f32_to_i16(frame));
        Ok(EncodedFrame {
            mime_type: self.mime_type.clone(),
            data: base64::engine::general_purpose::STANDARD.encode(pcm),
        })
    }
}

// ── Frame chunker ──────────────────────────────────────────────────

/// Re-cuts arbitrarily sized capture callbacks into exact frames.
///
/// Holds at most one partial frame of samples; anything beyond a full
/// frame is emitted immediately.
#[derive(Debug)]
pub struct FrameChunker {
    frame_size: usize,
    pending: Vec<f32>,
}

impl FrameChunker {
    pub fn new(frame_size: usize) -> Self {
        Self {
            frame_size,
            pending: Vec::with_capacity(frame_size),
        }
    }

    /// Append captured samples, invoking `emit` once per completed frame.
    pub fn push(&mut self, samples: &[f32], mut emit: impl FnMut(&[f32])) {
        self.pending.extend_from_slice(samples);
        while self.pending.len() >= self.frame_size {
            let rest = self.pending.split_off(self.frame_size);
            emit(&self.pending);
            self.pending = rest;
        }
    }

    /// Drop any buffered partial frame (session teardown).
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    #[cfg(test)]
    fn buffered(&self) -> usize {
        self.pending.len()
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_one_frame_per_input_frame() {
        let encoder = FrameEncoder::new(4, 16_000);
        let frame = encoder.encode(&[0.0, 0.5, -0.5, 1.0]).unwrap();
        assert_eq!(frame.mime_type, "audio/pcm;rate=16000");

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&frame.data)
            .unwrap();
        assert_eq!(bytes.len(), 8); // 4 samples * 2 bytes
        let samples = pcm::le_bytes_to_i16(&bytes);
        assert_eq!(samples[0], 0);
        assert_eq!(samples[1], 16383);
        assert_eq!(samples[3], 32767);
    }

    #[test]
    fn wrong_size_frame_rejected() {
        let encoder = FrameEncoder::new(4, 16_000);
        assert_eq!(
            encoder.encode(&[0.0; 3]),
            Err(CaptureError::FrameSize { got: 3, want: 4 })
        );
        assert_eq!(
            encoder.encode(&[0.0; 5]),
            Err(CaptureError::FrameSize { got: 5, want: 4 })
        );
    }

    #[test]
    fn encoding_is_deterministic() {
        let encoder = FrameEncoder::new(2, 16_000);
        let a = encoder.encode(&[0.25, -0.25]).unwrap();
        let b = encoder.encode(&[0.25, -0.25]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn chunker_cuts_exact_frames() {
        let mut chunker = FrameChunker::new(4);
        let mut frames = Vec::new();

        chunker.push(&[1.0, 2.0, 3.0], |f| frames.push(f.to_vec()));
        assert!(frames.is_empty());
        assert_eq!(chunker.buffered(), 3);

        chunker.push(&[4.0, 5.0], |f| frames.push(f.to_vec()));
        assert_eq!(frames, vec![vec![1.0, 2.0, 3.0, 4.0]]);
        assert_eq!(chunker.buffered(), 1);
    }

    #[test]
    fn chunker_emits_multiple_frames_from_one_push() {
        let mut chunker = FrameChunker::new(2);
        let mut frames = Vec::new();
        chunker.push(&[1.0, 2.0, 3.0, 4.0, 5.0], |f| frames.push(f.to_vec()));
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1], vec![3.0, 4.0]);
        assert_eq!(chunker.buffered(), 1);
    }

    #[test]
    fn chunker_clear_drops_partial() {
        let mut chunker = FrameChunker::new(4);
        chunker.push(&[1.0, 2.0], |_| {});
        chunker.clear();
        assert_eq!(chunker.buffered(), 0);
    }
}
