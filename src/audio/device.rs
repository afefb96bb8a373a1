//! cpal bindings for the microphone input and the speaker output.
//!
//! `cpal::Stream` is `!Send`, so each binding parks its stream on a
//! dedicated audio thread and hands out a `Send` handle. The input
//! thread resamples device audio to the pipeline rate, cuts it into
//! fixed frames, encodes, and pushes frames over a bounded channel with
//! `try_send` — a full channel drops the frame rather than queuing
//! latency. The output thread drains a shared ring buffer; the buffer
//! head doubles as the output clock.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::mpsc;

use super::capture::{EncodedFrame, FrameChunker, FrameEncoder};
use super::pcm;
use super::playback::{OutputSink, SourceId};
use super::InputSource;
use crate::error::SessionError;

/// Map a stream-build failure onto the session taxonomy. cpal reports
/// OS permission refusals as backend-specific errors, so the message
/// text is the only signal available.
fn classify_build_error(error: &cpal::BuildStreamError) -> SessionError {
    match error {
        cpal::BuildStreamError::DeviceNotAvailable => SessionError::DeviceUnavailable,
        cpal::BuildStreamError::BackendSpecific { err } => {
            let description = err.description.to_ascii_lowercase();
            if description.contains("permission")
                || description.contains("denied")
                || description.contains("not authorized")
            {
                SessionError::PermissionDenied
            } else {
                SessionError::DeviceUnavailable
            }
        }
        _ => SessionError::DeviceUnavailable,
    }
}

// ── Microphone input ───────────────────────────────────────────────

/// Microphone capture handle. One live capture stream at a time.
pub struct CpalInput {
    frame_size: usize,
    target_rate: u32,
    level: Arc<AtomicU32>,
    stop_tx: Option<crossbeam_channel::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CpalInput {
    pub fn new(frame_size: usize, target_rate: u32) -> Self {
        Self {
            frame_size,
            target_rate,
            level: Arc::new(AtomicU32::new(0)),
            stop_tx: None,
            thread: None,
        }
    }
}

impl InputSource for CpalInput {
    fn start(&mut self, frames: mpsc::Sender<EncodedFrame>) -> Result<(), SessionError> {
        if self.stop_tx.is_some() {
            return Ok(());
        }

        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        let level = Arc::clone(&self.level);
        let frame_size = self.frame_size;
        let target_rate = self.target_rate;

        let thread = std::thread::spawn(move || {
            input_thread(frame_size, target_rate, frames, level, ready_tx, stop_rx);
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.stop_tx = Some(stop_tx);
                self.thread = Some(thread);
                Ok(())
            }
            Ok(Err(error)) => {
                let _ = thread.join();
                Err(error)
            }
            Err(_) => {
                let _ = thread.join();
                Err(SessionError::DeviceUnavailable)
            }
        }
    }

    fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        self.level.store(0.0f32.to_bits(), Ordering::Relaxed);
    }

    fn level(&self) -> f32 {
        f32::from_bits(self.level.load(Ordering::Relaxed))
    }
}

impl Drop for CpalInput {
    fn drop(&mut self) {
        self.stop(); // independently guarded, safe after an earlier stop
    }
}

/// Owns the cpal input stream for the life of the capture.
fn input_thread(
    frame_size: usize,
    target_rate: u32,
    frames: mpsc::Sender<EncodedFrame>,
    level: Arc<AtomicU32>,
    ready_tx: crossbeam_channel::Sender<Result<(), SessionError>>,
    stop_rx: crossbeam_channel::Receiver<()>,
) {
    let build = || -> Result<cpal::Stream, SessionError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(SessionError::DeviceUnavailable)?;
        let supported = device
            .default_input_config()
            .map_err(|_| SessionError::DeviceUnavailable)?;

        let source_rate = supported.sample_rate();
        let channels = supported.channels();
        tracing::info!(source_rate, channels, target_rate, "Opening microphone");

        let encoder = FrameEncoder::new(frame_size, target_rate);
        let mut chunker = FrameChunker::new(frame_size);

        let stream = device
            .build_input_stream(
                &supported.config(),
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let mono = pcm::downmix_to_mono(data, channels);
                    level.store(pcm::rms_level(&mono).to_bits(), Ordering::Relaxed);

                    let resampled = pcm::resample_linear(&mono, source_rate, target_rate);
                    chunker.push(&resampled, |frame| {
                        match encoder.encode(frame) {
                            // Backpressure policy: stale audio is dropped,
                            // never queued.
                            Ok(encoded) => {
                                let _ = frames.try_send(encoded);
                            }
                            Err(error) => {
                                tracing::warn!(%error, "Capture frame rejected");
                            }
                        }
                    });
                },
                |error| tracing::warn!(%error, "Microphone stream error"),
                None,
            )
            .map_err(|e| classify_build_error(&e))?;

        stream
            .play()
            .map_err(|_| SessionError::DeviceUnavailable)?;
        Ok(stream)
    };

    match build() {
        Ok(stream) => {
            let _ = ready_tx.send(Ok(()));
            let _ = stop_rx.recv();
            drop(stream);
            tracing::debug!("Microphone released");
        }
        Err(error) => {
            let _ = ready_tx.send(Err(error));
        }
    }
}

// ── Speaker output ─────────────────────────────────────────────────

/// Ring buffer shared between the output callback and the sink handle.
/// `head` counts device frames consumed since the stream opened and is
/// the output clock: it advances whether or not audio is queued.
struct OutShared {
    head: u64,
    buffer: VecDeque<f32>,
}

/// Speaker output handle implementing [`OutputSink`] over a device
/// stream owned by a dedicated thread.
pub struct CpalOutput {
    shared: Arc<Mutex<OutShared>>,
    device_rate: u32,
    source_rate: u32,
    stop_tx: Option<crossbeam_channel::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CpalOutput {
    /// Open the default output device. `source_rate` is the rate of the
    /// segments the scheduler will hand over.
    pub fn open(source_rate: u32) -> Result<Self, SessionError> {
        let shared = Arc::new(Mutex::new(OutShared {
            head: 0,
            buffer: VecDeque::new(),
        }));
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        let shared_for_thread = Arc::clone(&shared);

        let thread = std::thread::spawn(move || {
            output_thread(shared_for_thread, ready_tx, stop_rx);
        });

        match ready_rx.recv() {
            Ok(Ok(device_rate)) => Ok(Self {
                shared,
                device_rate,
                source_rate,
                stop_tx: Some(stop_tx),
                thread: Some(thread),
            }),
            Ok(Err(error)) => {
                let _ = thread.join();
                Err(error)
            }
            Err(_) => {
                let _ = thread.join();
                Err(SessionError::DeviceUnavailable)
            }
        }
    }

    /// Release the output device.
    pub fn close(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.close();
    }
}

impl OutputSink for CpalOutput {
    fn now(&self) -> f64 {
        let shared = self.shared.lock();
        shared.head as f64 / f64::from(self.device_rate)
    }

    fn play_at(&mut self, _id: SourceId, samples: Vec<f32>, start: f64) {
        let device_samples = pcm::resample_linear(&samples, self.source_rate, self.device_rate);
        let mut shared = self.shared.lock();

        let start_frame = (start * f64::from(self.device_rate)).round() as u64;
        let queue_end = shared.head + shared.buffer.len() as u64;
        if start_frame > queue_end {
            // Pad silence up to the scheduled offset
            let gap = (start_frame - queue_end) as usize;
            shared.buffer.extend(std::iter::repeat(0.0).take(gap));
        }
        shared.buffer.extend(device_samples);
    }

    fn clear(&mut self) {
        self.shared.lock().buffer.clear();
    }
}

/// Owns the cpal output stream. Fills device buffers from the shared
/// ring, with silence when the ring runs dry.
fn output_thread(
    shared: Arc<Mutex<OutShared>>,
    ready_tx: crossbeam_channel::Sender<Result<u32, SessionError>>,
    stop_rx: crossbeam_channel::Receiver<()>,
) {
    let build = || -> Result<(cpal::Stream, u32), SessionError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(SessionError::DeviceUnavailable)?;
        let supported = device
            .default_output_config()
            .map_err(|_| SessionError::DeviceUnavailable)?;

        let device_rate = supported.sample_rate();
        let channels = usize::from(supported.channels()).max(1);
        tracing::info!(device_rate, channels, "Opening speaker output");

        let shared_cb = Arc::clone(&shared);
        let stream = device
            .build_output_stream(
                &supported.config(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut sh = shared_cb.lock();
                    for frame in data.chunks_mut(channels) {
                        let sample = sh.buffer.pop_front().unwrap_or(0.0);
                        for out in frame.iter_mut() {
                            *out = sample;
                        }
                        sh.head += 1;
                    }
                },
                |error| tracing::warn!(%error, "Speaker stream error"),
                None,
            )
            .map_err(|e| classify_build_error(&e))?;

        stream
            .play()
            .map_err(|_| SessionError::DeviceUnavailable)?;
        Ok((stream, device_rate))
    };

    match build() {
        Ok((stream, device_rate)) => {
            let _ = ready_tx.send(Ok(device_rate));
            let _ = stop_rx.recv();
            drop(stream);
            tracing::debug!("Speaker output released");
        }
        Err(error) => {
            let _ = ready_tx.send(Err(error));
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_not_available_maps_to_device_unavailable() {
        let error = cpal::BuildStreamError::DeviceNotAvailable;
        assert_eq!(classify_build_error(&error), SessionError::DeviceUnavailable);
    }

    #[test]
    fn permission_text_maps_to_permission_denied() {
        let error = cpal::BuildStreamError::BackendSpecific {
            err: cpal::BackendSpecificError {
                description: "Input device access denied by the user".into(),
            },
        };
        assert_eq!(classify_build_error(&error), SessionError::PermissionDenied);
    }

    #[test]
    fn other_backend_errors_map_to_device_unavailable() {
        let error = cpal::BuildStreamError::BackendSpecific {
            err: cpal::BackendSpecificError {
                description: "alsa: underrun".into(),
            },
        };
        assert_eq!(classify_build_error(&error), SessionError::DeviceUnavailable);
    }
}
