//! Gapless playback scheduling for streamed PCM segments.
//!
//! Segments arrive asynchronously from the live connection, each a
//! base64 PCM16LE chunk of arbitrary duration. The scheduler decodes
//! each one and starts it exactly when the previous segment ends (or
//! immediately when nothing is queued), against a monotonic
//! "next available start time" clock owned by this instance:
//!
//! ```text
//! enqueue(seg) ─▸ decode ─▸ start = max(clock, sink.now())
//!                           sink.play_at(id, samples, start)
//!                           clock = start + duration
//! ```
//!
//! `cancel_all` (barge-in, session stop) silences everything at once and
//! resets the clock to zero so the next segment starts at "now" instead
//! of a stale future time.

use base64::Engine;

use super::pcm;

/// Identifier of a scheduled playback source.
pub type SourceId = u64;

// ── Output sink seam ───────────────────────────────────────────────

/// Abstraction over the shared audio output device.
///
/// Object-safe so the scheduler can hold `Box<dyn OutputSink>`; the real
/// binding renders to cpal, tests use a manual clock.
pub trait OutputSink: Send {
    /// Current position of the output clock, in seconds. Monotonically
    /// non-decreasing for the life of the sink.
    fn now(&self) -> f64;

    /// Render `samples` (mono, at the scheduler's sample rate) starting
    /// at absolute clock time `start`.
    fn play_at(&mut self, id: SourceId, samples: Vec<f32>, start: f64);

    /// Drop everything scheduled and silence the device immediately.
    fn clear(&mut self);
}

// ── Scheduled sources ──────────────────────────────────────────────

/// An in-flight playback source: where it starts and how long it runs.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledSource {
    pub id: SourceId,
    /// Absolute start time on the output clock, seconds.
    pub start: f64,
    /// Segment duration, seconds.
    pub duration: f64,
}

impl ScheduledSource {
    /// Absolute end time on the output clock, seconds.
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

// ── Scheduler ──────────────────────────────────────────────────────

/// Orders inbound segments into seamless, non-overlapping playback.
pub struct PlaybackScheduler {
    sink: Box<dyn OutputSink>,
    sample_rate: u32,
    enabled: bool,
    /// Next available start time ("PlaybackClock"). Reset to zero by
    /// `cancel_all`, otherwise only ever advanced.
    next_start: f64,
    next_id: SourceId,
    active: Vec<ScheduledSource>,
}

impl PlaybackScheduler {
    /// `sample_rate` is the fixed rate of inbound segments.
    pub fn new(sink: Box<dyn OutputSink>, sample_rate: u32) -> Self {
        Self {
            sink,
            sample_rate,
            enabled: true,
            next_start: 0.0,
            next_id: 0,
            active: Vec::new(),
        }
    }

    /// Toggle playback (mute). While disabled, segments are dropped
    /// before decoding and the clock does not advance.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Decode and schedule one inbound segment.
    ///
    /// Returns the scheduled source, or `None` when the segment was
    /// dropped: playback muted, empty payload, or a payload that failed
    /// to decode (logged, never fatal — upstream variance).
    pub fn enqueue(&mut self, payload: &str) -> Option<ScheduledSource> {
        if !self.enabled {
            return None;
        }

        let bytes = match base64::engine::general_purpose::STANDARD.decode(payload) {
            Ok(bytes) => bytes,
            Err(error) => {
                tracing::warn!(%error, "Dropping undecodable audio segment");
                return None;
            }
        };
        let samples = pcm::i16_to_f32(&pcm::le_bytes_to_i16(&bytes));
        if samples.is_empty() {
            return None;
        }

        let duration = pcm::duration_secs(samples.len(), self.sample_rate);
        let start = self.next_start.max(self.sink.now());
        let id = self.next_id;
        self.next_id += 1;

        self.sink.play_at(id, samples, start);
        self.next_start = start + duration;

        let source = ScheduledSource {
            id,
            start,
            duration,
        };
        self.active.push(source.clone());
        tracing::trace!(
            id,
            start,
            duration,
            clock = self.next_start,
            "Scheduled playback segment"
        );
        Some(source)
    }

    /// Stop every in-flight source and reset the clock, so the next
    /// segment starts at "now". Invoked on barge-in and session stop.
    pub fn cancel_all(&mut self) {
        if !self.active.is_empty() {
            tracing::debug!(cancelled = self.active.len(), "Cancelling all playback");
        }
        self.sink.clear();
        self.active.clear();
        self.next_start = 0.0;
    }

    /// Drop sources whose playback has ended naturally. Called from the
    /// session's poll loop.
    pub fn reap(&mut self) {
        let now = self.sink.now();
        self.active.retain(|s| s.end() > now);
    }

    /// Number of sources scheduled or playing.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Current value of the playback clock (next available start time).
    pub fn playback_clock(&self) -> f64 {
        self.next_start
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    const RATE: u32 = 24_000;

    #[derive(Default)]
    struct SinkState {
        now: f64,
        plays: Vec<(SourceId, usize, f64)>,
        cleared: u32,
    }

    /// Manual-clock sink: tests drive `now` and observe scheduling.
    #[derive(Clone)]
    struct ManualSink {
        state: Arc<Mutex<SinkState>>,
    }

    impl ManualSink {
        fn new() -> (Self, Arc<Mutex<SinkState>>) {
            let state = Arc::new(Mutex::new(SinkState::default()));
            (
                Self {
                    state: Arc::clone(&state),
                },
                state,
            )
        }
    }

    impl OutputSink for ManualSink {
        fn now(&self) -> f64 {
            self.state.lock().now
        }
        fn play_at(&mut self, id: SourceId, samples: Vec<f32>, start: f64) {
            self.state.lock().plays.push((id, samples.len(), start));
        }
        fn clear(&mut self) {
            self.state.lock().cleared += 1;
        }
    }

    /// Base64 payload of `secs` seconds of silence at `RATE`.
    fn segment(secs: f64) -> String {
        let samples = vec![0i16; (secs * f64::from(RATE)).round() as usize];
        base64::engine::general_purpose::STANDARD.encode(pcm::i16_to_le_bytes(&samples))
    }

    fn scheduler() -> (PlaybackScheduler, Arc<Mutex<SinkState>>) {
        let (sink, state) = ManualSink::new();
        (PlaybackScheduler::new(Box::new(sink), RATE), state)
    }

    #[test]
    fn sequential_segments_are_gapless_and_non_overlapping() {
        let (mut sched, _) = scheduler();
        let durations = [0.5, 0.3, 0.4, 0.25];
        let sources: Vec<ScheduledSource> = durations
            .iter()
            .map(|&d| sched.enqueue(&segment(d)).unwrap())
            .collect();

        for pair in sources.windows(2) {
            assert!(pair[1].start >= pair[0].start, "starts must be non-decreasing");
            assert!(
                (pair[1].start - pair[0].end()).abs() < 1e-9,
                "segment must start exactly when the previous ends"
            );
        }
        let total: f64 = durations.iter().sum();
        assert!((sched.playback_clock() - total).abs() < 1e-6);
    }

    #[test]
    fn first_segment_starts_at_device_now() {
        let (mut sched, state) = scheduler();
        state.lock().now = 3.25;
        let source = sched.enqueue(&segment(0.5)).unwrap();
        assert!((source.start - 3.25).abs() < 1e-9);
        assert!((sched.playback_clock() - 3.75).abs() < 1e-9);
    }

    #[test]
    fn clock_never_schedules_in_the_past() {
        let (mut sched, state) = scheduler();
        sched.enqueue(&segment(0.1)).unwrap();
        // Device time races past the queued audio
        state.lock().now = 5.0;
        let late = sched.enqueue(&segment(0.2)).unwrap();
        assert!((late.start - 5.0).abs() < 1e-9);
    }

    #[test]
    fn cancel_all_resets_clock_to_now() {
        let (mut sched, state) = scheduler();
        sched.enqueue(&segment(2.0)).unwrap();
        sched.enqueue(&segment(2.0)).unwrap();
        assert!(sched.playback_clock() >= 4.0);

        sched.cancel_all();
        assert_eq!(sched.active_count(), 0);
        assert_eq!(state.lock().cleared, 1);
        assert_eq!(sched.playback_clock(), 0.0);

        state.lock().now = 1.0;
        let fresh = sched.enqueue(&segment(0.5)).unwrap();
        assert!(
            (fresh.start - 1.0).abs() < 1e-9,
            "post-cancel segment must start at now, not at the stale clock"
        );
    }

    #[test]
    fn undecodable_segment_is_dropped_and_playback_continues() {
        let (mut sched, _) = scheduler();
        sched.enqueue(&segment(0.5)).unwrap();
        assert!(sched.enqueue("!!!not-base64!!!").is_none());
        let next = sched.enqueue(&segment(0.5)).unwrap();
        assert!((next.start - 0.5).abs() < 1e-9);
        assert_eq!(sched.active_count(), 2);
    }

    #[test]
    fn empty_payload_is_dropped() {
        let (mut sched, _) = scheduler();
        assert!(sched.enqueue("").is_none());
        assert_eq!(sched.playback_clock(), 0.0);
    }

    #[test]
    fn muted_scheduler_drops_segments_without_advancing_clock() {
        let (mut sched, state) = scheduler();
        sched.set_enabled(false);
        assert!(sched.enqueue(&segment(1.0)).is_none());
        assert_eq!(sched.playback_clock(), 0.0);
        assert!(state.lock().plays.is_empty());

        sched.set_enabled(true);
        assert!(sched.enqueue(&segment(1.0)).is_some());
    }

    #[test]
    fn reap_removes_finished_sources_only() {
        let (mut sched, state) = scheduler();
        sched.enqueue(&segment(0.5)).unwrap();
        sched.enqueue(&segment(0.3)).unwrap();
        sched.enqueue(&segment(0.4)).unwrap();
        assert_eq!(sched.active_count(), 3);

        state.lock().now = 0.6; // first finished at 0.5
        sched.reap();
        assert_eq!(sched.active_count(), 2);

        state.lock().now = 1.3; // all finished at 1.2
        sched.reap();
        assert_eq!(sched.active_count(), 0);
    }

    #[test]
    fn streamed_arrival_schedules_back_to_back() {
        // Three segments (0.5s, 0.3s, 0.4s) arriving while the device
        // clock crawls forward between enqueues, as in real streaming.
        let (mut sched, state) = scheduler();
        let first = sched.enqueue(&segment(0.5)).unwrap();
        state.lock().now = 0.01;
        let second = sched.enqueue(&segment(0.3)).unwrap();
        state.lock().now = 0.02;
        let third = sched.enqueue(&segment(0.4)).unwrap();

        assert!((third.end() - (first.start + 1.2)).abs() < 1e-6);

        // No two sources overlap at any instant
        let sources = [first, second, third];
        for (i, a) in sources.iter().enumerate() {
            for b in &sources[i + 1..] {
                assert!(a.end() <= b.start + 1e-9 || b.end() <= a.start + 1e-9);
            }
        }
    }

    #[test]
    fn source_ids_are_unique_and_ordered() {
        let (mut sched, _) = scheduler();
        let a = sched.enqueue(&segment(0.1)).unwrap();
        let b = sched.enqueue(&segment(0.1)).unwrap();
        assert!(b.id > a.id);
    }
}
