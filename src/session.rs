//! Translation session lifecycle controller.
//!
//! Ties together the capture path, the live connection, the playback
//! scheduler, and the transcript accumulator:
//!
//! ```text
//! microphone ─▸ frames ─▸ forwarder ─▸ LiveConnection ─▸ remote
//!                                          │
//!                      AudioSegment ───────┼──▸ PlaybackScheduler ─▸ speaker
//!                      PartialText ────────┼──▸ TranscriptAccumulator
//!                      TurnComplete ───────┘         │
//!                                           TranslationRecord ─▸ SessionEvent
//! ```
//!
//! One session at a time: Idle → Connecting → Active → Stopping → Idle,
//! with every failure path landing back in Idle. The session runs as a
//! set of background tasks:
//! 1. **Frame forwarder**: capture frames → live connection.
//! 2. **Event processor**: live events → scheduler / accumulator / UI.
//! 3. **Poll loop**: level meter readings and finished-source reaping.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::audio::capture::EncodedFrame;
use crate::audio::playback::{OutputSink, PlaybackScheduler};
use crate::audio::InputSource;
use crate::config::AppConfig;
use crate::error::SessionError;
use crate::live::{LiveConnection, LiveConnector, LiveEvent};
use crate::transcript::{RecordOrigin, TranscriptAccumulator, TranslationRecord};

/// Meter/reap cadence for the poll loop.
const POLL_INTERVAL_MS: u64 = 100;

/// Capture frame channel depth. A full channel drops frames (stale
/// audio is never queued).
const FRAME_CHANNEL_CAP: usize = 64;

// ── Public surface ─────────────────────────────────────────────────

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Active,
    Stopping,
}

/// Events surfaced to the embedding UI.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The live connection is open and streaming.
    Connected,
    /// Most recent microphone RMS level (poll-loop cadence).
    Level(f32),
    /// A turn completed and parsed into a record.
    Record(TranslationRecord),
    /// Synthesized output was cut off by new user speech.
    PlaybackInterrupted,
    /// The session failed; it has been torn down.
    Failed(SessionError),
    /// Teardown finished; the session is Idle again.
    Stopped,
}

// ── Shared internals ───────────────────────────────────────────────

/// State shared between the controller and its background tasks.
struct Shared {
    state: Mutex<SessionState>,
    input: Mutex<Box<dyn InputSource>>,
    scheduler: Mutex<PlaybackScheduler>,
    connection: Mutex<Option<Arc<dyn LiveConnection>>>,
    /// Set while a manual text request awaits its turn-complete.
    text_pending: AtomicBool,
    events_tx: mpsc::Sender<SessionEvent>,
}

impl Shared {
    /// Claim the teardown: Connecting/Active → Stopping. Returns false
    /// when there is nothing to stop (Idle) or another path is already
    /// stopping.
    fn begin_stop(&self) -> bool {
        let mut state = self.state.lock();
        match *state {
            SessionState::Connecting | SessionState::Active => {
                *state = SessionState::Stopping;
                true
            }
            _ => false,
        }
    }

    /// Release every resource. Each step is independently guarded, so
    /// running after a partial setup (or twice) is harmless.
    async fn teardown(&self) {
        let connection = self.connection.lock().take();
        if let Some(connection) = connection {
            connection.close().await;
        }
        self.input.lock().stop();
        // Strict lifecycle: stop always cuts in-flight audio
        self.scheduler.lock().cancel_all();
        *self.state.lock() = SessionState::Idle;
        let _ = self.events_tx.send(SessionEvent::Stopped).await;
        tracing::info!("Session stopped");
    }
}

// ── Controller ─────────────────────────────────────────────────────

/// Owns the one live translation session.
pub struct SessionController {
    config: AppConfig,
    shared: Arc<Shared>,
    connector: Arc<dyn LiveConnector>,
    tasks: Vec<JoinHandle<()>>,
}

impl SessionController {
    /// Wire up a controller. Nothing starts until [`start`].
    ///
    /// Returns the controller and the event receiver for the embedder.
    ///
    /// [`start`]: SessionController::start
    pub fn new(
        config: AppConfig,
        input: Box<dyn InputSource>,
        sink: Box<dyn OutputSink>,
        connector: Arc<dyn LiveConnector>,
    ) -> (Self, mpsc::Receiver<SessionEvent>) {
        let mut scheduler = PlaybackScheduler::new(sink, config.audio.output_sample_rate);
        scheduler.set_enabled(config.playback_enabled);

        let (events_tx, events_rx) = mpsc::channel(256);
        let shared = Arc::new(Shared {
            state: Mutex::new(SessionState::Idle),
            input: Mutex::new(input),
            scheduler: Mutex::new(scheduler),
            connection: Mutex::new(None),
            text_pending: AtomicBool::new(false),
            events_tx,
        });

        (
            Self {
                config,
                shared,
                connector,
                tasks: Vec::new(),
            },
            events_rx,
        )
    }

    pub fn state(&self) -> SessionState {
        *self.shared.state.lock()
    }

    /// Toggle inbound audio playback (mute) at runtime.
    pub fn set_playback_enabled(&self, enabled: bool) {
        self.shared.scheduler.lock().set_enabled(enabled);
    }

    /// Start the session: microphone, live connection, background tasks.
    ///
    /// Valid only from Idle; otherwise rejected with
    /// [`SessionError::AlreadyActive`] and no side effects.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        {
            let mut state = self.shared.state.lock();
            if *state != SessionState::Idle {
                return Err(SessionError::AlreadyActive);
            }
            *state = SessionState::Connecting;
        }

        let (frames_tx, frames_rx) = mpsc::channel::<EncodedFrame>(FRAME_CHANNEL_CAP);
        if let Err(error) = self.shared.input.lock().start(frames_tx) {
            *self.shared.state.lock() = SessionState::Idle;
            return Err(error);
        }

        let connection: Arc<dyn LiveConnection> = match self.connector.connect(&self.config).await
        {
            Ok(connection) => Arc::from(connection),
            Err(error) => {
                self.shared.input.lock().stop();
                *self.shared.state.lock() = SessionState::Idle;
                return Err(SessionError::classify_remote(&error.to_string()));
            }
        };

        *self.shared.connection.lock() = Some(Arc::clone(&connection));
        *self.shared.state.lock() = SessionState::Active;
        let _ = self.shared.events_tx.send(SessionEvent::Connected).await;
        tracing::info!(
            source = self.config.source_language.as_str(),
            target = self.config.target_language.as_str(),
            "Session active"
        );

        let forward_connection = Arc::clone(&connection);
        self.tasks.push(tokio::spawn(async move {
            forward_frames(frames_rx, forward_connection).await;
        }));

        let accumulator =
            TranscriptAccumulator::new(self.config.target_language.display_name());
        let event_shared = Arc::clone(&self.shared);
        self.tasks.push(tokio::spawn(async move {
            process_events(connection, event_shared, accumulator).await;
        }));

        let poll_shared = Arc::clone(&self.shared);
        self.tasks.push(tokio::spawn(async move {
            poll_loop(poll_shared).await;
        }));

        Ok(())
    }

    /// Stop the session and release every resource. Idempotent: no-op
    /// from Idle, safe to call repeatedly, never panics.
    pub async fn stop(&mut self) {
        if self.shared.begin_stop() {
            self.shared.teardown().await;
        } else {
            // A failure path may already own the teardown; let it finish.
            while *self.shared.state.lock() == SessionState::Stopping {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }

    /// Send a manual text-translation request over the live session.
    /// The resulting record carries origin `text`.
    pub async fn translate_text(&self, text: &str) -> Result<(), SessionError> {
        if *self.shared.state.lock() != SessionState::Active {
            return Err(SessionError::ConnectionError(
                "session is not active".to_string(),
            ));
        }
        let connection = self.shared.connection.lock().clone();
        let Some(connection) = connection else {
            return Err(SessionError::ConnectionError(
                "session is not active".to_string(),
            ));
        };

        self.shared.text_pending.store(true, Ordering::SeqCst);
        connection
            .send_text(text)
            .await
            .map_err(|e| SessionError::ConnectionError(e.to_string()))
    }
}

// ── Background tasks ───────────────────────────────────────────────

/// Capture frames → live connection, in capture order. A transport
/// rejection drops the frame; capture itself is never paused.
async fn forward_frames(
    mut frames: mpsc::Receiver<EncodedFrame>,
    connection: Arc<dyn LiveConnection>,
) {
    while let Some(frame) = frames.recv().await {
        if let Err(error) = connection.send_frame(frame).await {
            tracing::debug!(%error, "Dropped capture frame");
        }
    }
    tracing::debug!("Frame forwarder stopped");
}

/// Live events → scheduler, accumulator, and the embedder.
async fn process_events(
    connection: Arc<dyn LiveConnection>,
    shared: Arc<Shared>,
    mut accumulator: TranscriptAccumulator,
) {
    loop {
        let event = match connection.recv_event().await {
            Some(event) => event,
            None => break,
        };

        match event {
            LiveEvent::Opened => {}

            LiveEvent::AudioSegment { data } => {
                shared.scheduler.lock().enqueue(&data);
            }

            LiveEvent::PartialText { text } => {
                accumulator.on_partial(&text);
            }

            LiveEvent::TurnComplete => {
                let origin = if shared.text_pending.swap(false, Ordering::SeqCst) {
                    RecordOrigin::Text
                } else {
                    RecordOrigin::Voice
                };
                if let Some(record) = accumulator.on_turn_complete(origin) {
                    tracing::info!(
                        detected = %record.detected_language,
                        "Turn finalized"
                    );
                    let _ = shared.events_tx.send(SessionEvent::Record(record)).await;
                }
            }

            LiveEvent::Interrupted => {
                // Barge-in cancels playback only; capture continues
                shared.scheduler.lock().cancel_all();
                let _ = shared
                    .events_tx
                    .send(SessionEvent::PlaybackInterrupted)
                    .await;
            }

            LiveEvent::Error { message } => {
                let error = SessionError::classify_remote(&message);
                tracing::error!(%error, "Live connection error — stopping session");
                let _ = shared.events_tx.send(SessionEvent::Failed(error)).await;
                if shared.begin_stop() {
                    shared.teardown().await;
                }
                break;
            }

            LiveEvent::Closed => {
                // Expected during our own teardown; otherwise the
                // transport dropped out from under us.
                if shared.begin_stop() {
                    let _ = shared
                        .events_tx
                        .send(SessionEvent::Failed(SessionError::ConnectionError(
                            "connection closed by remote".to_string(),
                        )))
                        .await;
                    shared.teardown().await;
                }
                break;
            }
        }
    }
    tracing::debug!("Event processor stopped");
}

/// Level-meter readings and finished-source reaping while Active.
async fn poll_loop(shared: Arc<Shared>) {
    let mut interval = tokio::time::interval(Duration::from_millis(POLL_INTERVAL_MS));
    loop {
        interval.tick().await;
        if *shared.state.lock() != SessionState::Active {
            break;
        }
        let level = shared.input.lock().level();
        // Stale meter readings are dropped, never queued
        let _ = shared.events_tx.try_send(SessionEvent::Level(level));
        shared.scheduler.lock().reap();
    }
    tracing::debug!("Poll loop stopped");
}

// ── Tests ──────────────────────────────────────────────────────────
