//! Real-time voice/text translation client.
//!
//! Captures microphone audio, streams it to a hosted speech-to-speech
//! translation service, plays back the synthesized translation
//! gaplessly, and keeps a small rolling history of finalized
//! translations.
//!
//! ## Architecture
//!
//! ```text
//! microphone ─▸ audio::capture ─▸ session ─▸ live (WebSocket) ─▸ remote
//!                                    │
//!               audio::playback ◂────┼────◂ synthesized audio segments
//!               transcript ◂─────────┘      transcript text + turn signals
//!                    │
//!               history (bounded, persisted)
//! ```
//!
//! The two audio paths are independent event-driven pipelines that meet
//! only in [`session::SessionController`]; the playback clock and the
//! active-source set live in a per-session [`audio::PlaybackScheduler`].
//! The remote service is a capability interface ([`live::LiveConnection`])
//! with a Gemini Live WebSocket binding.

pub mod audio;
pub mod config;
pub mod error;
pub mod history;
pub mod lang;
pub mod live;
pub mod session;
pub mod transcript;

#[allow(unused_imports)]
pub use config::AppConfig;
#[allow(unused_imports)]
pub use error::SessionError;
#[allow(unused_imports)]
pub use history::{History, HistoryStore};
#[allow(unused_imports)]
pub use lang::Language;
#[allow(unused_imports)]
pub use session::{SessionController, SessionEvent, SessionState};
#[allow(unused_imports)]
pub use transcript::{RecordOrigin, TranslationRecord};
