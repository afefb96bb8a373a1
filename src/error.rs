//! Session error taxonomy.
//!
//! Only these variants reach the embedding UI. Malformed inbound audio
//! segments and unparseable transcript turns are recovered where they
//! occur (segment dropped, turn skipped) and logged — upstream model
//! variance, not programmer error.

use thiserror::Error;

/// Errors surfaced from a translation session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// Microphone access was refused by the user or the platform.
    #[error("microphone permission denied")]
    PermissionDenied,

    /// No usable audio input device exists.
    #[error("no audio input device available")]
    DeviceUnavailable,

    /// The live-translation credential is missing or was rejected.
    #[error("translation service credential missing or invalid: {0}")]
    AuthRequired(String),

    /// Transport-level failure while connecting or mid-session.
    #[error("live connection error: {0}")]
    ConnectionError(String),

    /// A session is already running; stop it before starting another.
    #[error("a translation session is already active")]
    AlreadyActive,
}

/// Substrings that mark a remote error as a credential problem rather
/// than a transport failure.
const AUTH_MARKERS: &[&str] = &[
    "api key",
    "api_key",
    "credential",
    "unauthorized",
    "unauthenticated",
    "permission_denied",
    "401",
    "403",
];

impl SessionError {
    /// Classify a remote error message.
    ///
    /// Credential-shaped messages become [`SessionError::AuthRequired`]
    /// (distinct "setup required" state); everything else is a
    /// [`SessionError::ConnectionError`].
    pub fn classify_remote(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if AUTH_MARKERS.iter().any(|m| lower.contains(m)) {
            Self::AuthRequired(message.to_string())
        } else {
            Self::ConnectionError(message.to_string())
        }
    }

    /// Whether retrying requires re-authentication rather than a restart.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::AuthRequired(_))
    }
}

// ── Tests ──────────────────────────────────────────────────────────
