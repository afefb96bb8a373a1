//! Transcript accumulation and structured-turn parsing.
//!
//! Partial text events are concatenated per turn; on turn-complete the
//! buffer is parsed against the delimiter format the model was
//! instructed to produce:
//!
//! ```text
//! <detected language>|<original text>|<translation>
//! ```
//!
//! The format is free-text instructed to a remote model, so the parser
//! is best-effort by design: a turn that never adopted the format is
//! dropped (logged at debug), never surfaced as an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Translation records ────────────────────────────────────────────

/// How a translation was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordOrigin {
    Voice,
    Text,
}

/// One finalized translation. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationRecord {
    /// Unique record identifier.
    pub id: String,
    /// Language label the model reported for the input.
    pub detected_language: String,
    /// Snippet of what the speaker said, as transcribed.
    pub source_text: String,
    /// The translation.
    pub translated_text: String,
    /// Target language display name.
    pub target_language: String,
    /// When the turn completed.
    pub timestamp: DateTime<Utc>,
    /// Voice turn or manual text request.
    pub origin: RecordOrigin,
}

// ── Accumulator ────────────────────────────────────────────────────

/// Accumulates partial transcript text until a turn-complete signal.
#[derive(Debug)]
pub struct TranscriptAccumulator {
    buffer: String,
    target_language: String,
}

impl TranscriptAccumulator {
    /// `target_language` is stamped onto every produced record.
    pub fn new(target_language: impl Into<String>) -> Self {
        Self {
            buffer: String::new(),
            target_language: target_language.into(),
        }
    }

    /// Append a partial text event to the current turn.
    pub fn on_partial(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    /// Finalize the current turn.
    ///
    /// The buffer is reset unconditionally — the turn boundary is the
    /// signal, not the parse outcome. Returns a record only when the
    /// accumulated text matched the expected format.
    pub fn on_turn_complete(&mut self, origin: RecordOrigin) -> Option<TranslationRecord> {
        let raw = std::mem::take(&mut self.buffer);
        let (detected, source, translation) = match parse_turn(&raw) {
            Some(fields) => fields,
            None => {
                if !raw.trim().is_empty() {
                    tracing::debug!(len = raw.len(), "Turn did not match the expected format, dropping");
                }
                return None;
            }
        };

        Some(TranslationRecord {
            id: uuid::Uuid::new_v4().to_string(),
            detected_language: detected,
            source_text: source,
            translated_text: translation,
            target_language: self.target_language.clone(),
            timestamp: Utc::now(),
            origin,
        })
    }

    /// Text accumulated so far in the current turn.
    pub fn pending(&self) -> &str {
        &self.buffer
    }
}

/// Parse `detected|source|translation`. Fields are trimmed; all three
/// must be non-empty. Extra '|' characters stay in the translation
/// field, so a translation containing the delimiter still parses.
fn parse_turn(raw: &str) -> Option<(String, String, String)> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut fields = trimmed.splitn(3, '|');
    let detected = fields.next()?.trim();
    let source = fields.next()?.trim();
    let translation = fields.next()?.trim();

    if detected.is_empty() || source.is_empty() || translation.is_empty() {
        return None;
    }

    Some((
        detected.to_string(),
        source.to_string(),
        translation.to_string(),
    ))
}

// ── Tests ──────────────────────────────────────────────────────────
