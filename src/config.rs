//! Client configuration: audio pipeline parameters, languages, and the
//! structured-output instruction sent to the translation model.
//!
//! Loaded from `config.toml` under the platform config directory, with
//! the API key overridable via `GEMINI_API_KEY`. Every field has a
//! default so a missing file yields a working configuration (minus the
//! credential).

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::lang::Language;

/// Bounds on the capture frame size. The frame size is fixed for the
/// lifetime of a session; values outside this range either starve the
/// encoder or add too much capture latency.
const MIN_FRAME_SIZE: usize = 1024;
const MAX_FRAME_SIZE: usize = 4096;

// ── Audio parameters ───────────────────────────────────────────────

/// Sample rates and frame size for the streaming pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Microphone/outbound sample rate (Hz).
    pub input_sample_rate: u32,
    /// Synthesized/inbound sample rate (Hz).
    pub output_sample_rate: u32,
    /// Capture frame size in samples. Fixed per session.
    pub frame_size: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_sample_rate: 16_000,
            output_sample_rate: 24_000,
            frame_size: 2048,
        }
    }
}

// ── Top-level configuration ────────────────────────────────────────

/// Full client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Audio pipeline parameters.
    pub audio: AudioConfig,
    /// Language the user speaks.
    pub source_language: Language,
    /// Language translations are produced in.
    pub target_language: Language,
    /// Prebuilt voice used for synthesized speech.
    pub voice_name: String,
    /// Whether inbound audio is played back (false = mute).
    pub playback_enabled: bool,
    /// Ask the service to transcribe the user's speech.
    pub input_transcription: bool,
    /// Ask the service to transcribe its own synthesized speech.
    pub output_transcription: bool,
    /// Maximum number of retained translation records.
    pub history_cap: usize,
    /// API key for the translation service. Usually supplied via the
    /// `GEMINI_API_KEY` environment variable instead of the file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            source_language: Language::Ko,
            target_language: Language::En,
            voice_name: "Aoede".to_string(),
            playback_enabled: true,
            input_transcription: false,
            output_transcription: true,
            history_cap: 20,
            api_key: None,
        }
    }
}

impl AppConfig {
    /// Load the configuration file, falling back to defaults when it is
    /// absent. The `GEMINI_API_KEY` environment variable wins over the
    /// file's `api_key`.
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                toml::from_str(&raw)
                    .with_context(|| format!("Failed to parse {}", path.display()))?
            }
            _ => Self::default(),
        };

        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            if !key.is_empty() {
                config.api_key = Some(key);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Path of the config file, if a platform config dir exists.
    pub fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "vocalink", "vocalink")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Validate invariants that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_FRAME_SIZE..=MAX_FRAME_SIZE).contains(&self.audio.frame_size) {
            bail!(
                "frame_size {} out of range [{MIN_FRAME_SIZE}, {MAX_FRAME_SIZE}]",
                self.audio.frame_size
            );
        }
        if self.audio.input_sample_rate == 0 || self.audio.output_sample_rate == 0 {
            bail!("sample rates must be non-zero");
        }
        if self.history_cap == 0 {
            bail!("history_cap must be at least 1");
        }
        if self.source_language == self.target_language {
            bail!(
                "source and target language are both {}",
                self.source_language.as_str()
            );
        }
        Ok(())
    }

    /// Build the system instruction for the translation session.
    ///
    /// The delimiter format here is what `TranscriptAccumulator` parses
    /// on turn-complete. The model is not guaranteed to conform; the
    /// parser treats nonconforming turns as best-effort misses.
    pub fn translation_instruction(&self) -> String {
        format!(
            "You are a live speech translator. Translate everything the speaker says \
             from {source} into {target}. Speak only the {target} translation, \
             immediately, with no commentary. \
             Additionally, for every completed utterance, output exactly one line of \
             text in this format: \
             <detected language>|<original text>|<{target} translation> \
             Use the '|' character only as the field separator.",
            source = self.source_language.display_name(),
            target = self.target_language.display_name(),
        )
    }
}

// ── Tests ──────────────────────────────────────────────────────────
