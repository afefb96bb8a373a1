//! Language catalog for translation sessions.
//!
//! The display name is what the remote model sees in the instruction
//! string, so it must be the plain English language name.

use serde::{Deserialize, Serialize};

/// Languages the client offers as translation targets/sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Language {
    Ko, // Korean
    Ja, // Japanese
    Zh, // Chinese
    En, // English
    Es, // Spanish
    Fr, // French
    De, // German
    It, // Italian
    Pt, // Portuguese
    Ru, // Russian
    Ar, // Arabic
    Hi, // Hindi
    Vi, // Vietnamese
    Th, // Thai
}

impl Language {
    /// ISO 639-1 code string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ko => "ko",
            Self::Ja => "ja",
            Self::Zh => "zh",
            Self::En => "en",
            Self::Es => "es",
            Self::Fr => "fr",
            Self::De => "de",
            Self::It => "it",
            Self::Pt => "pt",
            Self::Ru => "ru",
            Self::Ar => "ar",
            Self::Hi => "hi",
            Self::Vi => "vi",
            Self::Th => "th",
        }
    }

    /// Human-readable name, used verbatim in the remote instruction.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Ko => "Korean",
            Self::Ja => "Japanese",
            Self::Zh => "Chinese",
            Self::En => "English",
            Self::Es => "Spanish",
            Self::Fr => "French",
            Self::De => "German",
            Self::It => "Italian",
            Self::Pt => "Portuguese",
            Self::Ru => "Russian",
            Self::Ar => "Arabic",
            Self::Hi => "Hindi",
            Self::Vi => "Vietnamese",
            Self::Th => "Thai",
        }
    }

    /// Parse from a code string (case-insensitive).
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_lowercase().as_str() {
            "ko" => Some(Self::Ko),
            "ja" => Some(Self::Ja),
            "zh" => Some(Self::Zh),
            "en" => Some(Self::En),
            "es" => Some(Self::Es),
            "fr" => Some(Self::Fr),
            "de" => Some(Self::De),
            "it" => Some(Self::It),
            "pt" => Some(Self::Pt),
            "ru" => Some(Self::Ru),
            "ar" => Some(Self::Ar),
            "hi" => Some(Self::Hi),
            "vi" => Some(Self::Vi),
            "th" => Some(Self::Th),
            _ => None,
        }
    }

    /// All supported languages.
    pub fn all() -> &'static [Language] {
        &[
            Self::Ko,
            Self::Ja,
            Self::Zh,
            Self::En,
            Self::Es,
            Self::Fr,
            Self::De,
            Self::It,
            Self::Pt,
            Self::Ru,
            Self::Ar,
            Self::Hi,
            Self::Vi,
            Self::Th,
        ]
    }
}

// ── Tests ──────────────────────────────────────────────────────────
