//! Bounded translation history with JSON persistence.
//!
//! Most-recent-first, capped; the cap is enforced on every push and on
//! every save. On disk the whole list lives as a flat array under a
//! single `records` key.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use crate::transcript::TranslationRecord;

// ── In-memory history ──────────────────────────────────────────────

/// Rolling list of finalized translations, newest first.
#[derive(Debug)]
pub struct History {
    records: VecDeque<TranslationRecord>,
    cap: usize,
}

impl History {
    pub fn new(cap: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(cap),
            cap: cap.max(1),
        }
    }

    /// Prepend a record, evicting the oldest when at capacity.
    pub fn push(&mut self, record: TranslationRecord) {
        self.records.push_front(record);
        self.records.truncate(self.cap);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Newest-first iteration.
    pub fn iter(&self) -> impl Iterator<Item = &TranslationRecord> {
        self.records.iter()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

// ── Persistence ────────────────────────────────────────────────────

/// On-disk shape: the flat record list under one key.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredHistory {
    records: Vec<TranslationRecord>,
}

/// Loads and saves a [`History`] as a single JSON document.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location under the platform data directory.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "vocalink", "vocalink")
            .map(|dirs| dirs.data_dir().join("history.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load history, tolerating a missing file (fresh install).
    pub fn load(&self, cap: usize) -> Result<History> {
        let mut history = History::new(cap);
        if !self.path.exists() {
            return Ok(history);
        }

        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let stored: StoredHistory = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;

        // Stored newest-first; push oldest-first to rebuild the order
        for record in stored.records.into_iter().rev() {
            history.push(record);
        }
        Ok(history)
    }

    /// Write the history, enforcing the cap on the stored list.
    pub fn save(&self, history: &History) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let stored = StoredHistory {
            records: history.iter().take(history.cap()).cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&stored)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::RecordOrigin;
    use chrono::Utc;

    fn record(n: usize) -> TranslationRecord {
        TranslationRecord {
            id: format!("rec-{n}"),
            detected_language: "Korean".into(),
            source_text: format!("원문 {n}"),
            translated_text: format!("translation {n}"),
            target_language: "English".into(),
            timestamp: Utc::now(),
            origin: RecordOrigin::Voice,
        }
    }

    #[test]
    fn newest_first_order() {
        let mut history = History::new(5);
        history.push(record(1));
        history.push(record(2));
        let ids: Vec<&str> = history.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["rec-2", "rec-1"]);
    }

    #[test]
    fn push_at_cap_evicts_oldest() {
        let mut history = History::new(3);
        for n in 1..=3 {
            history.push(record(n));
        }
        assert_eq!(history.len(), 3);

        history.push(record(4));
        assert_eq!(history.len(), 3, "stays exactly at cap");
        let ids: Vec<&str> = history.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["rec-4", "rec-3", "rec-2"]);
    }

    #[test]
    fn zero_cap_is_clamped() {
        let mut history = History::new(0);
        history.push(record(1));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.json"));

        let mut history = History::new(10);
        history.push(record(1));
        history.push(record(2));
        store.save(&history).unwrap();

        let loaded = store.load(10).unwrap();
        assert_eq!(loaded.len(), 2);
        let ids: Vec<&str> = loaded.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["rec-2", "rec-1"]);
    }

    #[test]
    fn load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("nope.json"));
        let history = store.load(10).unwrap();
        assert!(history.is_empty());
    }

    #[test]
    fn stored_file_has_single_records_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.json"));
        let mut history = History::new(10);
        history.push(record(1));
        store.save(&history).unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 1);
        assert!(object["records"].is_array());
    }

    #[test]
    fn load_truncates_to_smaller_cap() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.json"));
        let mut history = History::new(10);
        for n in 1..=6 {
            history.push(record(n));
        }
        store.save(&history).unwrap();

        let loaded = store.load(4).unwrap();
        assert_eq!(loaded.len(), 4);
        // The newest four survive
        let ids: Vec<&str> = loaded.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["rec-6", "rec-5", "rec-4", "rec-3"]);
    }
}
