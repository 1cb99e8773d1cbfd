//! Persisted table preferences.
//!
//! Column selection and sort order survive reloads, keyed by document
//! type; everything else in the filter state is session-only. Stored as
//! one JSON file, loaded once and saved explicitly.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use audiofast_groq::Direction;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TablePrefs {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub order_key: Option<String>,
    #[serde(default)]
    pub order_direction: Option<Direction>,
}

#[derive(Debug)]
pub struct PrefsStore {
    path: PathBuf,
    entries: BTreeMap<String, TablePrefs>,
}

impl PrefsStore {
    /// Load preferences from disk; a missing or unreadable file starts
    /// empty rather than failing.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = fs::read_to_string(&path)
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or_default();
        Self { path, entries }
    }

    pub fn get(&self, doc_type: &str) -> TablePrefs {
        self.entries.get(doc_type).cloned().unwrap_or_default()
    }

    pub fn set(&mut self, doc_type: impl Into<String>, prefs: TablePrefs) {
        self.entries.insert(doc_type.into(), prefs);
    }

    pub fn save(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&self.entries)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table-prefs.json");

        let mut store = PrefsStore::load(&path);
        store.set(
            "review",
            TablePrefs {
                columns: vec!["title".into(), "brand".into()],
                order_key: Some("title".into()),
                order_direction: Some(Direction::Asc),
            },
        );
        store.save().unwrap();

        let reloaded = PrefsStore::load(&path);
        assert_eq!(reloaded.get("review"), store.get("review"));
        assert_eq!(reloaded.get("brand"), TablePrefs::default());
    }

    #[test]
    fn missing_file_starts_empty() {
        let store = PrefsStore::load("/nonexistent/prefs.json");
        assert_eq!(store.get("review"), TablePrefs::default());
    }
}
