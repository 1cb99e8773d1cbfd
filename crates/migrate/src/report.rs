//! Per-run outcome tally and the JSON report file operators review
//! after a migration.

use std::path::Path;
use std::sync::Mutex;

use serde::Serialize;

use crate::error::MigrateError;

#[derive(Debug, Clone, Serialize)]
pub struct RecordOutcome {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Default, Clone, Serialize)]
struct ReportData {
    created: Vec<RecordOutcome>,
    updated: Vec<RecordOutcome>,
    skipped: Vec<RecordOutcome>,
    errored: Vec<RecordOutcome>,
}

/// Shared tally; the upload pool appends from several tasks at once.
#[derive(Debug, Default)]
pub struct MigrationReport {
    data: Mutex<ReportData>,
}

impl MigrationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created(&self, id: impl Into<String>, title: Option<String>) {
        self.data.lock().unwrap().created.push(RecordOutcome {
            id: id.into(),
            title,
            error: None,
        });
    }

    pub fn updated(&self, id: impl Into<String>, title: Option<String>) {
        self.data.lock().unwrap().updated.push(RecordOutcome {
            id: id.into(),
            title,
            error: None,
        });
    }

    pub fn skipped(&self, id: impl Into<String>, reason: impl Into<String>) {
        self.data.lock().unwrap().skipped.push(RecordOutcome {
            id: id.into(),
            title: None,
            error: Some(reason.into()),
        });
    }

    pub fn errored(&self, id: impl Into<String>, error: impl Into<String>) {
        self.data.lock().unwrap().errored.push(RecordOutcome {
            id: id.into(),
            title: None,
            error: Some(error.into()),
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.data.lock().unwrap().errored.is_empty()
    }

    pub fn counts(&self) -> (usize, usize, usize, usize) {
        let data = self.data.lock().unwrap();
        (
            data.created.len(),
            data.updated.len(),
            data.skipped.len(),
            data.errored.len(),
        )
    }

    /// Running tally for the operator's terminal.
    pub fn log_summary(&self) {
        let (created, updated, skipped, errored) = self.counts();
        tracing::info!(created, updated, skipped, errored, "migration summary");
    }

    pub fn to_json(&self) -> Result<String, MigrateError> {
        let data = self.data.lock().unwrap().clone();
        Ok(serde_json::to_string_pretty(&data)?)
    }

    pub fn write(&self, path: &Path) -> Result<(), MigrateError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        tracing::info!(path = %path.display(), "wrote migration report");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tallies_and_serializes() {
        let report = MigrationReport::new();
        report.created("brand-1", Some("Gato Audio".into()));
        report.skipped("brand-2", "already exists");
        report.errored("brand-3", "validation failed");

        assert_eq!(report.counts(), (1, 0, 1, 1));
        assert!(report.has_errors());

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["created"][0]["id"], "brand-1");
        assert_eq!(json["errored"][0]["error"], "validation failed");
    }

    #[test]
    fn writes_report_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/report.json");
        let report = MigrationReport::new();
        report.created("review-1", None);
        report.write(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("review-1"));
    }
}
