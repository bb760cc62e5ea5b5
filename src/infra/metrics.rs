// ============================================================
// Layer 6 — Training Run Log
// ============================================================
// Appends one line per completed training run to a CSV file,
// next to the database, so the accuracy of successive models
// can be compared outside the application.
//
// Output file: <reports_dir>/training_runs.csv
//
// Example CSV output:
//   model_id,created_at,target_column,n_train,n_eval,n_features,accuracy,cv_accuracy,top_feature
//   5c0e...,2026-10-15T09:12:44Z,adopted,80,20,6,0.850000,0.812500,department
//
// Runs that fail never reach this file.
//
// Reference: csv crate documentation (Writer, has_headers)

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
};

use crate::domain::records::ModelSummary;

/// One row of the run log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRun {
    pub model_id:      String,
    pub created_at:    String,
    pub target_column: String,
    pub n_train:       usize,
    pub n_eval:        usize,
    pub n_features:    usize,
    pub accuracy:      f64,
    /// Empty when cross-validation was skipped
    pub cv_accuracy:   Option<f64>,
    pub top_feature:   Option<String>,
}

impl TrainingRun {
    pub fn from_summary(summary: &ModelSummary) -> Self {
        Self {
            model_id:      summary.id.clone(),
            created_at:    timestamp(summary.created_at),
            target_column: summary.target_column.clone(),
            n_train:       summary.n_train,
            n_eval:        summary.n_eval,
            n_features:    summary.features.len(),
            accuracy:      summary.accuracy,
            cv_accuracy:   summary.cv_accuracy,
            top_feature:   summary.top_features(1).first().map(|f| f.feature.clone()),
        }
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Appends training runs to a CSV file.
pub struct TrainingRunLog {
    csv_path: PathBuf,
}

impl TrainingRunLog {
    /// Creates the directory; the file itself is created on first append
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("cannot create reports directory '{}'", dir.display()))?;

        Ok(Self { csv_path: dir.join("training_runs.csv") })
    }

    /// Append one run. The header row is written only when the file is new.
    pub fn append(&self, run: &TrainingRun) -> Result<()> {
        let is_new = !self.csv_path.exists();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("cannot open '{}'", self.csv_path.display()))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(is_new)
            .from_writer(file);
        writer.serialize(run)?;
        writer.flush()?;

        tracing::debug!(
            "Logged run {} (accuracy={:.4}) to '{}'",
            run.model_id,
            run.accuracy,
            self.csv_path.display()
        );
        Ok(())
    }

    /// Every logged run, oldest first; empty if nothing was logged yet
    pub fn read_all(&self) -> Result<Vec<TrainingRun>> {
        if !self.csv_path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.csv_path)?;
        let runs = reader.deserialize().collect::<Result<Vec<TrainingRun>, _>>()?;
        Ok(runs)
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn run(id: &str, cv: Option<f64>) -> TrainingRun {
        TrainingRun {
            model_id:      id.into(),
            created_at:    "2026-10-15T09:00:00Z".into(),
            target_column: "adopted".into(),
            n_train:       8,
            n_eval:        2,
            n_features:    3,
            accuracy:      0.5,
            cv_accuracy:   cv,
            top_feature:   Some("age".into()),
        }
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let log = TrainingRunLog::new(dir.path()).unwrap();

        log.append(&run("a", Some(0.75))).unwrap();
        log.append(&run("b", None)).unwrap();

        let text = fs::read_to_string(log.csv_path()).unwrap();
        assert_eq!(text.matches("model_id").count(), 1);

        let runs = log.read_all().unwrap();
        assert_eq!(runs, vec![run("a", Some(0.75)), run("b", None)]);
    }

    #[test]
    fn test_read_all_without_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = TrainingRunLog::new(dir.path().join("reports")).unwrap();
        assert!(log.read_all().unwrap().is_empty());
    }
}
