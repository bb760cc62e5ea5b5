// ============================================================
// Layer 6 — JSON Backup
// ============================================================
// Exports every stored record kind to a timestamped directory:
//
//   <reports_dir>/backup_20261015_091244/
//       surveys.json       all uploaded survey rows
//       models.json        model summaries (forests are not exported)
//       predictions.json   every prediction of every model
//       insights.json      every stored insight
//
// Backups are write-only; there is no restore path.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::infra::store::SqliteStore;

/// Record counts written by one backup
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackupReport {
    pub directory:   PathBuf,
    pub surveys:     usize,
    pub models:      usize,
    pub predictions: usize,
    pub insights:    usize,
}

pub fn backup_database(store: &SqliteStore, reports_dir: &Path) -> Result<BackupReport> {
    let stamp     = Utc::now().format("%Y%m%d_%H%M%S");
    let directory = reports_dir.join(format!("backup_{stamp}"));
    fs::create_dir_all(&directory)
        .with_context(|| format!("cannot create backup directory '{}'", directory.display()))?;

    let surveys     = store.surveys(None, None)?;
    let models      = store.model_history(None)?;
    let predictions = store.predictions(None)?;
    let insights    = store.insights(None, None)?;

    write_json(&directory.join("surveys.json"), &surveys)?;
    write_json(&directory.join("models.json"), &models)?;
    write_json(&directory.join("predictions.json"), &predictions)?;
    write_json(&directory.join("insights.json"), &insights)?;

    let report = BackupReport {
        directory,
        surveys:     surveys.len(),
        models:      models.len(),
        predictions: predictions.len(),
        insights:    insights.len(),
    };
    tracing::info!(
        "Backup written to '{}' ({} surveys, {} models, {} predictions, {} insights)",
        report.directory.display(),
        report.surveys,
        report.models,
        report.predictions,
        report.insights
    );
    Ok(report)
}

fn write_json<T: Serialize>(path: &Path, records: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(records)?;
    fs::write(path, json).with_context(|| format!("cannot write '{}'", path.display()))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::{CsvLoader, IngestOptions};

    #[test]
    fn test_backup_writes_four_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SqliteStore::open_in_memory().unwrap();
        let table = CsvLoader::new(IngestOptions {
            target_column: "label".into(),
            ..Default::default()
        })
        .load_bytes(b"x,label\n1,a\n2,b\n")
        .unwrap();
        store.save_batch("t.csv", &table).unwrap();

        let report = backup_database(&store, dir.path()).unwrap();
        assert_eq!(report.surveys, 2);
        assert_eq!(report.models, 0);

        for name in ["surveys.json", "models.json", "predictions.json", "insights.json"] {
            assert!(report.directory.join(name).exists(), "{name} missing");
        }
        let surveys: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(report.directory.join("surveys.json")).unwrap())
                .unwrap();
        assert_eq!(surveys.as_array().unwrap().len(), 2);
    }
}
