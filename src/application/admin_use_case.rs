// ============================================================
// Layer 2 — Administrative Use Cases
// ============================================================
// Maintenance operations that sit outside the training loop:
//
//   history — every stored model run, newest first
//   purge   — delete all uploaded survey rows (models, their
//             predictions and insights are kept)
//   backup  — JSON export of the whole database

use anyhow::{Context, Result};
use std::path::Path;

use crate::domain::records::ModelSummary;
use crate::infra::backup::{backup_database, BackupReport};
use crate::infra::store::SqliteStore;

/// A model run as listed by `history`
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub summary:    ModelSummary,
    pub is_current: bool,
}

pub fn model_history(store: &SqliteStore, limit: Option<usize>) -> Result<Vec<HistoryEntry>> {
    let current = store.current_summary()?.map(|s| s.id);
    let entries = store
        .model_history(limit)
        .context("cannot read model history")?
        .into_iter()
        .map(|summary| HistoryEntry {
            is_current: current.as_deref() == Some(summary.id.as_str()),
            summary,
        })
        .collect();
    Ok(entries)
}

pub fn purge_surveys(store: &mut SqliteStore) -> Result<usize> {
    store.purge_surveys().context("cannot purge survey data")
}

pub fn backup(store: &SqliteStore, reports_dir: &Path) -> Result<BackupReport> {
    backup_database(store, reports_dir)
}
