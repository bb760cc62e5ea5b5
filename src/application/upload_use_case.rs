// ============================================================
// Layer 2 — UploadUseCase
// ============================================================
// Stores a survey CSV as a new upload batch:
//
//   Step 1: Ingest and type the table     (Layer 4 - data)
//   Step 2: Summarise the responses       (Layer 4 - data)
//   Step 3: Persist rows as a new batch   (Layer 6 - infra)
//
// A file that fails ingestion is never stored.

use anyhow::{Context, Result};

use crate::data::stats::{survey_stats, SurveyStats};
use crate::domain::records::UploadBatch;
use crate::domain::traits::TableSource;
use crate::infra::store::SqliteStore;

/// Values kept per categorical column in the upload summary
const TOP_VALUES: usize = 5;

#[derive(Debug, Clone)]
pub struct UploadReport {
    pub batch: UploadBatch,
    pub stats: SurveyStats,
}

pub struct UploadUseCase<'a> {
    store: &'a mut SqliteStore,
}

impl<'a> UploadUseCase<'a> {
    pub fn new(store: &'a mut SqliteStore) -> Self {
        Self { store }
    }

    pub fn execute(&mut self, source: &dyn TableSource) -> Result<UploadReport> {
        let origin = source.describe();

        // ── Step 1: Ingest ────────────────────────────────────────────────────
        let table = source
            .load_table()
            .with_context(|| format!("cannot ingest '{origin}'"))?;
        tracing::info!(
            "Ingested {} rows x {} columns from '{}'",
            table.row_count(),
            table.column_count(),
            origin
        );

        // ── Step 2: Summarise ─────────────────────────────────────────────────
        let stats = survey_stats(&table, TOP_VALUES);

        // ── Step 3: Persist ───────────────────────────────────────────────────
        let batch = self
            .store
            .save_batch(&origin, &table)
            .context("cannot store the upload")?;

        Ok(UploadReport { batch, stats })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::{CsvLoader, CsvSource, IngestOptions};
    use crate::domain::errors::PipelineError;

    fn loader() -> CsvLoader {
        CsvLoader::new(IngestOptions {
            target_column: "adopted".into(),
            ..Default::default()
        })
    }

    #[test]
    fn test_upload_stores_batch() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("survey.csv");
        std::fs::write(&path, "age,adopted\n30,yes\n41,no\n").unwrap();

        let mut store = SqliteStore::open_in_memory().unwrap();
        let report = UploadUseCase::new(&mut store)
            .execute(&CsvSource::new(&path, loader()))
            .unwrap();

        assert_eq!(report.batch.source, "survey.csv");
        assert_eq!(report.stats.total_responses, 2);
        assert_eq!(store.surveys(None, None).unwrap().len(), 2);
    }

    #[test]
    fn test_failed_ingest_stores_nothing() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "age,other\n30,x\n").unwrap();

        let mut store = SqliteStore::open_in_memory().unwrap();
        let err = UploadUseCase::new(&mut store)
            .execute(&CsvSource::new(&path, loader()))
            .unwrap_err();

        assert!(matches!(err.downcast_ref::<PipelineError>(), Some(PipelineError::Schema(_))));
        assert!(store.latest_batch().unwrap().is_none());
    }
}
