// ============================================================
// Layer 2 — PredictUseCase
// ============================================================
// Scores survey rows with the current model:
//
//   Step 1: Load the rows to score          (Layer 4 - data)
//   Step 2: Load the current model          (Layer 6 - infra)
//   Step 3: Predict every row               (Layer 5 - ml)
//   Step 4: Store the predictions as a run  (Layer 6 - infra)
//
// Rows need the model's feature columns only; the label column
// may be absent. Earlier runs stay in the store untouched.

use anyhow::{bail, Context, Result};

use crate::data::loader::{CsvLoader, IngestOptions};
use crate::domain::records::label_distribution;
use crate::domain::table::Table;
use crate::domain::traits::TableSource;
use crate::infra::store::{SqliteStore, StoredBatchSource};
use crate::ml::inferencer::Predictor;

#[derive(Debug, Clone)]
pub struct PredictReport {
    pub model_id:      String,
    pub run_id:        String,
    pub source:        String,
    pub n_predictions: usize,
    pub distribution:  Vec<(String, usize)>,
}

pub struct PredictUseCase<'a> {
    store: &'a mut SqliteStore,
}

impl<'a> PredictUseCase<'a> {
    pub fn new(store: &'a mut SqliteStore) -> Self {
        Self { store }
    }

    /// Loader for rows that may or may not carry a label
    pub fn loader() -> CsvLoader {
        CsvLoader::new(IngestOptions::default())
    }

    /// Score the most recent upload
    pub fn execute_on_latest_upload(&mut self) -> Result<PredictReport> {
        let (origin, table) = load(&StoredBatchSource::new(&*self.store, Self::loader()))?;
        self.score(origin, &table)
    }

    /// Score rows from another source (e.g. a CSV file)
    pub fn execute(&mut self, source: &dyn TableSource) -> Result<PredictReport> {
        // ── Step 1: Load ──────────────────────────────────────────────────────
        let (origin, table) = load(source)?;
        self.score(origin, &table)
    }

    fn score(&mut self, origin: String, table: &Table) -> Result<PredictReport> {
        // ── Step 2: Current model ─────────────────────────────────────────────
        let Some(model) = self.store.current_model()? else {
            bail!("no trained model yet; run `train` first");
        };
        tracing::info!("Scoring '{}' with model {}", origin, model.id());

        // ── Step 3: Predict ───────────────────────────────────────────────────
        let predictions = Predictor::new(&model)
            .predict_table(table)
            .context("scoring failed")?;

        // ── Step 4: Persist ───────────────────────────────────────────────────
        self.store
            .save_predictions(&predictions)
            .context("cannot store the predictions")?;

        Ok(PredictReport {
            model_id:      model.id().to_string(),
            run_id:        predictions.first().map(|p| p.run_id.clone()).unwrap_or_default(),
            source:        origin,
            n_predictions: predictions.len(),
            distribution:  label_distribution(&predictions),
        })
    }
}

fn load(source: &dyn TableSource) -> Result<(String, Table)> {
    let origin = source.describe();
    let table  = source
        .load_table()
        .with_context(|| format!("cannot load '{origin}'"))?;
    Ok((origin, table))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::TrainUseCase;
    use crate::data::loader::CsvSource;
    use crate::domain::errors::PipelineError;
    use crate::infra::settings::PipelineSettings;

    fn labelled_csv() -> String {
        let mut csv = String::from("age,team,adopted\n");
        for i in 0..20 {
            let adopted = if i % 2 == 0 { "yes" } else { "no" };
            csv.push_str(&format!("{},{},{}\n", 20 + i, ["a", "b"][i % 2], adopted));
        }
        csv
    }

    fn pipeline(seed: u64) -> PipelineSettings {
        PipelineSettings {
            target_column:   "adopted".into(),
            exclude_columns: Vec::new(),
            n_trees:         5,
            seed,
            ..Default::default()
        }
    }

    fn train(store: &mut SqliteStore, dir: &std::path::Path, seed: u64) -> String {
        let path = dir.join("survey.csv");
        std::fs::write(&path, labelled_csv()).unwrap();
        let loader = CsvLoader::new(IngestOptions {
            target_column: "adopted".into(),
            ..Default::default()
        });
        TrainUseCase::new(pipeline(seed), dir.join("reports"))
            .execute(&CsvSource::new(&path, loader), store)
            .unwrap()
            .summary
            .id
    }

    #[test]
    fn test_without_model_is_rejected() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.save_batch("new.csv", &unlabelled_table()).unwrap();

        let err = PredictUseCase::new(&mut store).execute_on_latest_upload().unwrap_err();
        assert!(err.to_string().contains("no trained model"));
        assert!(store.predictions(None).unwrap().is_empty());
    }

    fn unlabelled_table() -> Table {
        PredictUseCase::loader()
            .load_bytes(b"age,team\n25,a\n31,b\n")
            .unwrap()
    }

    #[test]
    fn test_scores_unlabelled_file_with_newest_model() {
        let dir       = tempfile::tempdir().unwrap();
        let mut store = SqliteStore::open_in_memory().unwrap();
        let first     = train(&mut store, dir.path(), 1);
        let first_run = store.predictions(Some(&first)).unwrap();
        let second    = train(&mut store, dir.path(), 2);

        let path = dir.path().join("new.csv");
        std::fs::write(&path, "age,team\n25,a\n31,b\n40,c\n").unwrap();
        let report = PredictUseCase::new(&mut store)
            .execute(&CsvSource::new(&path, PredictUseCase::loader()))
            .unwrap();

        assert_eq!(report.model_id, second);
        assert_eq!(report.n_predictions, 3);
        assert_eq!(report.distribution.iter().map(|(_, n)| n).sum::<usize>(), 3);

        // The new run is the latest for the current model
        let latest = store.latest_predictions(&second).unwrap();
        assert_eq!(latest.len(), 3);
        assert!(latest.iter().all(|p| p.run_id == report.run_id));

        // Older predictions are untouched
        assert_eq!(store.predictions(Some(&first)).unwrap(), first_run);
        assert_eq!(store.predictions(Some(&second)).unwrap().len(), 20 + 3);
    }

    #[test]
    fn test_scores_latest_upload() {
        let dir       = tempfile::tempdir().unwrap();
        let mut store = SqliteStore::open_in_memory().unwrap();
        let model_id  = train(&mut store, dir.path(), 7);
        store.save_batch("new.csv", &unlabelled_table()).unwrap();

        let report = PredictUseCase::new(&mut store).execute_on_latest_upload().unwrap();
        assert_eq!(report.model_id, model_id);
        assert_eq!(report.n_predictions, 2);
        assert!(report.source.contains("new.csv"));
    }

    #[test]
    fn test_missing_feature_column_is_schema_error() {
        let dir       = tempfile::tempdir().unwrap();
        let mut store = SqliteStore::open_in_memory().unwrap();
        train(&mut store, dir.path(), 3);

        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "team\na\n").unwrap();
        let err = PredictUseCase::new(&mut store)
            .execute(&CsvSource::new(&path, PredictUseCase::loader()))
            .unwrap_err();

        assert!(matches!(err.downcast_ref::<PipelineError>(), Some(PipelineError::Schema(_))));
    }
}
