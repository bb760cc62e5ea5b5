// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates one training run in order:
//
//   Step 1: Load the survey table         (Layer 4 - data)
//   Step 2: Impute, encode, split         (Layer 4 - data)
//   Step 3: Fit the forest, score it      (Layer 5 - ml)
//   Step 4: Cross-validate (optional)     (Layer 5 - ml)
//   Step 5: Score every row               (Layer 5 - ml)
//   Step 6: Persist model + predictions   (Layer 6 - infra)
//   Step 7: Append to the run log         (Layer 6 - infra)
//
// Steps 1-5 touch no storage, so a run that fails anywhere
// before step 6 leaves the previous current model in place.
//
// Reference: Rust Book §13 (Iterators and Closures)

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::data::loader::CsvLoader;
use crate::data::preprocessor::Preprocessor;
use crate::domain::records::{label_distribution, ModelSummary};
use crate::domain::table::Table;
use crate::domain::traits::TableSource;
use crate::infra::metrics::{TrainingRun, TrainingRunLog};
use crate::infra::settings::PipelineSettings;
use crate::infra::store::{SqliteStore, StoredBatchSource};
use crate::ml::inferencer::Predictor;
use crate::ml::model::TrainedModel;
use crate::ml::trainer::{CrossValidation, Trainer};

/// What one successful run produced
#[derive(Debug, Clone)]
pub struct TrainReport {
    pub summary:          ModelSummary,
    pub cross_validation: Option<CrossValidation>,
    pub dropped_rows:     usize,
    pub n_predictions:    usize,
    pub distribution:     Vec<(String, usize)>,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    pipeline:    PipelineSettings,
    reports_dir: PathBuf,
}

impl TrainUseCase {
    pub fn new(pipeline: PipelineSettings, reports_dir: impl Into<PathBuf>) -> Self {
        Self { pipeline, reports_dir: reports_dir.into() }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self, source: &dyn TableSource, store: &mut SqliteStore) -> Result<TrainReport> {
        // ── Step 1: Load ──────────────────────────────────────────────────────
        let table = load(source)?;
        self.train_table(&table, store)
    }

    /// Train on the most recent upload kept in the database
    pub fn execute_on_latest_upload(
        &self,
        store:  &mut SqliteStore,
        loader: CsvLoader,
    ) -> Result<TrainReport> {
        let table = load(&StoredBatchSource::new(store, loader))?;
        self.train_table(&table, store)
    }

    fn train_table(&self, table: &Table, store: &mut SqliteStore) -> Result<TrainReport> {
        let cfg = &self.pipeline;

        // ── Step 2: Preprocess ────────────────────────────────────────────────
        tracing::info!("Training a classifier for '{}'", cfg.target_column);
        let prepared = Preprocessor::new(cfg.preprocess_config())
            .prepare(table)
            .context("preprocessing failed")?;
        tracing::info!(
            "Split: {} train, {} evaluation, {} features, {} classes",
            prepared.split.train.n_samples(),
            prepared.split.eval.n_samples(),
            prepared.dataset.n_features(),
            prepared.encoding.classes.len()
        );

        // ── Step 3: Fit and score ─────────────────────────────────────────────
        let trainer = Trainer::new(cfg.forest_params());
        let outcome = trainer.train(&prepared.split).context("training failed")?;

        // ── Step 4: Cross-validate ────────────────────────────────────────────
        let cross_validation = trainer
            .cross_validate(&prepared.dataset, cfg.cv_folds)
            .context("cross-validation failed")?;

        // ── Step 5: Score every row ───────────────────────────────────────────
        let model = TrainedModel::from_outcome(
            outcome,
            prepared.encoding,
            cross_validation.as_ref(),
        );
        let predictions = Predictor::new(&model)
            .predict_table(table)
            .context("scoring the survey rows failed")?;

        // ── Step 6: Persist ───────────────────────────────────────────────────
        store
            .save_trained_model(&model, &predictions)
            .context("cannot store the trained model")?;

        // ── Step 7: Run log ───────────────────────────────────────────────────
        // The model is already stored; a log failure is reported, not fatal.
        if let Err(e) = TrainingRunLog::new(&self.reports_dir)
            .and_then(|log| log.append(&TrainingRun::from_summary(&model.summary)))
        {
            tracing::warn!("Could not append to the training run log: {e:#}");
        }

        tracing::info!(
            "Model {} trained: accuracy {:.3}",
            model.id(),
            model.summary.accuracy
        );

        Ok(TrainReport {
            distribution:     label_distribution(&predictions),
            n_predictions:    predictions.len(),
            summary:          model.summary,
            cross_validation,
            dropped_rows:     prepared.dropped_rows,
        })
    }
}

fn load(source: &dyn TableSource) -> Result<Table> {
    let origin = source.describe();
    tracing::info!("Loading training data from '{}'", origin);
    let table = source
        .load_table()
        .with_context(|| format!("cannot load training data from '{origin}'"))?;
    Ok(table)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::IngestOptions;
    use crate::domain::errors::{PipelineError, PipelineResult};

    struct InlineSource(&'static str);

    impl TableSource for InlineSource {
        fn describe(&self) -> String {
            "inline.csv".into()
        }

        fn load_table(&self) -> PipelineResult<Table> {
            CsvLoader::new(IngestOptions {
                target_column: "adopted".into(),
                ..Default::default()
            })
            .load_bytes(self.0.as_bytes())
        }
    }

    fn survey_csv() -> &'static str {
        "age,department,email,adopted\n\
         31,IT,a@x.io,yes\n45,HR,b@x.io,no\n29,IT,c@x.io,yes\n52,Sales,d@x.io,no\n\
         38,IT,e@x.io,yes\n41,HR,f@x.io,no\n,Sales,g@x.io,yes\n60,HR,h@x.io,no\n\
         33,IT,i@x.io,yes\n48,,j@x.io,no\n35,IT,k@x.io,\n"
    }

    fn pipeline() -> PipelineSettings {
        PipelineSettings {
            target_column:   "adopted".into(),
            exclude_columns: vec!["email".into()],
            n_trees:         10,
            ..Default::default()
        }
    }

    #[test]
    fn test_successful_run_becomes_current() {
        let dir       = tempfile::tempdir().unwrap();
        let mut store = SqliteStore::open_in_memory().unwrap();

        let report = TrainUseCase::new(pipeline(), dir.path())
            .execute(&InlineSource(survey_csv()), &mut store)
            .unwrap();

        assert_eq!(report.dropped_rows, 1);
        assert_eq!(report.n_predictions, 11);
        assert!((0.0..=1.0).contains(&report.summary.accuracy));
        assert!(!report.summary.features.contains(&"email".to_string()));
        // 10 labelled rows, 5 folds
        assert!(report.cross_validation.is_some());

        let current = store.current_summary().unwrap().unwrap();
        assert_eq!(current.id, report.summary.id);

        let log = TrainingRunLog::new(dir.path()).unwrap().read_all().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].model_id, report.summary.id);
    }

    #[test]
    fn test_single_class_fails_and_keeps_previous_model() {
        let dir       = tempfile::tempdir().unwrap();
        let mut store = SqliteStore::open_in_memory().unwrap();
        let use_case  = TrainUseCase::new(pipeline(), dir.path());

        let first = use_case
            .execute(&InlineSource(survey_csv()), &mut store)
            .unwrap();

        let err = use_case
            .execute(
                &InlineSource("age,department,email,adopted\n1,IT,a,yes\n2,HR,b,yes\n"),
                &mut store,
            )
            .unwrap_err();

        assert!(matches!(err.downcast_ref::<PipelineError>(), Some(PipelineError::Schema(_))));
        assert_eq!(store.current_summary().unwrap().unwrap().id, first.summary.id);
        assert_eq!(store.model_history(None).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_target_column_stores_nothing() {
        let dir       = tempfile::tempdir().unwrap();
        let mut store = SqliteStore::open_in_memory().unwrap();

        let err = TrainUseCase::new(pipeline(), dir.path())
            .execute(&InlineSource("age,department
31,IT
45,HR
"), &mut store)
            .unwrap_err();

        assert!(matches!(err.downcast_ref::<PipelineError>(), Some(PipelineError::Schema(_))));
        assert!(store.current_summary().unwrap().is_none());
        assert!(store.model_history(None).unwrap().is_empty());
        assert!(store.predictions(None).unwrap().is_empty());
    }

    #[test]
    fn test_trains_on_latest_upload() {
        let dir       = tempfile::tempdir().unwrap();
        let mut store = SqliteStore::open_in_memory().unwrap();
        let loader    = CsvLoader::new(IngestOptions {
            target_column: "adopted".into(),
            ..Default::default()
        });
        let table = loader.load_bytes(survey_csv().as_bytes()).unwrap();
        store.save_batch("survey.csv", &table).unwrap();

        let report = TrainUseCase::new(pipeline(), dir.path())
            .execute_on_latest_upload(&mut store, loader)
            .unwrap();
        assert_eq!(report.n_predictions, 11);
    }
}
