// ============================================================
// Layer 5 — Trainer
// ============================================================
// Fits the random forest on the training partition and scores
// it on the held-out evaluation partition:
//
//   accuracy = correctly classified eval rows / eval rows
//
// No retries: any fit failure is returned as a TrainingError and
// the caller persists nothing.
//
// Optional k-fold cross-validation over the whole prepared
// dataset gives a second, less split-dependent accuracy figure.

use serde::{Deserialize, Serialize};

use crate::data::dataset::{Dataset, Split};
use crate::data::splitter::k_fold_indices;
use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::records::FeatureImportance;
use crate::ml::random_forest::{ForestParams, RandomForest};

/// Result of one successful training run
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub forest:              RandomForest,
    /// In [0, 1]
    pub accuracy:            f64,
    pub feature_importances: Vec<FeatureImportance>,
    pub n_train:             usize,
    pub n_eval:              usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidation {
    pub fold_accuracies: Vec<f64>,
    pub mean:            f64,
    pub std_dev:         f64,
}

pub struct Trainer {
    params: ForestParams,
}

impl Trainer {
    pub fn new(params: ForestParams) -> Self {
        Self { params }
    }

    /// Fit on `split.train`, score on `split.eval`
    pub fn train(&self, split: &Split) -> PipelineResult<TrainingOutcome> {
        if split.eval.is_empty() {
            return Err(PipelineError::training(
                "evaluation partition is empty; upload more rows",
            ));
        }

        tracing::info!(
            "Fitting random forest: {} trees, {} training rows, {} features",
            self.params.n_trees,
            split.train.n_samples(),
            split.train.n_features(),
        );

        let forest   = RandomForest::fit(&self.params, &split.train)?;
        let accuracy = forest.accuracy(&split.eval);

        let feature_importances = split
            .train
            .feature_names
            .iter()
            .zip(forest.feature_importances())
            .map(|(name, &importance)| FeatureImportance {
                feature: name.clone(),
                importance,
            })
            .collect();

        tracing::info!("Evaluation accuracy: {:.3} on {} rows", accuracy, split.eval.n_samples());

        Ok(TrainingOutcome {
            forest,
            accuracy,
            feature_importances,
            n_train: split.train.n_samples(),
            n_eval:  split.eval.n_samples(),
        })
    }

    /// k-fold cross-validation; `None` when there are fewer rows than folds
    pub fn cross_validate(
        &self,
        dataset: &Dataset,
        folds:   usize,
    ) -> PipelineResult<Option<CrossValidation>> {
        if folds < 2 || dataset.n_samples() < folds {
            tracing::warn!(
                "Skipping cross-validation: {} rows for {} folds",
                dataset.n_samples(),
                folds
            );
            return Ok(None);
        }

        let assignment = k_fold_indices(dataset.n_samples(), folds, self.params.seed);
        let mut fold_accuracies = Vec::with_capacity(folds);

        for (k, held_out) in assignment.iter().enumerate() {
            let training: Vec<usize> = assignment
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != k)
                .flat_map(|(_, fold)| fold.iter().copied())
                .collect();

            let forest = RandomForest::fit(&self.params, &dataset.subset(&training))?;
            let score  = forest.accuracy(&dataset.subset(held_out));
            tracing::debug!("Fold {}/{}: accuracy {:.3}", k + 1, folds, score);
            fold_accuracies.push(score);
        }

        let mean     = fold_accuracies.iter().sum::<f64>() / folds as f64;
        let variance = fold_accuracies.iter().map(|a| (a - mean).powi(2)).sum::<f64>() / folds as f64;

        tracing::info!("Cross-validation accuracy: {:.3} (+/- {:.3})", mean, 2.0 * variance.sqrt());

        Ok(Some(CrossValidation {
            fold_accuracies,
            mean,
            std_dev: variance.sqrt(),
        }))
    }
}
