// ============================================================
// Layer 5 — Random Forest Classifier
// ============================================================
// An ensemble of CART trees:
//   - tree i is grown on a bootstrap sample drawn with
//     ChaCha8Rng seeded from `seed + i`
//   - each split looks at sqrt(n_features) random features
//   - class probabilities are averaged over all trees
//   - feature importances are averaged over trees and
//     normalised to sum 1
//
// Trees are built one after another on the calling thread; the
// per-tree seeds make the result independent of build order.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::data::dataset::Dataset;
use crate::domain::errors::{PipelineError, PipelineResult};
use crate::ml::decision_tree::{DecisionTree, TreeParams};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees:           usize,
    pub max_depth:         Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf:  usize,
    /// Features per split; None = ceil(sqrt(n_features))
    pub max_features:      Option<usize>,
    pub bootstrap:         bool,
    pub seed:              u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees:           100,
            max_depth:         Some(10),
            min_samples_split: 2,
            min_samples_leaf:  1,
            max_features:      None,
            bootstrap:         true,
            seed:              42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    params:              ForestParams,
    trees:               Vec<DecisionTree>,
    n_features:          usize,
    n_classes:           usize,
    feature_importances: Vec<f64>,
}

impl RandomForest {
    /// Fit the ensemble. Degenerate input is a TrainingError and no
    /// forest is returned.
    pub fn fit(params: &ForestParams, data: &Dataset) -> PipelineResult<Self> {
        let n          = data.n_samples();
        let n_features = data.n_features();

        if params.n_trees == 0 {
            return Err(PipelineError::training("n_trees must be at least 1"));
        }
        if n == 0 {
            return Err(PipelineError::training("training partition is empty"));
        }
        if n_features == 0 {
            return Err(PipelineError::training("dataset has no feature columns"));
        }
        if data.n_classes == 0 || data.labels.iter().any(|&l| l >= data.n_classes) {
            return Err(PipelineError::training("labels do not match the class list"));
        }
        if data.features.iter().any(|row| row.len() != n_features || row.iter().any(|v| !v.is_finite())) {
            return Err(PipelineError::training("feature matrix contains non-finite or ragged rows"));
        }

        let max_features = params
            .max_features
            .unwrap_or_else(|| (n_features as f64).sqrt().ceil() as usize)
            .clamp(1, n_features);

        let tree_params = TreeParams {
            max_depth:         params.max_depth,
            min_samples_split: params.min_samples_split,
            min_samples_leaf:  params.min_samples_leaf,
            max_features:      Some(max_features),
        };

        let trees: Vec<DecisionTree> = (0..params.n_trees)
            .map(|i| {
                let mut rng = ChaCha8Rng::seed_from_u64(params.seed.wrapping_add(i as u64));
                let sample: Vec<usize> = if params.bootstrap {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                DecisionTree::fit(data, &sample, &tree_params, &mut rng)
            })
            .collect();

        // Average per-tree importances, then renormalise
        let mut feature_importances = vec![0.0; n_features];
        for tree in &trees {
            for (acc, v) in feature_importances.iter_mut().zip(tree.feature_importances()) {
                *acc += v;
            }
        }
        let total: f64 = feature_importances.iter().sum();
        if total > 0.0 {
            feature_importances.iter_mut().for_each(|v| *v /= total);
        }

        tracing::debug!(
            "Fitted {} trees (max_features={}, mean depth {:.1})",
            trees.len(),
            max_features,
            trees.iter().map(|t| t.depth() as f64).sum::<f64>() / trees.len() as f64,
        );

        Ok(Self {
            params: params.clone(),
            trees,
            n_features,
            n_classes: data.n_classes,
            feature_importances,
        })
    }

    /// Mean class probabilities over all trees
    pub fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        let mut probs = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (acc, p) in probs.iter_mut().zip(tree.predict_proba(row)) {
                *acc += p;
            }
        }
        let n = self.trees.len().max(1) as f64;
        probs.iter_mut().for_each(|p| *p /= n);
        probs
    }

    /// Most probable class index (ties go to the lower index)
    pub fn predict(&self, row: &[f64]) -> usize {
        argmax(&self.predict_proba(row)).0
    }

    /// Fraction of samples in `data` classified correctly
    pub fn accuracy(&self, data: &Dataset) -> f64 {
        if data.is_empty() {
            return 0.0;
        }
        let correct = data
            .features
            .iter()
            .zip(data.labels.iter())
            .filter(|(row, &label)| self.predict(row) == label)
            .count();
        correct as f64 / data.n_samples() as f64
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

/// (index, value) of the largest entry; first one wins on ties
pub fn argmax(values: &[f64]) -> (usize, f64) {
    let mut best = (0, f64::NEG_INFINITY);
    for (i, &v) in values.iter().enumerate() {
        if v > best.1 {
            best = (i, v);
        }
    }
    best
}
