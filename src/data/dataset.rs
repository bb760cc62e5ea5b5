// ============================================================
// Layer 4 — Encoded Dataset
// ============================================================
// Numeric feature matrix plus class-index labels, produced by
// the preprocessor and consumed by the ML layer.
//
// `row_ids` keeps the position of each sample in the original
// table so predictions and splits can be traced back to rows.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// n_samples x n_features
    pub features:      Vec<Vec<f64>>,
    /// Class index per sample, in 0..n_classes
    pub labels:        Vec<usize>,
    pub row_ids:       Vec<usize>,
    pub feature_names: Vec<String>,
    pub n_classes:     usize,
}

/// Training / evaluation partitions
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub train: Dataset,
    pub eval:  Dataset,
}

impl Dataset {
    pub fn new(
        features:      Vec<Vec<f64>>,
        labels:        Vec<usize>,
        row_ids:       Vec<usize>,
        feature_names: Vec<String>,
        n_classes:     usize,
    ) -> Self {
        Self { features, labels, row_ids, feature_names, n_classes }
    }

    pub fn n_samples(&self) -> usize {
        self.features.len()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Copy the samples at the given positions into a new dataset
    pub fn subset(&self, positions: &[usize]) -> Dataset {
        Dataset {
            features:      positions.iter().map(|&i| self.features[i].clone()).collect(),
            labels:        positions.iter().map(|&i| self.labels[i]).collect(),
            row_ids:       positions.iter().map(|&i| self.row_ids[i]).collect(),
            feature_names: self.feature_names.clone(),
            n_classes:     self.n_classes,
        }
    }

    /// Number of samples per class index
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes];
        for &label in &self.labels {
            counts[label] += 1;
        }
        counts
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn tiny() -> Dataset {
        Dataset::new(
            vec![vec![1.0], vec![2.0], vec![3.0]],
            vec![0, 1, 1],
            vec![10, 11, 12],
            vec!["x".into()],
            2,
        )
    }

    #[test]
    fn test_subset_keeps_row_ids() {
        let sub = tiny().subset(&[2, 0]);
        assert_eq!(sub.features, vec![vec![3.0], vec![1.0]]);
        assert_eq!(sub.row_ids, vec![12, 10]);
        assert_eq!(sub.n_classes, 2);
    }

    #[test]
    fn test_class_counts() {
        assert_eq!(tiny().class_counts(), vec![1, 2]);
    }
}
