// ============================================================
// Layer 5 — CART Decision Tree (classification)
// ============================================================
// Binary splits of the form `feature <= threshold`, chosen to
// maximise the decrease in Gini impurity:
//
//   gini(node) = 1 - Σ p_c²
//   gain       = gini(parent) - (n_l·gini(left) + n_r·gini(right)) / n
//
// Candidate thresholds are midpoints between consecutive distinct
// values of a feature. Only `max_features` randomly chosen
// features are examined at each node (feature bagging).
//
// Leaves store class probabilities so the forest can average
// them into a confidence score.
//
// The tree is fitted on a list of sample positions which may
// contain duplicates (bootstrap samples).

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::data::dataset::Dataset;

const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    /// None grows until leaves are pure or too small
    pub max_depth:         Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf:  usize,
    /// None examines every feature at every node
    pub max_features:      Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth:         Some(10),
            min_samples_split: 2,
            min_samples_leaf:  1,
            max_features:      None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        probabilities: Vec<f64>,
        n_samples:     usize,
    },
    Split {
        feature:   usize,
        threshold: f64,
        left:      Box<Node>,
        right:     Box<Node>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    root:        Node,
    n_classes:   usize,
    /// Weighted impurity decrease per feature, normalised to sum 1
    importances: Vec<f64>,
}

impl DecisionTree {
    /// Fit a tree on the samples at `positions` of `data`.
    pub fn fit(
        data:      &Dataset,
        positions: &[usize],
        params:    &TreeParams,
        rng:       &mut ChaCha8Rng,
    ) -> Self {
        let mut builder = Builder {
            data,
            params,
            rng,
            importances: vec![0.0; data.n_features()],
        };
        let root = builder.build(positions.to_vec(), 0);

        let mut importances = builder.importances;
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }

        Self { root, n_classes: data.n_classes, importances }
    }

    /// Class probabilities of the leaf `row` falls into
    pub fn predict_proba(&self, row: &[f64]) -> &[f64] {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf { probabilities, .. } => return probabilities,
                Node::Split { feature, threshold, left, right } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }

    pub fn depth(&self) -> usize {
        fn depth_of(node: &Node) -> usize {
            match node {
                Node::Leaf { .. } => 1,
                Node::Split { left, right, .. } => 1 + depth_of(left).max(depth_of(right)),
            }
        }
        depth_of(&self.root)
    }

    pub fn n_leaves(&self) -> usize {
        fn leaves_of(node: &Node) -> usize {
            match node {
                Node::Leaf { .. } => 1,
                Node::Split { left, right, .. } => leaves_of(left) + leaves_of(right),
            }
        }
        leaves_of(&self.root)
    }
}

// ─── Recursive builder ────────────────────────────────────────────────────────
struct Builder<'a> {
    data:        &'a Dataset,
    params:      &'a TreeParams,
    rng:         &'a mut ChaCha8Rng,
    importances: Vec<f64>,
}

struct BestSplit {
    feature:   usize,
    threshold: f64,
    gain:      f64,
}

impl Builder<'_> {
    fn build(&mut self, positions: Vec<usize>, depth: usize) -> Node {
        let n      = positions.len();
        let counts = self.class_counts(&positions);
        let impurity = gini(&counts, n);

        let depth_reached = self.params.max_depth.map_or(false, |d| depth >= d);
        if depth_reached || n < self.params.min_samples_split.max(2) || impurity <= MIN_GAIN {
            return leaf(&counts, n);
        }

        let Some(best) = self.find_best_split(&positions, &counts, impurity) else {
            return leaf(&counts, n);
        };

        self.importances[best.feature] += best.gain * n as f64;

        let (left, right): (Vec<usize>, Vec<usize>) = positions
            .into_iter()
            .partition(|&i| self.data.features[i][best.feature] <= best.threshold);

        Node::Split {
            feature:   best.feature,
            threshold: best.threshold,
            left:      Box::new(self.build(left, depth + 1)),
            right:     Box::new(self.build(right, depth + 1)),
        }
    }

    fn find_best_split(
        &mut self,
        positions:       &[usize],
        parent_counts:   &[usize],
        parent_impurity: f64,
    ) -> Option<BestSplit> {
        let n_features = self.data.n_features();
        let n          = positions.len();
        let min_leaf   = self.params.min_samples_leaf.max(1);

        let mut candidates: Vec<usize> = (0..n_features).collect();
        candidates.shuffle(&mut *self.rng);
        candidates.truncate(self.params.max_features.unwrap_or(n_features).clamp(1, n_features));

        let mut best: Option<BestSplit> = None;

        for feature in candidates {
            let column = |i: usize| self.data.features[i][feature];

            let mut sorted = positions.to_vec();
            sorted.sort_by(|&a, &b| column(a).total_cmp(&column(b)));

            // Sweep left to right, moving one sample at a time
            let mut left  = vec![0usize; parent_counts.len()];
            let mut right = parent_counts.to_vec();

            for k in 0..n - 1 {
                let label = self.data.labels[sorted[k]];
                left[label]  += 1;
                right[label] -= 1;

                let here = column(sorted[k]);
                let next = column(sorted[k + 1]);
                if here == next {
                    continue;
                }

                let n_left  = k + 1;
                let n_right = n - n_left;
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }

                let weighted = (n_left as f64 * gini(&left, n_left)
                    + n_right as f64 * gini(&right, n_right))
                    / n as f64;
                let gain = parent_impurity - weighted;

                if gain > best.as_ref().map_or(MIN_GAIN, |b| b.gain + MIN_GAIN) {
                    best = Some(BestSplit {
                        feature,
                        threshold: here + (next - here) / 2.0,
                        gain,
                    });
                }
            }
        }

        best
    }

    fn class_counts(&self, positions: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.data.n_classes];
        for &i in positions {
            counts[self.data.labels[i]] += 1;
        }
        counts
    }
}

fn gini(counts: &[usize], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - counts.iter().map(|&c| (c as f64 / n).powi(2)).sum::<f64>()
}

fn leaf(counts: &[usize], n: usize) -> Node {
    let probabilities = if n == 0 {
        vec![1.0 / counts.len().max(1) as f64; counts.len()]
    } else {
        counts.iter().map(|&c| c as f64 / n as f64).collect()
    };
    Node::Leaf { probabilities, n_samples: n }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn separable() -> Dataset {
        // x0 decides the class, x1 is noise
        let features = (0..20)
            .map(|i| vec![i as f64, ((i * 7) % 5) as f64])
            .collect();
        let labels = (0..20).map(|i| usize::from(i >= 10)).collect();
        Dataset::new(features, labels, (0..20).collect(), vec!["x0".into(), "x1".into()], 2)
    }

    fn fit(data: &Dataset, params: &TreeParams) -> DecisionTree {
        let mut rng   = ChaCha8Rng::seed_from_u64(42);
        let positions: Vec<usize> = (0..data.n_samples()).collect();
        DecisionTree::fit(data, &positions, params, &mut rng)
    }

    #[test]
    fn test_gini_values() {
        assert_eq!(gini(&[5, 0], 5), 0.0);
        assert!((gini(&[5, 5], 10) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_learns_single_threshold() {
        let data = separable();
        let tree = fit(&data, &TreeParams::default());

        assert_eq!(tree.predict_proba(&[2.0, 0.0]), &[1.0, 0.0]);
        assert_eq!(tree.predict_proba(&[15.0, 0.0]), &[0.0, 1.0]);
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.n_leaves(), 2);
    }

    #[test]
    fn test_importance_goes_to_informative_feature() {
        let tree = fit(&separable(), &TreeParams::default());
        let imp  = tree.feature_importances();
        assert!((imp[0] - 1.0).abs() < 1e-12);
        assert_eq!(imp[1], 0.0);
    }

    #[test]
    fn test_max_depth_zero_gives_single_leaf() {
        let params = TreeParams { max_depth: Some(0), ..Default::default() };
        let tree   = fit(&separable(), &params);
        assert_eq!(tree.n_leaves(), 1);
        assert_eq!(tree.predict_proba(&[0.0, 0.0]), &[0.5, 0.5]);
    }

    #[test]
    fn test_constant_features_give_leaf() {
        let data = Dataset::new(
            vec![vec![1.0]; 6],
            vec![0, 1, 0, 1, 0, 1],
            (0..6).collect(),
            vec!["c".into()],
            2,
        );
        let tree = fit(&data, &TreeParams::default());
        assert_eq!(tree.n_leaves(), 1);
        assert_eq!(tree.feature_importances(), &[0.0]);
    }
}
