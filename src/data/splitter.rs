// ============================================================
// Layer 4 — Train/Evaluation Splitter
// ============================================================
// Splits sample positions into a training set (used to fit the
// forest) and an evaluation set (used only to score it).
//
// Two properties matter here:
//   - Reproducibility: the shuffle uses ChaCha8Rng seeded from
//     the configured seed, so the same labels and seed always
//     give the same partitions.
//   - Stratification: each class is split on its own, so both
//     partitions see every class that has at least two rows.
//
// Split ratio: 80% training, 20% evaluation (configurable)
//
// Also provides k-fold assignment for cross-validation.
//
// Reference: rand / rand_chacha crate documentation

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Stratified, seeded split of sample positions.
///
/// # Arguments
/// * `labels`         - Class index for every sample
/// * `n_classes`      - Number of distinct classes
/// * `train_fraction` - Proportion for training, e.g. 0.8 = 80%
/// * `seed`           - RNG seed
///
/// # Returns
/// (train_positions, eval_positions), both in ascending order
pub fn stratified_split(
    labels:         &[usize],
    n_classes:      usize,
    train_fraction: f64,
    seed:           u64,
) -> (Vec<usize>, Vec<usize>) {
    let mut rng   = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(labels.len());
    let mut eval  = Vec::new();

    for class in 0..n_classes {
        let mut members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, &l)| l == class)
            .map(|(i, _)| i)
            .collect();

        if members.is_empty() {
            continue;
        }

        members.shuffle(&mut rng);

        let n           = members.len();
        let mut n_train = ((n as f64) * train_fraction).round() as usize;
        n_train         = n_train.clamp(1, n);

        // A class with two or more rows always shows up in evaluation
        if n >= 2 && n_train == n && train_fraction < 1.0 {
            n_train = n - 1;
        }

        train.extend_from_slice(&members[..n_train]);
        eval.extend_from_slice(&members[n_train..]);
    }

    train.sort_unstable();
    eval.sort_unstable();

    tracing::debug!(
        "Stratified split: {} training, {} evaluation (seed {})",
        train.len(),
        eval.len(),
        seed,
    );

    (train, eval)
}

/// Assign `n` sample positions to `k` folds after a seeded shuffle.
/// Fold sizes differ by at most one; each fold is sorted.
pub fn k_fold_indices(n: usize, k: usize, seed: u64) -> Vec<Vec<usize>> {
    let k = k.max(1);
    let mut positions: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    positions.shuffle(&mut rng);

    let mut folds = vec![Vec::new(); k];
    for (i, pos) in positions.into_iter().enumerate() {
        folds[i % k].push(pos);
    }
    for fold in &mut folds {
        fold.sort_unstable();
    }
    folds
}
