// ============================================================
// Layer 5 — ML / Model Layer
// ============================================================
// All model fitting and scoring lives here.
//
//   decision_tree.rs — CART classification tree (Gini)
//   random_forest.rs — bootstrap ensemble of trees
//   trainer.rs       — fit on train split, score on eval split,
//                      optional k-fold cross-validation
//   model.rs         — TrainedModel (summary + artifact)
//   inferencer.rs    — Predictor: apply a model to a table
//
// Reference: Breiman (2001) Random Forests
//            Breiman et al. (1984) Classification and Regression Trees

/// Single CART classification tree
pub mod decision_tree;

/// Random forest ensemble
pub mod random_forest;

/// Training and evaluation
pub mod trainer;

/// The persisted model artifact
pub mod model;

/// Scoring rows with a trained model
pub mod inferencer;
