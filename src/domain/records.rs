// ============================================================
// Layer 3 — Persisted Record Kinds
// ============================================================
// Logical records written by the persistence layer:
//
//   UploadBatch   — one uploaded CSV (header order + row count)
//   SurveyRecord  — one uploaded row, never mutated after upload
//   ModelSummary  — metadata of a TrainedModel (no artifact)
//   Prediction    — a model applied to one row
//   Insight       — suggestion text tied to one model run
//
// Identifiers are generated by storage; timestamps are UTC.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadBatch {
    pub id:         String,
    pub source:     String,
    pub columns:    Vec<String>,
    pub row_count:  usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyRecord {
    pub id:         i64,
    pub batch_id:   String,
    pub row_index:  usize,
    /// Column name → raw value (`None` when the cell was missing)
    pub values:     BTreeMap<String, Option<String>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature:    String,
    pub importance: f64,
}

/// Everything the dashboard and the suggestion prompt need to
/// know about a trained model, without the fitted trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub id:                  String,
    pub target_column:       String,
    pub features:            Vec<String>,
    pub classes:             Vec<String>,
    pub accuracy:            f64,
    pub cv_accuracy:         Option<f64>,
    pub feature_importances: Vec<FeatureImportance>,
    pub n_train:             usize,
    pub n_eval:              usize,
    pub created_at:          DateTime<Utc>,
}

impl ModelSummary {
    /// The `n` most important features, highest first
    pub fn top_features(&self, n: usize) -> Vec<&FeatureImportance> {
        let mut sorted: Vec<&FeatureImportance> = self.feature_importances.iter().collect();
        sorted.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        sorted.truncate(n);
        sorted
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub model_id:        String,
    /// Shared by every prediction of one scoring pass
    pub run_id:          String,
    pub row_index:       usize,
    /// Encoded input features by name
    pub features:        BTreeMap<String, f64>,
    pub predicted_label: String,
    /// Probability of the predicted label
    pub confidence:      f64,
    pub created_at:      DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub id:         Option<i64>,
    pub model_id:   String,
    pub category:   String,
    pub text:       String,
    pub created_at: DateTime<Utc>,
}

/// Count predictions per label, most frequent first (ties by label).
pub fn label_distribution(predictions: &[Prediction]) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for p in predictions {
        *counts.entry(p.predicted_label.as_str()).or_insert(0) += 1;
    }

    let mut out: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(label, n)| (label.to_string(), n))
        .collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out
}
