// ============================================================
// Layer 5 — TrainedModel
// ============================================================
// The artifact produced by one successful training run:
//
//   summary  — metadata shown on the dashboard and sent to the
//              suggestion service (id, target, accuracy, ...)
//   artifact — the fitted forest plus the feature encoding
//              needed to score new rows
//
// A TrainedModel is never mutated. Retraining builds a new one
// with a fresh id; persistence decides which one is current.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::data::preprocessor::FeatureEncoding;
use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::records::ModelSummary;
use crate::ml::random_forest::RandomForest;
use crate::ml::trainer::{CrossValidation, TrainingOutcome};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub forest:   RandomForest,
    pub encoding: FeatureEncoding,
}

impl ModelArtifact {
    pub fn to_json(&self) -> PipelineResult<String> {
        serde_json::to_string(self)
            .map_err(|e| PipelineError::persistence(format!("cannot serialise model: {e}")))
    }

    pub fn from_json(json: &str) -> PipelineResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| PipelineError::persistence(format!("cannot deserialise model: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainedModel {
    pub summary:  ModelSummary,
    pub artifact: ModelArtifact,
}

impl TrainedModel {
    /// Wrap a training outcome into a new model with a fresh id
    pub fn from_outcome(
        outcome:  TrainingOutcome,
        encoding: FeatureEncoding,
        cv:       Option<&CrossValidation>,
    ) -> Self {
        let summary = ModelSummary {
            id:                  Uuid::new_v4().to_string(),
            target_column:       encoding.target_column.clone(),
            features:            encoding.feature_names(),
            classes:             encoding.classes.clone(),
            accuracy:            outcome.accuracy,
            cv_accuracy:         cv.map(|c| c.mean),
            feature_importances: outcome.feature_importances,
            n_train:             outcome.n_train,
            n_eval:              outcome.n_eval,
            created_at:          Utc::now(),
        };

        Self {
            summary,
            artifact: ModelArtifact { forest: outcome.forest, encoding },
        }
    }

    pub fn id(&self) -> &str {
        &self.summary.id
    }
}
