// ============================================================
// Layer 5 — Predictor
// ============================================================
// Applies a TrainedModel to every row of a table:
//   1. re-encode the row with the model's own FeatureEncoding
//      (same fills, same category codes)
//   2. average class probabilities over the forest
//   3. report the most probable label and its probability
//
// Predictions carry the model id and a per-call run id, so a
// later scoring pass or retraining never changes what an older
// run predicted.

use std::collections::BTreeMap;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::records::Prediction;
use crate::domain::table::Table;
use crate::ml::model::TrainedModel;
use crate::ml::random_forest::argmax;

pub struct Predictor<'a> {
    model: &'a TrainedModel,
}

impl<'a> Predictor<'a> {
    pub fn new(model: &'a TrainedModel) -> Self {
        Self { model }
    }

    pub fn predict_table(&self, table: &Table) -> PipelineResult<Vec<Prediction>> {
        let artifact = &self.model.artifact;
        let encoded  = artifact.encoding.encode_table(table)?;
        let names    = artifact.encoding.feature_names();
        let now      = Utc::now();
        let run_id   = Uuid::new_v4().to_string();

        let predictions = encoded
            .into_iter()
            .enumerate()
            .map(|(row_index, row)| {
                let probs               = artifact.forest.predict_proba(&row);
                let (class, confidence) = argmax(&probs);
                let label = artifact.encoding.class_label(class).ok_or_else(|| {
                    PipelineError::training(format!("class index {class} has no label"))
                })?;

                Ok(Prediction {
                    model_id:        self.model.id().to_string(),
                    run_id:          run_id.clone(),
                    row_index,
                    features:        names.iter().cloned().zip(row).collect::<BTreeMap<_, _>>(),
                    predicted_label: label.to_string(),
                    confidence,
                    created_at:      now,
                })
            })
            .collect::<PipelineResult<Vec<_>>>()?;

        tracing::info!("Scored {} rows with model {}", predictions.len(), self.model.id());
        Ok(predictions)
    }
}
