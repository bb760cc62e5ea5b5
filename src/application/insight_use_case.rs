// ============================================================
// Layer 2 — InsightUseCase
// ============================================================
// Turns the current model into a narrative:
//
//   Step 1: Read the current model summary    (Layer 6 - infra)
//   Step 2: Count its predicted labels        (Layer 3 - domain)
//   Step 3: Build the prompt                  (this file)
//   Step 4: Ask the suggestion service        (Layer 6 - infra)
//   Step 5: Store the answer as an Insight    (Layer 6 - infra)
//
// The service is generic so tests can substitute a stub.

use anyhow::{bail, Result};
use chrono::Utc;
use std::fmt::Write;

use crate::data::stats::{ColumnSummary, SurveyStats};
use crate::domain::errors::PipelineResult;
use crate::domain::records::{label_distribution, Insight, ModelSummary};
use crate::domain::traits::SuggestionService;
use crate::infra::store::SqliteStore;

pub const DEFAULT_CATEGORY: &str = "general";

/// Feature importances quoted in the prompt
const PROMPT_FEATURES: usize = 5;

pub struct InsightUseCase<S: SuggestionService> {
    service:  S,
    category: String,
}

impl<S: SuggestionService> InsightUseCase<S> {
    pub fn new(service: S) -> Self {
        Self { service, category: DEFAULT_CATEGORY.to_string() }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Generate and store an insight for the current model
    pub async fn execute(&self, store: &SqliteStore, survey: Option<&SurveyStats>) -> Result<Insight> {
        let Some(summary) = store.current_summary()? else {
            bail!("no trained model yet; run `train` first");
        };
        Ok(self.generate(store, &summary, survey).await?)
    }

    /// Same as `execute` for an already loaded summary.
    ///
    /// Every failure is a `PipelineError`, so callers can tell a
    /// suggestion outage apart from a storage problem.
    pub async fn generate(
        &self,
        store:   &SqliteStore,
        summary: &ModelSummary,
        survey:  Option<&SurveyStats>,
    ) -> PipelineResult<Insight> {
        let distribution = label_distribution(&store.latest_predictions(&summary.id)?);
        let prompt       = build_prompt(summary, &distribution, survey);
        tracing::debug!("Insight prompt:\n{}", prompt);

        let text = self.service.suggest(&prompt).await?;

        let mut insight = Insight {
            id:         None,
            model_id:   summary.id.clone(),
            category:   self.category.clone(),
            text,
            created_at: Utc::now(),
        };
        insight.id = Some(store.save_insight(&insight)?);
        Ok(insight)
    }
}

/// Prompt asking for "Insights:" then "Recommendations:" about one model run
pub fn build_prompt(
    summary:      &ModelSummary,
    distribution: &[(String, usize)],
    survey:       Option<&SurveyStats>,
) -> String {
    let mut p = String::new();

    let _ = writeln!(p, "Analyze these survey results and the classifier trained on them:");
    if let Some(stats) = survey {
        let _ = writeln!(p, "- {} total responses", stats.total_responses);
        for column in &stats.columns {
            if let ColumnSummary::Categorical { distinct, top } = &column.summary {
                let values: Vec<String> = top.iter().map(|(v, n)| format!("{v}: {n}")).collect();
                let _ = writeln!(
                    p,
                    "- '{}': {} distinct answers, most common {{{}}}",
                    column.name,
                    distinct,
                    values.join(", ")
                );
            }
        }
    }
    let _ = writeln!(
        p,
        "- Predicted field '{}' with classes [{}]",
        summary.target_column,
        summary.classes.join(", ")
    );
    let _ = writeln!(
        p,
        "- Accuracy on held-out responses: {:.1}% ({} train / {} evaluation rows)",
        summary.accuracy * 100.0,
        summary.n_train,
        summary.n_eval
    );
    if let Some(cv) = summary.cv_accuracy {
        let _ = writeln!(p, "- Cross-validated accuracy: {:.1}%", cv * 100.0);
    }

    let top: Vec<String> = summary
        .top_features(PROMPT_FEATURES)
        .iter()
        .map(|f| format!("{} ({:.3})", f.feature, f.importance))
        .collect();
    let _ = writeln!(p, "- Most influential factors: {}", top.join(", "));

    let predicted: Vec<String> = distribution.iter().map(|(l, n)| format!("{l}: {n}")).collect();
    let _ = writeln!(p, "- Predicted label counts: {}", predicted.join(", "));

    let _ = writeln!(p);
    let _ = writeln!(
        p,
        "Provide 3-5 key insights about the patterns observed, and suggest 3 specific \
         recommendations."
    );
    let _ = write!(
        p,
        "Format your response as \"Insights:\" followed by numbered bullet points, then \
         \"Recommendations:\" followed by numbered bullet points."
    );
    p
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::{CsvLoader, IngestOptions};
    use crate::data::preprocessor::{PreprocessConfig, Preprocessor};
    use crate::domain::errors::PipelineError;
    use crate::domain::records::FeatureImportance;
    use crate::ml::inferencer::Predictor;
    use crate::ml::model::TrainedModel;
    use crate::ml::random_forest::ForestParams;
    use crate::ml::trainer::Trainer;
    use async_trait::async_trait;

    struct FixedService(PipelineResult<String>);

    #[async_trait]
    impl SuggestionService for FixedService {
        async fn suggest(&self, prompt: &str) -> PipelineResult<String> {
            assert!(prompt.contains("Recommendations:"));
            self.0.clone()
        }
    }

    fn store_with_model() -> (SqliteStore, String) {
        let csv = "score,team,adopted\n1,a,yes\n2,b,no\n3,a,yes\n4,b,no\n5,a,yes\n6,b,no\n";
        let table = CsvLoader::new(IngestOptions {
            target_column: "adopted".into(),
            ..Default::default()
        })
        .load_bytes(csv.as_bytes())
        .unwrap();
        let prep = Preprocessor::new(PreprocessConfig {
            target_column: "adopted".into(),
            ..Default::default()
        })
        .prepare(&table)
        .unwrap();
        let outcome = Trainer::new(ForestParams { n_trees: 3, ..Default::default() })
            .train(&prep.split)
            .unwrap();
        let model = TrainedModel::from_outcome(outcome, prep.encoding, None);
        let preds = Predictor::new(&model).predict_table(&table).unwrap();

        let mut store = SqliteStore::open_in_memory().unwrap();
        store.save_trained_model(&model, &preds).unwrap();
        (store, model.id().to_string())
    }

    #[tokio::test]
    async fn test_insight_is_stored_against_current_model() {
        let (store, model_id) = store_with_model();
        let use_case = InsightUseCase::new(FixedService(Ok("Insights:\n1. x".into())));

        let insight = use_case.execute(&store, None).await.unwrap();
        assert_eq!(insight.model_id, model_id);
        assert_eq!(insight.category, DEFAULT_CATEGORY);
        assert!(insight.id.is_some());
        assert_eq!(store.insights(Some(&model_id), None).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_service_stores_nothing() {
        let (store, model_id) = store_with_model();
        let use_case = InsightUseCase::new(FixedService(Err(PipelineError::unavailable("down"))));

        let summary = store.current_summary().unwrap().unwrap();
        let err     = use_case.generate(&store, &summary, None).await.unwrap_err();

        assert!(matches!(err, PipelineError::SuggestionUnavailable(_)));
        assert!(store.insights(Some(&model_id), None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_model_is_an_error() {
        let store    = SqliteStore::open_in_memory().unwrap();
        let use_case = InsightUseCase::new(FixedService(Ok("unused".into())));
        assert!(use_case.execute(&store, None).await.is_err());
    }

    #[test]
    fn test_prompt_mentions_model_facts() {
        let summary = ModelSummary {
            id:                  "m1".into(),
            target_column:       "adopted".into(),
            features:            vec!["age".into()],
            classes:             vec!["no".into(), "yes".into()],
            accuracy:            0.75,
            cv_accuracy:         Some(0.7),
            feature_importances: vec![FeatureImportance { feature: "age".into(), importance: 1.0 }],
            n_train:             8,
            n_eval:              2,
            created_at:          Utc::now(),
        };
        let prompt = build_prompt(&summary, &[("yes".into(), 6), ("no".into(), 4)], None);

        assert!(prompt.contains("'adopted'"));
        assert!(prompt.contains("75.0%"));
        assert!(prompt.contains("70.0%"));
        assert!(prompt.contains("age (1.000)"));
        assert!(prompt.contains("yes: 6, no: 4"));
        assert!(prompt.contains("\"Insights:\""));
    }
}
