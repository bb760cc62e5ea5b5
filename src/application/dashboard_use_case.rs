// ============================================================
// Layer 2 — DashboardUseCase
// ============================================================
// Gathers everything the dashboard shows in one read:
//
//   - the current model summary (id, time, accuracy, importances)
//   - how its predictions are distributed over the labels
//   - the latest insights for that model
//   - response statistics of the latest upload
//
// The latest upload is re-read with the current model's target
// (when the upload has that column) and no other column
// requirements, so the dashboard never depends on the flags of
// the command that renders it.
//
// Optionally asks for a fresh insight first. A suggestion outage
// becomes a notice on the dashboard; the rest still renders.

use anyhow::{Context, Result};

use crate::application::insight_use_case::InsightUseCase;
use crate::data::loader::{CsvLoader, IngestOptions};
use crate::data::stats::{survey_stats, SurveyStats};
use crate::domain::errors::PipelineError;
use crate::domain::records::{label_distribution, Insight, ModelSummary, UploadBatch};
use crate::domain::traits::{SuggestionService, TableSource};
use crate::infra::store::{SqliteStore, StoredBatchSource};

/// Insights listed on the dashboard
const RECENT_INSIGHTS: usize = 3;
/// Values shown per categorical column
const TOP_VALUES: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct Dashboard {
    pub model:        Option<ModelSummary>,
    pub distribution: Vec<(String, usize)>,
    pub insights:     Vec<Insight>,
    pub batch:        Option<UploadBatch>,
    pub survey:       Option<SurveyStats>,
    /// Set when a requested insight could not be produced
    pub notice:       Option<String>,
}

pub struct DashboardUseCase<'a> {
    store: &'a SqliteStore,
}

impl<'a> DashboardUseCase<'a> {
    pub fn new(store: &'a SqliteStore) -> Self {
        Self { store }
    }

    /// Read-only dashboard
    pub fn execute(&self) -> Result<Dashboard> {
        let mut dashboard = Dashboard::default();
        let current = self.store.current_summary()?;

        // ── Latest upload ─────────────────────────────────────────────────────
        if let Some(batch) = self.store.latest_batch()? {
            let loader = batch_loader(&batch, current.as_ref());
            match StoredBatchSource::new(self.store, loader).load_table() {
                Ok(table) => dashboard.survey = Some(survey_stats(&table, TOP_VALUES)),
                Err(e) => tracing::warn!("Latest upload cannot be summarised: {e}"),
            }
            dashboard.batch = Some(batch);
        }

        // ── Current model ─────────────────────────────────────────────────────
        if let Some(summary) = current {
            let predictions = self
                .store
                .latest_predictions(&summary.id)
                .context("cannot read predictions")?;
            dashboard.distribution = label_distribution(&predictions);
            dashboard.insights     = self.store.insights(Some(&summary.id), Some(RECENT_INSIGHTS))?;
            dashboard.model        = Some(summary);
        }

        Ok(dashboard)
    }

    /// Dashboard with a freshly requested insight at the top
    pub async fn execute_with_insight<S: SuggestionService>(
        &self,
        insights: &InsightUseCase<S>,
    ) -> Result<Dashboard> {
        let mut dashboard = self.execute()?;

        let Some(summary) = dashboard.model.as_ref() else {
            dashboard.notice = Some("No trained model yet; insights need a model.".to_string());
            return Ok(dashboard);
        };

        match insights.generate(self.store, summary, dashboard.survey.as_ref()).await {
            Ok(insight) => {
                dashboard.insights.insert(0, insight);
                dashboard.insights.truncate(RECENT_INSIGHTS);
            }
            Err(PipelineError::SuggestionUnavailable(reason)) => {
                tracing::warn!("Insight unavailable: {}", reason);
                dashboard.notice = Some(format!("Insights are unavailable right now ({reason})."));
            }
            Err(e) => return Err(e.into()),
        }

        Ok(dashboard)
    }
}

/// Loader for a stored batch: label column only if the batch carries it
fn batch_loader(batch: &UploadBatch, model: Option<&ModelSummary>) -> CsvLoader {
    let target_column = model
        .map(|m| m.target_column.as_str())
        .filter(|t| batch.columns.iter().any(|c| c == t))
        .unwrap_or_default()
        .to_string();
    CsvLoader::new(IngestOptions { target_column, ..Default::default() })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::TrainUseCase;
    use crate::application::upload_use_case::UploadUseCase;
    use crate::data::loader::{CsvSource, IngestOptions};
    use crate::domain::errors::PipelineResult;
    use crate::infra::settings::PipelineSettings;
    use async_trait::async_trait;

    struct Down;

    #[async_trait]
    impl SuggestionService for Down {
        async fn suggest(&self, _prompt: &str) -> PipelineResult<String> {
            Err(PipelineError::unavailable("timed out"))
        }
    }

    struct Echo;

    #[async_trait]
    impl SuggestionService for Echo {
        async fn suggest(&self, _prompt: &str) -> PipelineResult<String> {
            Ok("Insights:\n1. Adoption is high.".into())
        }
    }

    fn loader() -> CsvLoader {
        CsvLoader::new(IngestOptions {
            target_column: "adopted".into(),
            ..Default::default()
        })
    }

    fn trained_store(dir: &std::path::Path) -> SqliteStore {
        let path = dir.join("survey.csv");
        let mut csv = String::from("age,team,adopted\n");
        for i in 0..20 {
            let adopted = if i % 2 == 0 { "yes" } else { "no" };
            csv.push_str(&format!("{},{},{}\n", 20 + i, ["a", "b"][i % 2], adopted));
        }
        std::fs::write(&path, csv).unwrap();

        let mut store = SqliteStore::open_in_memory().unwrap();
        UploadUseCase::new(&mut store)
            .execute(&CsvSource::new(&path, loader()))
            .unwrap();

        let pipeline = PipelineSettings {
            target_column:   "adopted".into(),
            exclude_columns: Vec::new(),
            n_trees:         5,
            ..Default::default()
        };
        TrainUseCase::new(pipeline, dir.join("reports"))
            .execute_on_latest_upload(&mut store, loader())
            .unwrap();
        store
    }

    #[test]
    fn test_empty_store_renders_empty_dashboard() {
        let store     = SqliteStore::open_in_memory().unwrap();
        let dashboard = DashboardUseCase::new(&store).execute().unwrap();
        assert!(dashboard.model.is_none());
        assert!(dashboard.batch.is_none());
        assert!(dashboard.distribution.is_empty());
    }

    #[test]
    fn test_dashboard_shows_current_model() {
        let dir       = tempfile::tempdir().unwrap();
        let store     = trained_store(dir.path());
        let dashboard = DashboardUseCase::new(&store).execute().unwrap();

        assert!(dashboard.model.is_some());
        assert_eq!(dashboard.distribution.iter().map(|(_, n)| n).sum::<usize>(), 20);
        assert_eq!(dashboard.survey.unwrap().total_responses, 20);
    }

    #[test]
    fn test_dashboard_ignores_default_target_setting() {
        // Trained on "adopted"; the default pipeline settings name another target
        let dir       = tempfile::tempdir().unwrap();
        let store     = trained_store(dir.path());
        assert_ne!(PipelineSettings::default().target_column, "adopted");

        let dashboard = DashboardUseCase::new(&store).execute().unwrap();
        let survey    = dashboard.survey.expect("survey stats");
        assert_eq!(survey.total_responses, 20);
        assert_eq!(dashboard.model.unwrap().target_column, "adopted");
    }

    #[test]
    fn test_upload_without_model_target_is_still_summarised() {
        let dir       = tempfile::tempdir().unwrap();
        let mut store = trained_store(dir.path());
        let path      = dir.path().join("next.csv");
        std::fs::write(&path, "age,team
30,a
40,b
").unwrap();
        let unlabelled = CsvLoader::new(IngestOptions::default());
        UploadUseCase::new(&mut store)
            .execute(&CsvSource::new(&path, unlabelled))
            .unwrap();

        let dashboard = DashboardUseCase::new(&store).execute().unwrap();
        assert_eq!(dashboard.survey.unwrap().total_responses, 2);
        assert_eq!(dashboard.batch.unwrap().row_count, 2);
    }

    #[tokio::test]
    async fn test_suggestion_outage_becomes_notice() {
        let dir   = tempfile::tempdir().unwrap();
        let store = trained_store(dir.path());

        let dashboard = DashboardUseCase::new(&store)
            .execute_with_insight(&InsightUseCase::new(Down))
            .await
            .unwrap();

        assert!(dashboard.model.is_some());
        assert!(dashboard.notice.unwrap().contains("timed out"));
        assert!(dashboard.insights.is_empty());
    }

    #[tokio::test]
    async fn test_fresh_insight_listed_first() {
        let dir   = tempfile::tempdir().unwrap();
        let store = trained_store(dir.path());

        let dashboard = DashboardUseCase::new(&store)
            .execute_with_insight(&InsightUseCase::new(Echo))
            .await
            .unwrap();

        assert!(dashboard.notice.is_none());
        assert_eq!(dashboard.insights.len(), 1);
        assert!(dashboard.insights[0].text.starts_with("Insights:"));
    }
}
