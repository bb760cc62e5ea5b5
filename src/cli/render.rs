// ============================================================
// Layer 1 — Text Rendering
// ============================================================
// Formats use-case results for the terminal. Every function
// returns a String so the output can be tested; the caller
// decides where it is printed.

use std::fmt::Write;

use crate::application::admin_use_case::HistoryEntry;
use crate::application::dashboard_use_case::Dashboard;
use crate::application::predict_use_case::PredictReport;
use crate::application::train_use_case::TrainReport;
use crate::application::upload_use_case::UploadReport;
use crate::data::stats::{ColumnSummary, SurveyStats};
use crate::domain::records::{Insight, ModelSummary};

const BAR_WIDTH: usize = 30;
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Horizontal bar proportional to `value / max`
pub fn bar(value: f64, max: f64, width: usize) -> String {
    if max <= 0.0 || !value.is_finite() {
        return String::new();
    }
    let filled = ((value / max).clamp(0.0, 1.0) * width as f64).round() as usize;
    "█".repeat(filled)
}

fn label_width<'a>(labels: impl Iterator<Item = &'a str>) -> usize {
    labels.map(|l| l.chars().count()).max().unwrap_or(0)
}

fn counts_chart(out: &mut String, rows: &[(String, usize)]) {
    let max   = rows.iter().map(|(_, n)| *n).max().unwrap_or(0) as f64;
    let total = rows.iter().map(|(_, n)| *n).sum::<usize>().max(1) as f64;
    let width = label_width(rows.iter().map(|(l, _)| l.as_str()));
    for (label, n) in rows {
        let _ = writeln!(
            out,
            "  {label:<width$}  {:<BAR_WIDTH$}  {n} ({:.1}%)",
            bar(*n as f64, max, BAR_WIDTH),
            *n as f64 / total * 100.0
        );
    }
}

fn model_block(out: &mut String, summary: &ModelSummary) {
    let _ = writeln!(out, "Model      {}", summary.id);
    let _ = writeln!(out, "Trained    {}", summary.created_at.format(TIME_FORMAT));
    let _ = writeln!(out, "Target     {} [{}]", summary.target_column, summary.classes.join(", "));
    let _ = writeln!(
        out,
        "Accuracy   {:.1}% on {} held-out rows ({} training rows)",
        summary.accuracy * 100.0,
        summary.n_eval,
        summary.n_train
    );
    match summary.cv_accuracy {
        Some(cv) => { let _ = writeln!(out, "CV score   {:.1}%", cv * 100.0); }
        None     => { let _ = writeln!(out, "CV score   skipped"); }
    }

    let top   = summary.top_features(10);
    let max   = top.first().map(|f| f.importance).unwrap_or(0.0);
    let width = label_width(top.iter().map(|f| f.feature.as_str()));
    let _ = writeln!(out, "\nFeature importance");
    for f in top {
        let _ = writeln!(
            out,
            "  {:<width$}  {:<BAR_WIDTH$}  {:.3}",
            f.feature,
            bar(f.importance, max, BAR_WIDTH),
            f.importance
        );
    }
}

fn survey_block(out: &mut String, stats: &SurveyStats) {
    let _ = writeln!(out, "Responses  {}", stats.total_responses);
    for column in &stats.columns {
        match &column.summary {
            ColumnSummary::Numeric { mean: Some(mean), min: Some(min), max: Some(max) } => {
                let _ = writeln!(
                    out,
                    "  {} (numeric): mean {:.2}, range {}..{}, {} missing",
                    column.name, mean, min, max, column.missing
                );
            }
            ColumnSummary::Numeric { .. } => {
                let _ = writeln!(out, "  {} (numeric): no values", column.name);
            }
            ColumnSummary::Categorical { distinct, top } => {
                let _ = writeln!(
                    out,
                    "  {} ({} distinct, {} missing)",
                    column.name, distinct, column.missing
                );
                counts_chart(out, top);
            }
        }
    }
}

fn insight_block(out: &mut String, insight: &Insight) {
    let _ = writeln!(
        out,
        "[{}] {} ({})",
        insight.category,
        insight.created_at.format(TIME_FORMAT),
        insight.id.map_or_else(|| "unsaved".to_string(), |id| format!("#{id}"))
    );
    for line in insight.text.lines() {
        let _ = writeln!(out, "  {line}");
    }
}

pub fn render_upload(report: &UploadReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Stored {} rows from '{}' as batch {}\n",
        report.batch.row_count, report.batch.source, report.batch.id
    );
    survey_block(&mut out, &report.stats);
    out
}

pub fn render_train(report: &TrainReport) -> String {
    let mut out = String::new();
    model_block(&mut out, &report.summary);
    if let Some(cv) = &report.cross_validation {
        let folds: Vec<String> = cv.fold_accuracies.iter().map(|a| format!("{a:.3}")).collect();
        let _ = writeln!(out, "\nCV folds   [{}] std {:.3}", folds.join(", "), cv.std_dev);
    }
    if report.dropped_rows > 0 {
        let _ = writeln!(out, "\n{} rows without a label were left out", report.dropped_rows);
    }
    let _ = writeln!(out, "\nPredictions ({} rows)", report.n_predictions);
    counts_chart(&mut out, &report.distribution);
    out
}

pub fn render_predict(report: &PredictReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Scored {} rows from '{}' with model {} (run {})\n",
        report.n_predictions, report.source, report.model_id, report.run_id
    );
    counts_chart(&mut out, &report.distribution);
    out
}

pub fn render_insight(insight: &Insight) -> String {
    let mut out = String::new();
    insight_block(&mut out, insight);
    out
}

pub fn render_dashboard(dashboard: &Dashboard) -> String {
    let mut out = String::new();

    if let Some(notice) = &dashboard.notice {
        let _ = writeln!(out, "! {notice}\n");
    }

    match &dashboard.model {
        Some(summary) => {
            let _ = writeln!(out, "== Current model ==");
            model_block(&mut out, summary);
            let _ = writeln!(out, "\nPredicted labels");
            counts_chart(&mut out, &dashboard.distribution);
        }
        None => {
            let _ = writeln!(out, "No trained model yet. Run `train` after `upload`.");
        }
    }

    if !dashboard.insights.is_empty() {
        let _ = writeln!(out, "\n== Insights ==");
        for insight in &dashboard.insights {
            insight_block(&mut out, insight);
        }
    }

    if let (Some(batch), Some(stats)) = (&dashboard.batch, &dashboard.survey) {
        let _ = writeln!(
            out,
            "\n== Latest upload: {} ({}) ==",
            batch.source,
            batch.created_at.format(TIME_FORMAT)
        );
        survey_block(&mut out, stats);
    }

    out
}

pub fn render_history(entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return "No model runs stored yet.\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "  {:<36}  {:<23}  {:>8}  {:>8}  target", "model", "trained", "accuracy", "cv");
    for entry in entries {
        let s = &entry.summary;
        let _ = writeln!(
            out,
            "{} {:<36}  {:<23}  {:>7.1}%  {:>8}  {}",
            if entry.is_current { "*" } else { " " },
            s.id,
            s.created_at.format(TIME_FORMAT).to_string(),
            s.accuracy * 100.0,
            s.cv_accuracy.map_or_else(|| "-".to_string(), |c| format!("{:.1}%", c * 100.0)),
            s.target_column
        );
    }
    out
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::records::FeatureImportance;
    use chrono::Utc;

    fn summary() -> ModelSummary {
        ModelSummary {
            id:                  "m-1".into(),
            target_column:       "adopted".into(),
            features:            vec!["age".into(), "team".into()],
            classes:             vec!["no".into(), "yes".into()],
            accuracy:            0.8,
            cv_accuracy:         None,
            feature_importances: vec![
                FeatureImportance { feature: "age".into(),  importance: 0.25 },
                FeatureImportance { feature: "team".into(), importance: 0.75 },
            ],
            n_train:             8,
            n_eval:              2,
            created_at:          Utc::now(),
        }
    }

    #[test]
    fn test_predict_report_lists_every_label() {
        let report = PredictReport {
            model_id:      "m-1".into(),
            run_id:        "r-1".into(),
            source:        "new.csv".into(),
            n_predictions: 3,
            distribution:  vec![("no".into(), 1), ("yes".into(), 2)],
        };
        let text = render_predict(&report);
        assert!(text.contains("Scored 3 rows from 'new.csv' with model m-1"));
        assert!(text.contains("yes"));
        assert!(text.contains("2 (66.7%)"));
    }

    #[test]
    fn test_bar_scales_to_width() {
        assert_eq!(bar(5.0, 10.0, 10).chars().count(), 5);
        assert_eq!(bar(10.0, 10.0, 4), "████");
        assert_eq!(bar(1.0, 0.0, 10), "");
    }

    #[test]
    fn test_dashboard_without_model() {
        let text = render_dashboard(&Dashboard::default());
        assert!(text.contains("No trained model yet"));
    }

    #[test]
    fn test_dashboard_shows_notice_and_model() {
        let dashboard = Dashboard {
            model:        Some(summary()),
            distribution: vec![("yes".into(), 3), ("no".into(), 1)],
            notice:       Some("Insights are unavailable right now (timeout).".into()),
            ..Default::default()
        };
        let text = render_dashboard(&dashboard);

        assert!(text.starts_with("! Insights are unavailable"));
        assert!(text.contains("Accuracy   80.0%"));
        assert!(text.contains("CV score   skipped"));
        // Most important feature first
        assert!(text.find("team").unwrap() < text.find("age").unwrap());
        assert!(text.contains("3 (75.0%)"));
    }

    #[test]
    fn test_history_marks_current() {
        let entries = vec![HistoryEntry { summary: summary(), is_current: true }];
        let text    = render_history(&entries);
        assert!(text.lines().nth(1).unwrap().starts_with("* m-1"));
        assert!(render_history(&[]).contains("No model runs"));
    }
}
