// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the subcommands and their flags:
//
//   upload     — ingest a survey CSV and store it
//   train      — train a classifier on the latest upload
//   predict    — score the latest upload (or a file) with the current model
//   insights   — ask the suggestion service about the current model
//   dashboard  — show the current model, predictions, insights
//   history    — list stored model runs
//   purge      — delete uploaded survey rows
//   backup     — export the database as JSON
//   config     — print settings with secrets masked
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::infra::settings::PipelineSettings;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest a survey CSV and store it as a new upload
    Upload(UploadArgs),

    /// Train a classifier on the latest upload (or on --file)
    Train(TrainArgs),

    /// Score the latest upload (or --file) with the current model
    Predict(PredictArgs),

    /// Request insights about the current model
    Insights(InsightsArgs),

    /// Show the current model, its predictions and insights
    Dashboard(DashboardArgs),

    /// List stored model runs, newest first
    History(HistoryArgs),

    /// Delete every uploaded survey row
    Purge(PurgeArgs),

    /// Export the database to JSON files
    Backup(BackupArgs),

    /// Print the effective settings (secrets masked)
    Config,
}

/// Column roles and forest parameters; each flag overrides the settings file
#[derive(Args, Debug, Default, Clone)]
pub struct PipelineArgs {
    /// Column the classifier predicts
    #[arg(long)]
    pub target: Option<String>,

    /// Columns to treat as categorical even if they look numeric
    #[arg(long, value_delimiter = ',')]
    pub categorical: Vec<String>,

    /// Identifier-like columns never used as features (e.g. email)
    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Comma-separated list columns that get an item-count feature
    #[arg(long, value_delimiter = ',')]
    pub list_count: Vec<String>,

    /// Seed for the split and the forest
    #[arg(long)]
    pub seed: Option<u64>,

    /// Number of trees in the forest
    #[arg(long)]
    pub trees: Option<usize>,

    /// Cross-validation folds (0 disables)
    #[arg(long)]
    pub cv_folds: Option<usize>,
}

impl PipelineArgs {
    /// Apply the flags that were given on top of `settings`
    pub fn apply(&self, settings: &mut PipelineSettings) {
        if let Some(target) = &self.target {
            settings.target_column = target.clone();
        }
        if !self.categorical.is_empty() {
            settings.categorical_columns = self.categorical.clone();
        }
        if !self.exclude.is_empty() {
            settings.exclude_columns = self.exclude.clone();
        }
        if !self.list_count.is_empty() {
            settings.list_count_columns = self.list_count.clone();
        }
        if let Some(seed) = self.seed {
            settings.seed = seed;
        }
        if let Some(trees) = self.trees {
            settings.n_trees = trees;
        }
        if let Some(folds) = self.cv_folds {
            settings.cv_folds = folds;
        }
    }
}

#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Survey CSV file (first row is the header)
    pub file: PathBuf,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Upload this CSV first, then train on it
    #[arg(long)]
    pub file: Option<PathBuf>,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Score this CSV instead of the latest upload; it is not stored as an upload
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct InsightsArgs {
    /// Category stored with the insight
    #[arg(long, default_value = "general")]
    pub category: String,
}

#[derive(Args, Debug)]
pub struct DashboardArgs {
    /// Request a fresh insight before rendering
    #[arg(long)]
    pub with_insights: bool,
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Maximum number of runs to list
    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}

#[derive(Args, Debug)]
pub struct PurgeArgs {
    /// Confirm the deletion
    #[arg(long)]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct BackupArgs {
    /// Directory the backup folder is created in (default: reports dir)
    #[arg(long)]
    pub out: Option<PathBuf>,
}
