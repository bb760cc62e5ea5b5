// ============================================================
// Layer 6 — Settings
// ============================================================
// Runtime configuration, resolved in three steps:
//
//   1. built-in defaults
//   2. a TOML file (`--config <path>`, else ./survey-insights.toml
//      when it exists)
//   3. environment overrides:
//        DATABASE_URL          sqlite file, optional sqlite:// prefix
//        OPENROUTER_API_KEY    credential for the suggestion service
//        OPENROUTER_MODEL_ID   chat model identifier
//        OPENROUTER_BASE_URL   API root (tests point this at a mock)
//
// Example survey-insights.toml:
//
//   database_path = "data/survey.db"
//
//   [pipeline]
//   target_column       = "adopted_ai"
//   categorical_columns = ["department", "role"]
//   exclude_columns     = ["email"]
//   list_count_columns  = ["tools_used", "challenges"]
//
//   [suggestion]
//   timeout_secs = 20
//   max_retries  = 1

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::data::loader::IngestOptions;
use crate::data::preprocessor::PreprocessConfig;
use crate::ml::random_forest::ForestParams;

pub const DEFAULT_CONFIG_FILE: &str = "survey-insights.toml";

/// Suggestion service connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestionSettings {
    pub api_key:        Option<String>,
    pub base_url:       String,
    pub model:          String,
    pub timeout_secs:   u64,
    pub max_retries:    u32,
    pub retry_delay_ms: u64,
    pub temperature:    f32,
    pub max_tokens:     u32,
}

impl Default for SuggestionSettings {
    fn default() -> Self {
        Self {
            api_key:        None,
            base_url:       "https://openrouter.ai/api/v1".to_string(),
            model:          "anthropic/claude-3-opus:beta".to_string(),
            timeout_secs:   30,
            max_retries:    1,
            retry_delay_ms: 500,
            temperature:    0.7,
            max_tokens:     1000,
        }
    }
}

/// Column roles and model hyper-parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub target_column:       String,
    pub categorical_columns: Vec<String>,
    pub exclude_columns:     Vec<String>,
    pub list_count_columns:  Vec<String>,
    pub train_fraction:      f64,
    pub seed:                u64,
    pub n_trees:             usize,
    pub max_depth:           Option<usize>,
    pub min_samples_split:   usize,
    pub min_samples_leaf:    usize,
    /// 0 or 1 disables cross-validation
    pub cv_folds:            usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            target_column:       "adopted_ai".to_string(),
            categorical_columns: Vec::new(),
            exclude_columns:     vec!["email".to_string()],
            list_count_columns:  Vec::new(),
            train_fraction:      0.8,
            seed:                42,
            n_trees:             100,
            max_depth:           Some(10),
            min_samples_split:   2,
            min_samples_leaf:    1,
            cv_folds:            5,
        }
    }
}

impl PipelineSettings {
    /// Columns ingestion must find besides the target.
    /// Excluded columns are optional: dropping an absent column is a no-op.
    pub fn ingest_options(&self) -> IngestOptions {
        let mut required: Vec<String> = self
            .categorical_columns
            .iter()
            .chain(&self.list_count_columns)
            .cloned()
            .collect();
        required.sort();
        required.dedup();

        IngestOptions {
            target_column:       self.target_column.clone(),
            categorical_columns: self.categorical_columns.clone(),
            required_columns:    required,
        }
    }

    pub fn preprocess_config(&self) -> PreprocessConfig {
        PreprocessConfig {
            target_column:       self.target_column.clone(),
            categorical_columns: self.categorical_columns.clone(),
            exclude_columns:     self.exclude_columns.clone(),
            list_count_columns:  self.list_count_columns.clone(),
            train_fraction:      self.train_fraction,
            seed:                self.seed,
        }
    }

    pub fn forest_params(&self) -> ForestParams {
        ForestParams {
            n_trees:           self.n_trees,
            max_depth:         self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf:  self.min_samples_leaf,
            seed:              self.seed,
            ..ForestParams::default()
        }
    }
}

/// Top-level application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database_path: PathBuf,
    /// Run log and backups are written here
    pub reports_dir:   PathBuf,
    pub suggestion:    SuggestionSettings,
    pub pipeline:      PipelineSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/survey_insights.db"),
            reports_dir:   PathBuf::from("reports"),
            suggestion:    SuggestionSettings::default(),
            pipeline:      PipelineSettings::default(),
        }
    }
}

impl Settings {
    /// Load from an explicit file, the default file, or defaults,
    /// then apply the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    tracing::debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                    Self::default()
                }
            }
        };

        settings.apply_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file '{}'", path.display()))?;
        let settings: Settings = toml::from_str(&contents)
            .with_context(|| format!("invalid config file '{}'", path.display()))?;

        tracing::info!("Loaded settings from '{}'", path.display());
        Ok(settings)
    }

    /// Apply environment-style overrides; empty values are ignored
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("DATABASE_URL") {
            let path = url
                .strip_prefix("sqlite://")
                .or_else(|| url.strip_prefix("sqlite:"))
                .unwrap_or(&url);
            self.database_path = PathBuf::from(path);
        }
        if let Some(key) = get("OPENROUTER_API_KEY") {
            self.suggestion.api_key = Some(key);
        }
        if let Some(model) = get("OPENROUTER_MODEL_ID") {
            self.suggestion.model = model;
        }
        if let Some(base) = get("OPENROUTER_BASE_URL") {
            self.suggestion.base_url = base;
        }
    }

    /// Settings as they are safe to print: credential and database location masked
    pub fn masked(&self) -> Settings {
        let mut shown = self.clone();
        shown.suggestion.api_key = self.suggestion.api_key.as_deref().map(mask_secret);
        shown.database_path = PathBuf::from(mask_path(&self.database_path));
        shown
    }
}

/// Keep the first four characters of a secret
pub fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{visible}****")
    }
}

/// Keep only the file name of a database path
pub fn mask_path(path: &Path) -> String {
    match path.file_name().and_then(|n| n.to_str()) {
        Some(name) if path.parent().is_some_and(|p| !p.as_os_str().is_empty()) => {
            format!("****/{name}")
        }
        Some(name) => name.to_string(),
        None => "****".to_string(),
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [pipeline]
            target_column = "uses_ai"
            n_trees = 25
            "#,
        )
        .unwrap();

        assert_eq!(settings.pipeline.target_column, "uses_ai");
        assert_eq!(settings.pipeline.n_trees, 25);
        assert_eq!(settings.pipeline.seed, 42);
        assert_eq!(settings.suggestion.max_retries, 1);
    }

    #[test]
    fn test_environment_overrides() {
        let env: HashMap<&str, &str> = [
            ("DATABASE_URL", "sqlite:///tmp/s.db"),
            ("OPENROUTER_API_KEY", "sk-or-123456"),
            ("OPENROUTER_MODEL_ID", ""),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(settings.database_path, PathBuf::from("/tmp/s.db"));
        assert_eq!(settings.suggestion.api_key.as_deref(), Some("sk-or-123456"));
        // Empty value ignored
        assert_eq!(settings.suggestion.model, SuggestionSettings::default().model);
    }

    #[test]
    fn test_masked_hides_secrets() {
        let mut settings = Settings::default();
        settings.suggestion.api_key = Some("sk-or-abcdef".into());
        settings.database_path = PathBuf::from("/srv/app/survey.db");

        let shown = settings.masked();
        assert_eq!(shown.suggestion.api_key.as_deref(), Some("sk-o****"));
        assert_eq!(shown.database_path, PathBuf::from("****/survey.db"));
        assert_eq!(mask_secret("abc"), "****");
    }

    #[test]
    fn test_ingest_options_require_configured_columns() {
        let pipeline = PipelineSettings {
            categorical_columns: vec!["role".into()],
            list_count_columns:  vec!["tools".into(), "role".into()],
            ..Default::default()
        };
        let opts = pipeline.ingest_options();
        assert_eq!(opts.required_columns, vec!["role", "tools"]);
    }

    #[test]
    fn test_default_exclude_list_is_not_required() {
        let opts = PipelineSettings::default().ingest_options();
        assert!(opts.required_columns.is_empty());
        let table = crate::data::loader::CsvLoader::new(IngestOptions {
            target_column: "adopted".into(),
            ..opts
        })
        .load_bytes(b"age,department,adopted\n31,IT,yes\n")
        .unwrap();
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn test_load_explicit_file() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.toml");
        std::fs::write(&path, "reports_dir = \"out\"\n").unwrap();

        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.reports_dir, PathBuf::from("out"));
        assert!(Settings::from_file(&dir.path().join("missing.toml")).is_err());
    }
}
