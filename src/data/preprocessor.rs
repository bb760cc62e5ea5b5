// ============================================================
// Layer 4 — Preprocessor
// ============================================================
// Turns a validated Table into numeric train/evaluation splits.
//
// Steps (applied in order):
//   1. Drop rows whose target value is missing
//   2. Collect the classes (sorted distinct target values);
//      fewer than two classes is a SchemaError
//   3. Pick feature columns: everything except the target and
//      the excluded columns
//   4. Fit fill values on the kept rows:
//        numeric     → column mean
//        categorical → column mode (ties: smallest value)
//   5. Encode categorical values as their index in the sorted
//      category list; add "<column>_count" features for list
//      columns ("a, b, c" → 3, "None" → 0)
//   6. Stratified 80/20 split with a fixed seed
//
// The fitted FeatureEncoding is serialisable and travels with
// the trained model so later rows are encoded identically.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::dataset::{Dataset, Split};
use crate::data::splitter::stratified_split;
use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::schema::{ColumnType, Schema};
use crate::domain::table::{Cell, Table};

/// Placeholder category for a column with no values at all
const MISSING_CATEGORY: &str = "missing";

// ─── Configuration ───────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    pub target_column:       String,
    pub categorical_columns: Vec<String>,
    /// Identifier-like columns never used as features
    pub exclude_columns:     Vec<String>,
    /// Comma-separated list columns that also get a count feature
    pub list_count_columns:  Vec<String>,
    pub train_fraction:      f64,
    pub seed:                u64,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            target_column:       String::new(),
            categorical_columns: Vec::new(),
            exclude_columns:     Vec::new(),
            list_count_columns:  Vec::new(),
            train_fraction:      0.8,
            seed:                42,
        }
    }
}

// ─── Feature encoding ─────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeatureKind {
    Numeric     { fill: f64 },
    Categorical { categories: Vec<String>, fill: String },
    ListCount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub name:          String,
    pub source_column: String,
    pub kind:          FeatureKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEncoding {
    pub target_column: String,
    pub features:      Vec<FeatureSpec>,
    /// Sorted distinct target values; a label's class index is its position
    pub classes:       Vec<String>,
}

impl FeatureEncoding {
    pub fn feature_names(&self) -> Vec<String> {
        self.features.iter().map(|f| f.name.clone()).collect()
    }

    pub fn class_index(&self, label: &str) -> Option<usize> {
        self.classes.binary_search_by(|c| c.as_str().cmp(label)).ok()
    }

    pub fn class_label(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }

    /// Column positions of every feature's source in `schema`
    pub fn resolve(&self, schema: &Schema) -> PipelineResult<Vec<usize>> {
        self.features
            .iter()
            .map(|f| {
                schema.index_of(&f.source_column).ok_or_else(|| {
                    PipelineError::schema(format!(
                        "column '{}' required by the model is missing",
                        f.source_column
                    ))
                })
            })
            .collect()
    }

    /// Encode one row; `columns` comes from `resolve`
    pub fn encode_row(&self, columns: &[usize], row: &[Cell]) -> Vec<f64> {
        self.features
            .iter()
            .zip(columns.iter())
            .map(|(spec, &col)| encode_cell(&spec.kind, &row[col]))
            .collect()
    }

    /// Encode every row of a table
    pub fn encode_table(&self, table: &Table) -> PipelineResult<Vec<Vec<f64>>> {
        let columns = self.resolve(&table.schema)?;
        Ok(table.rows.iter().map(|r| self.encode_row(&columns, r)).collect())
    }
}

fn encode_cell(kind: &FeatureKind, cell: &Cell) -> f64 {
    match kind {
        FeatureKind::Numeric { fill } => match cell {
            Cell::Number(v) => *v,
            Cell::Text(s)   => s.parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(*fill),
            Cell::Missing   => *fill,
        },
        FeatureKind::Categorical { categories, fill } => {
            let value = cell.to_raw().unwrap_or_else(|| fill.clone());
            // Unseen categories share the code one past the last known one
            categories
                .binary_search(&value)
                .unwrap_or(categories.len()) as f64
        }
        FeatureKind::ListCount => count_list_items(cell) as f64,
    }
}

/// "ChatGPT, Grammarly" → 2, "None" / missing → 0
pub fn count_list_items(cell: &Cell) -> usize {
    match cell.to_raw() {
        Some(raw) if !raw.trim().eq_ignore_ascii_case("none") => raw
            .split(',')
            .filter(|item| !item.trim().is_empty())
            .count(),
        _ => 0,
    }
}

// ─── Output ───────────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub encoding:     FeatureEncoding,
    /// Every kept row, encoded
    pub dataset:      Dataset,
    pub split:        Split,
    /// Rows dropped because their target was missing
    pub dropped_rows: usize,
}

// ─── Preprocessor ────────────────────────────────────────────────────────────
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Fit fill values and encoders on `table`, encode it and split it.
    pub fn prepare(&self, table: &Table) -> PipelineResult<PreparedData> {
        let cfg    = &self.config;
        let schema = &table.schema;

        let target_idx = schema.index_of(&cfg.target_column).ok_or_else(|| {
            PipelineError::schema(format!("target column '{}' not found", cfg.target_column))
        })?;

        // ── Step 1: keep rows with a label ────────────────────────────────────
        let kept: Vec<usize> = (0..table.row_count())
            .filter(|&i| !table.rows[i][target_idx].is_missing())
            .collect();
        let dropped_rows = table.row_count() - kept.len();
        if dropped_rows > 0 {
            tracing::warn!("Dropped {} rows with a missing '{}' value", dropped_rows, cfg.target_column);
        }

        // ── Step 2: classes ───────────────────────────────────────────────────
        let mut classes: Vec<String> = kept
            .iter()
            .filter_map(|&i| table.rows[i][target_idx].to_raw())
            .collect();
        classes.sort();
        classes.dedup();

        if classes.len() < 2 {
            return Err(PipelineError::schema(format!(
                "target column '{}' has {} distinct value(s); classification needs at least 2",
                cfg.target_column,
                classes.len()
            )));
        }

        // ── Steps 3-4: fit feature specs ──────────────────────────────────────
        let features = self.fit_features(table, &kept, target_idx)?;
        if features.is_empty() {
            return Err(PipelineError::schema("no feature columns remain after exclusions"));
        }

        let encoding = FeatureEncoding {
            target_column: cfg.target_column.clone(),
            features,
            classes,
        };

        // ── Step 5: encode ────────────────────────────────────────────────────
        let columns = encoding.resolve(schema)?;
        let mut matrix = Vec::with_capacity(kept.len());
        let mut labels = Vec::with_capacity(kept.len());
        for &i in &kept {
            let row   = &table.rows[i];
            let label = row[target_idx].to_raw().unwrap_or_default();
            let class = encoding.class_index(&label).ok_or_else(|| {
                PipelineError::schema(format!("unexpected label '{label}'"))
            })?;
            matrix.push(encoding.encode_row(&columns, row));
            labels.push(class);
        }

        let dataset = Dataset::new(
            matrix,
            labels,
            kept,
            encoding.feature_names(),
            encoding.classes.len(),
        );

        // ── Step 6: stratified, seeded split ──────────────────────────────────
        let (train_pos, eval_pos) = stratified_split(
            &dataset.labels,
            dataset.n_classes,
            cfg.train_fraction,
            cfg.seed,
        );
        let split = Split {
            train: dataset.subset(&train_pos),
            eval:  dataset.subset(&eval_pos),
        };

        tracing::info!(
            "Prepared {} samples, {} features, {} classes ({} train / {} eval)",
            dataset.n_samples(),
            dataset.n_features(),
            dataset.n_classes,
            split.train.n_samples(),
            split.eval.n_samples(),
        );

        Ok(PreparedData { encoding, dataset, split, dropped_rows })
    }

    fn fit_features(
        &self,
        table:      &Table,
        kept:       &[usize],
        target_idx: usize,
    ) -> PipelineResult<Vec<FeatureSpec>> {
        let cfg       = &self.config;
        let mut specs = Vec::new();

        for (j, column) in table.schema.columns().iter().enumerate() {
            if j == target_idx || cfg.exclude_columns.contains(&column.name) {
                continue;
            }

            let cells = kept.iter().map(|&i| &table.rows[i][j]);
            let categorical = column.column_type == ColumnType::Categorical
                || cfg.categorical_columns.contains(&column.name);

            let kind = if categorical {
                let values: Vec<String> = cells.filter_map(Cell::to_raw).collect();
                let fill = mode(&values).unwrap_or_else(|| MISSING_CATEGORY.to_string());
                let mut categories = values;
                categories.push(fill.clone());
                categories.sort();
                categories.dedup();
                FeatureKind::Categorical { categories, fill }
            } else {
                let values: Vec<f64> = cells.filter_map(Cell::as_number).collect();
                FeatureKind::Numeric { fill: mean(&values).unwrap_or(0.0) }
            };

            specs.push(FeatureSpec {
                name:          column.name.clone(),
                source_column: column.name.clone(),
                kind,
            });
        }

        for column in &cfg.list_count_columns {
            if table.schema.index_of(column).is_none() {
                return Err(PipelineError::schema(format!("list column '{column}' not found")));
            }
            specs.push(FeatureSpec {
                name:          format!("{column}_count"),
                source_column: column.clone(),
                kind:          FeatureKind::ListCount,
            });
        }

        Ok(specs)
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Most frequent value; ties go to the lexicographically smallest
fn mode(values: &[String]) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(v.as_str()).or_insert(0) += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((value, count));
        }
    }
    best.map(|(v, _)| v.to_string())
}
