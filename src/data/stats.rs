// ============================================================
// Layer 4 — Survey Statistics
// ============================================================
// Descriptive numbers for an uploaded table: response count,
// missing cells, numeric ranges and the most common values of
// categorical columns. The CLI turns the categorical counts into
// bar charts.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::schema::ColumnType;
use crate::domain::table::{Cell, Table};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ColumnSummary {
    Numeric {
        mean: Option<f64>,
        min:  Option<f64>,
        max:  Option<f64>,
    },
    Categorical {
        distinct: usize,
        /// Most common values, highest count first
        top:      Vec<(String, usize)>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnStats {
    pub name:    String,
    pub missing: usize,
    pub summary: ColumnSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurveyStats {
    pub total_responses: usize,
    pub columns:         Vec<ColumnStats>,
}

impl SurveyStats {
    pub fn column(&self, name: &str) -> Option<&ColumnStats> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Summarise every column of `table`, keeping `top_n` values per
/// categorical column.
pub fn survey_stats(table: &Table, top_n: usize) -> SurveyStats {
    let columns = table
        .schema
        .columns()
        .iter()
        .enumerate()
        .map(|(j, spec)| {
            let missing = table.column(j).filter(|c| c.is_missing()).count();
            let summary = match spec.column_type {
                ColumnType::Numeric     => numeric_summary(table.column(j)),
                ColumnType::Categorical => categorical_summary(table.column(j), top_n),
            };
            ColumnStats { name: spec.name.clone(), missing, summary }
        })
        .collect();

    SurveyStats { total_responses: table.row_count(), columns }
}

fn numeric_summary<'a>(cells: impl Iterator<Item = &'a Cell>) -> ColumnSummary {
    let values: Vec<f64> = cells.filter_map(Cell::as_number).collect();
    if values.is_empty() {
        return ColumnSummary::Numeric { mean: None, min: None, max: None };
    }

    let sum = values.iter().sum::<f64>();
    ColumnSummary::Numeric {
        mean: Some(sum / values.len() as f64),
        min:  values.iter().copied().reduce(f64::min),
        max:  values.iter().copied().reduce(f64::max),
    }
}

fn categorical_summary<'a>(cells: impl Iterator<Item = &'a Cell>, top_n: usize) -> ColumnSummary {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for value in cells.filter_map(Cell::to_raw) {
        *counts.entry(value).or_insert(0) += 1;
    }

    let distinct = counts.len();
    let mut top: Vec<(String, usize)> = counts.into_iter().collect();
    top.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top.truncate(top_n);

    ColumnSummary::Categorical { distinct, top }
}
