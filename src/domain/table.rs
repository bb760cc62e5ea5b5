// ============================================================
// Layer 3 — Typed Table
// ============================================================
// The output of ingestion: a schema descriptor plus a
// rectangular grid of cells. Each cell already carries the type
// declared for its column, so the preprocessor can work on
// numbers and labels directly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::schema::Schema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Number(f64),
    Text(String),
    Missing,
}

impl Cell {
    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Raw textual form, `None` for missing cells
    pub fn to_raw(&self) -> Option<String> {
        match self {
            Cell::Number(v) => Some(v.to_string()),
            Cell::Text(s)   => Some(s.clone()),
            Cell::Missing   => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub schema: Schema,
    pub rows:   Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(schema: Schema, rows: Vec<Vec<Cell>>) -> Self {
        Self { schema, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.schema.len()
    }

    /// All cells of one column, in row order
    pub fn column(&self, index: usize) -> impl Iterator<Item = &Cell> {
        self.rows.iter().map(move |r| &r[index])
    }

    /// One row as column name → raw value, used when persisting surveys
    pub fn row_map(&self, row: usize) -> BTreeMap<String, Option<String>> {
        self.schema
            .names()
            .zip(self.rows[row].iter())
            .map(|(name, cell)| (name.to_string(), cell.to_raw()))
            .collect()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schema::{ColumnSpec, ColumnType};

    #[test]
    fn test_row_map_uses_raw_values() {
        let schema = Schema::new(vec![
            ColumnSpec { name: "age".into(),  column_type: ColumnType::Numeric },
            ColumnSpec { name: "dept".into(), column_type: ColumnType::Categorical },
        ]);
        let table = Table::new(
            schema,
            vec![vec![Cell::Number(31.0), Cell::Missing]],
        );

        let map = table.row_map(0);
        assert_eq!(map["age"], Some("31".to_string()));
        assert_eq!(map["dept"], None);
    }

    #[test]
    fn test_column_iterates_rows() {
        let schema = Schema::new(vec![
            ColumnSpec { name: "x".into(), column_type: ColumnType::Numeric },
        ]);
        let table = Table::new(schema, vec![vec![Cell::Number(1.0)], vec![Cell::Number(2.0)]]);
        let values: Vec<f64> = table.column(0).filter_map(Cell::as_number).collect();
        assert_eq!(values, vec![1.0, 2.0]);
    }
}
