// ============================================================
// Layer 3 — Schema Descriptor
// ============================================================
// Uploaded CSVs have a dynamic schema. Ingestion inspects the
// data once and records the declared type of every column here;
// downstream layers read the descriptor and never re-infer.
//
//   Numeric     — every present value parsed as a finite f64
//   Categorical — anything else, plus columns forced by config
//                 and the target column (class labels)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Numeric,
    Categorical,
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnType::Numeric     => write!(f, "numeric"),
            ColumnType::Categorical => write!(f, "categorical"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name:        String,
    pub column_type: ColumnType,
}

/// Ordered list of columns exactly as they appeared in the header row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<ColumnSpec>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.column_type)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Schema {
        Schema::new(vec![
            ColumnSpec { name: "age".into(),        column_type: ColumnType::Numeric },
            ColumnSpec { name: "department".into(), column_type: ColumnType::Categorical },
        ])
    }

    #[test]
    fn test_lookup_by_name() {
        let s = sample();
        assert_eq!(s.index_of("department"), Some(1));
        assert_eq!(s.column_type("age"), Some(ColumnType::Numeric));
        assert_eq!(s.index_of("missing"), None);
    }

    #[test]
    fn test_names_keep_header_order() {
        let s = sample();
        let names: Vec<&str> = s.names().collect();
        assert_eq!(names, vec!["age", "department"]);
    }
}
