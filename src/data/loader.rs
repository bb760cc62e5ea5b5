// ============================================================
// Layer 4 — CSV Ingestion
// ============================================================
// Parses an uploaded byte stream into a typed Table.
//
// Validation performed (once, here, and nowhere else):
//   1. The bytes decode as CSV with a header row       → FormatError
//   2. Header names are non-empty and unique           → FormatError
//   3. Every row has as many fields as the header      → FormatError
//   4. At least one data row exists                    → FormatError
//   5. The target column and every configured column
//      are present                                     → SchemaError
//      (an empty target name means "no label expected",
//      as when scoring new responses)
//
// Type inference (the schema descriptor):
//   - A column is Numeric when every present value parses as a
//     finite f64 and at least one value is present
//   - Otherwise Categorical
//   - Configured categorical columns and the target column are
//     always Categorical
//
// Missing markers: "", "NA", "N/A", "NaN", "null" (any case).
//
// Reference: csv crate documentation
//            Rust Book §9 (Error Handling)

use std::{fs, path::{Path, PathBuf}};
use std::collections::HashSet;

use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::schema::{ColumnSpec, ColumnType, Schema};
use crate::domain::table::{Cell, Table};
use crate::domain::traits::TableSource;

const MISSING_MARKERS: [&str; 4] = ["na", "n/a", "nan", "null"];

/// Which columns ingestion must find and how to type them.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// The field the classifier predicts; empty when no label is expected
    pub target_column:       String,
    /// Columns forced to Categorical even if they look numeric
    pub categorical_columns: Vec<String>,
    /// Extra columns that must exist (excluded / list-count columns)
    pub required_columns:    Vec<String>,
}

/// Loads CSV data and builds a validated Table.
#[derive(Debug, Clone)]
pub struct CsvLoader {
    options: IngestOptions,
}

impl CsvLoader {
    pub fn new(options: IngestOptions) -> Self {
        Self { options }
    }

    /// Read a file from disk and ingest it
    pub fn load_path(&self, path: &Path) -> PipelineResult<Table> {
        let bytes = fs::read(path).map_err(|e| {
            PipelineError::format(format!("cannot read '{}': {e}", path.display()))
        })?;
        self.load_bytes(&bytes)
    }

    /// Parse raw CSV bytes into a typed table
    pub fn load_bytes(&self, bytes: &[u8]) -> PipelineResult<Table> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .flexible(false)
            .from_reader(bytes);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| PipelineError::format(format!("cannot read header row: {e}")))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut raw_rows = Vec::new();
        for (i, record) in reader.records().enumerate() {
            // Line 1 is the header
            let record = record.map_err(|e| {
                PipelineError::format(format!("row {} is not valid CSV: {e}", i + 2))
            })?;
            raw_rows.push(record.iter().map(normalise_raw).collect());
        }

        self.build_table(headers, raw_rows)
    }

    /// Validate a raw grid and attach the schema descriptor.
    ///
    /// Also used to rebuild a table from an upload batch kept in
    /// the database, so the same rules apply to both paths.
    pub fn build_table(
        &self,
        headers:  Vec<String>,
        raw_rows: Vec<Vec<Option<String>>>,
    ) -> PipelineResult<Table> {
        validate_headers(&headers)?;

        if let Some((i, row)) = raw_rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != headers.len())
        {
            return Err(PipelineError::format(format!(
                "row {} has {} fields, expected {}",
                i + 2,
                row.len(),
                headers.len()
            )));
        }

        if raw_rows.is_empty() {
            return Err(PipelineError::format("the upload contains no data rows"));
        }

        self.check_required_columns(&headers)?;

        // ── Declare the type of every column exactly once ─────────────────────
        let columns: Vec<ColumnSpec> = headers
            .iter()
            .enumerate()
            .map(|(j, name)| ColumnSpec {
                name:        name.clone(),
                column_type: self.infer_type(name, raw_rows.iter().map(|r| r[j].as_deref())),
            })
            .collect();

        let rows: Vec<Vec<Cell>> = raw_rows
            .into_iter()
            .map(|raw| {
                raw.into_iter()
                    .zip(columns.iter())
                    .map(|(value, spec)| to_cell(value, spec.column_type))
                    .collect()
            })
            .collect();

        for spec in &columns {
            tracing::debug!("Column '{}' declared {}", spec.name, spec.column_type);
        }
        tracing::info!("Ingested {} rows x {} columns", rows.len(), columns.len());

        Ok(Table::new(Schema::new(columns), rows))
    }

    fn check_required_columns(&self, headers: &[String]) -> PipelineResult<()> {
        let present: HashSet<&str> = headers.iter().map(String::as_str).collect();

        let target = self.options.target_column.as_str();
        if !target.is_empty() && !present.contains(target) {
            return Err(PipelineError::schema(format!(
                "target column '{}' not found (columns: {})",
                self.options.target_column,
                headers.join(", ")
            )));
        }

        let missing: Vec<&str> = self
            .options
            .categorical_columns
            .iter()
            .chain(self.options.required_columns.iter())
            .map(String::as_str)
            .filter(|c| !present.contains(c))
            .collect();

        if !missing.is_empty() {
            return Err(PipelineError::schema(format!(
                "configured columns not found: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }

    fn infer_type<'a>(
        &self,
        name:   &str,
        values: impl Iterator<Item = Option<&'a str>>,
    ) -> ColumnType {
        if name == self.options.target_column
            || self.options.categorical_columns.iter().any(|c| c == name)
        {
            return ColumnType::Categorical;
        }

        let mut seen_value = false;
        for value in values.flatten() {
            seen_value = true;
            match value.parse::<f64>() {
                Ok(v) if v.is_finite() => {}
                _ => return ColumnType::Categorical,
            }
        }

        if seen_value { ColumnType::Numeric } else { ColumnType::Categorical }
    }
}

fn validate_headers(headers: &[String]) -> PipelineResult<()> {
    if headers.is_empty() {
        return Err(PipelineError::format("the upload has no header row"));
    }

    let mut seen = HashSet::new();
    for (j, name) in headers.iter().enumerate() {
        if name.is_empty() {
            return Err(PipelineError::format(format!("column {} has an empty name", j + 1)));
        }
        if !seen.insert(name.as_str()) {
            return Err(PipelineError::format(format!("duplicate column name '{name}'")));
        }
    }
    Ok(())
}

/// Trimmed raw value, `None` when the cell is a missing marker
fn normalise_raw(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || MISSING_MARKERS.iter().any(|m| value.eq_ignore_ascii_case(m)) {
        None
    } else {
        Some(value.to_string())
    }
}

fn to_cell(value: Option<String>, column_type: ColumnType) -> Cell {
    let Some(value) = value.and_then(|v| normalise_raw(&v)) else {
        return Cell::Missing;
    };

    match column_type {
        // Inference guaranteed the parse succeeds for Numeric columns
        ColumnType::Numeric => value.parse::<f64>().map(Cell::Number).unwrap_or(Cell::Missing),
        ColumnType::Categorical => Cell::Text(value),
    }
}

// ─── CsvSource ────────────────────────────────────────────────────────────────
/// A CSV file on disk, ingested on demand.
pub struct CsvSource {
    path:   PathBuf,
    loader: CsvLoader,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>, loader: CsvLoader) -> Self {
        Self { path: path.into(), loader }
    }
}

impl TableSource for CsvSource {
    fn describe(&self) -> String {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.csv")
            .to_string()
    }

    fn load_table(&self) -> PipelineResult<Table> {
        tracing::info!("Reading CSV '{}'", self.path.display());
        self.loader.load_path(&self.path)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn loader(target: &str) -> CsvLoader {
        CsvLoader::new(IngestOptions {
            target_column: target.to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_infers_numeric_and_categorical_columns() {
        let csv   = b"age,department,adopted\n31,Sales,1\n45,IT,0\n,IT,1\n";
        let table = loader("adopted").load_bytes(csv).unwrap();

        assert_eq!(table.row_count(), 3);
        assert_eq!(table.schema.column_type("age"),        Some(ColumnType::Numeric));
        assert_eq!(table.schema.column_type("department"), Some(ColumnType::Categorical));
        // Target is always categorical, even with 0/1 labels
        assert_eq!(table.schema.column_type("adopted"),    Some(ColumnType::Categorical));
        assert_eq!(table.rows[2][0], Cell::Missing);
        assert_eq!(table.rows[0][0], Cell::Number(31.0));
    }

    #[test]
    fn test_missing_markers_are_recognised() {
        let csv   = b"score,label\nNA,a\nn/a,b\nnull,a\n7,b\n";
        let table = loader("label").load_bytes(csv).unwrap();
        let missing = table.column(0).filter(|c| c.is_missing()).count();
        assert_eq!(missing, 3);
        assert_eq!(table.schema.column_type("score"), Some(ColumnType::Numeric));
    }

    #[test]
    fn test_forced_categorical_column() {
        let l = CsvLoader::new(IngestOptions {
            target_column:       "y".into(),
            categorical_columns: vec!["zip".into()],
            ..Default::default()
        });
        let table = l.load_bytes(b"zip,y\n1000,a\n2000,b\n").unwrap();
        assert_eq!(table.schema.column_type("zip"), Some(ColumnType::Categorical));
        assert_eq!(table.rows[0][0], Cell::Text("1000".into()));
    }

    #[test]
    fn test_missing_target_is_schema_error() {
        let err = loader("adopted").load_bytes(b"age,department\n31,Sales\n").unwrap_err();
        assert!(matches!(err, PipelineError::Schema(_)));
    }

    #[test]
    fn test_empty_target_accepts_unlabelled_upload() {
        let table = loader("").load_bytes(b"age,department
31,Sales
45,IT
").unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.schema.column_type("age"), Some(ColumnType::Numeric));
    }

    #[test]
    fn test_missing_configured_column_is_schema_error() {
        let l = CsvLoader::new(IngestOptions {
            target_column:    "y".into(),
            required_columns: vec!["email".into()],
            ..Default::default()
        });
        let err = l.load_bytes(b"x,y\n1,a\n").unwrap_err();
        assert!(matches!(err, PipelineError::Schema(_)));
    }

    #[test]
    fn test_ragged_rows_are_format_error() {
        let err = loader("y").load_bytes(b"x,y\n1,a\n2\n").unwrap_err();
        assert!(matches!(err, PipelineError::Format(_)));
    }

    #[test]
    fn test_header_only_is_format_error() {
        let err = loader("y").load_bytes(b"x,y\n").unwrap_err();
        assert!(matches!(err, PipelineError::Format(_)));
    }

    #[test]
    fn test_empty_input_is_format_error() {
        let err = loader("y").load_bytes(b"").unwrap_err();
        assert!(matches!(err, PipelineError::Format(_)));
    }

    #[test]
    fn test_duplicate_header_is_format_error() {
        let err = loader("y").load_bytes(b"x,x,y\n1,2,a\n").unwrap_err();
        assert!(matches!(err, PipelineError::Format(_)));
    }

    #[test]
    fn test_invalid_utf8_is_format_error() {
        let err = loader("y").load_bytes(b"x,y\n\xff\xfe,a\n").unwrap_err();
        assert!(matches!(err, PipelineError::Format(_)));
    }

    #[test]
    fn test_build_table_from_stored_grid() {
        let headers = vec!["x".to_string(), "y".to_string()];
        let rows    = vec![
            vec![Some("1.5".to_string()), Some("a".to_string())],
            vec![None,                    Some("b".to_string())],
        ];
        let table = loader("y").build_table(headers, rows).unwrap();
        assert_eq!(table.schema.column_type("x"), Some(ColumnType::Numeric));
        assert_eq!(table.rows[1][0], Cell::Missing);
    }
}
