// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between the uploaded bytes and the numeric
// matrices the forest is trained on.
//
//   uploaded CSV
//       │
//       ▼
//   CsvLoader        → parses, validates, declares column types
//       │
//       ▼
//   Preprocessor     → imputes, encodes, builds the Dataset
//       │
//       ▼
//   splitter         → stratified, seeded 80/20 partitions
//       │
//       ▼
//   Split { train, eval }  → handed to the ML layer
//
// stats.rs summarises a table for the upload report and the
// dashboard charts.

/// CSV ingestion and schema declaration
pub mod loader;

/// Imputation, categorical encoding, feature/target split
pub mod preprocessor;

/// Encoded feature matrix and labels
pub mod dataset;

/// Seeded stratified split and k-fold assignment
pub mod splitter;

/// Descriptive statistics for uploaded tables
pub mod stats;
