// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs, enums and traits describing what the
// survey pipeline works with:
//
//   errors.rs  — the PipelineError taxonomy shared by all layers
//   schema.rs  — column name → declared type, fixed at ingestion
//   table.rs   — the in-memory typed table produced by ingestion
//   records.rs — persisted record kinds (surveys, predictions,
//                insights) and the model summary shown on the
//                dashboard
//   traits.rs  — seams implemented by the data and infra layers
//
// Rules for this layer:
//   - NO file I/O, SQL or network calls
//   - NO model fitting code
//
// Reference: Rust Book §5 (Structs), §6 (Enums), §10 (Traits)

/// Error taxonomy surfaced to the operator
pub mod errors;

/// Schema descriptor (column → declared type)
pub mod schema;

/// Typed in-memory table
pub mod table;

/// Survey, prediction and insight records
pub mod records;

/// Core abstractions (traits) that other layers implement
pub mod traits;
