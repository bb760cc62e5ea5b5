// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer programs against these traits so that
// the source of a table and the suggestion backend can be
// swapped (and mocked in tests) without touching the use cases.
//
//   TableSource       — CsvSource (an uploaded file) and
//                       StoredBatchSource (the latest upload kept
//                       in the database)
//   SuggestionService — OpenRouterClient, or a stub in tests
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)
//            async-trait crate documentation

use async_trait::async_trait;

use crate::domain::errors::PipelineResult;
use crate::domain::table::Table;

// ─── TableSource ──────────────────────────────────────────────────────────────
/// Anything that can produce a validated, typed table.
pub trait TableSource {
    /// Human readable origin, stored with upload batches
    fn describe(&self) -> String;

    fn load_table(&self) -> PipelineResult<Table>;
}

// ─── SuggestionService ────────────────────────────────────────────────────────
/// An external text generator treated as unreliable I/O.
///
/// Implementations must never panic: every failure, including
/// timeouts and missing credentials, comes back as
/// `PipelineError::SuggestionUnavailable`.
#[async_trait]
pub trait SuggestionService: Send + Sync {
    async fn suggest(&self, prompt: &str) -> PipelineResult<String>;
}
