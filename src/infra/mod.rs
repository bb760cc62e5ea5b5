// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the outside world:
//
//   store.rs             — SQLite persistence for batches, survey
//                          rows, models, the current-model slot,
//                          predictions and insights.
//
//   suggestion_client.rs — HTTP client for the external text
//                          suggestion service, with per-attempt
//                          timeout and bounded retry.
//
//   settings.rs          — TOML settings plus environment
//                          overrides; masking for display.
//
//   metrics.rs           — Appends one CSV row per successful
//                          training run.
//
//   backup.rs            — JSON export of every stored record.
//
// Lower layers never depend on this one; errors raised here are
// mapped onto the domain error taxonomy or wrapped with anyhow
// context for the CLI.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)

/// SQLite-backed persistence
pub mod store;

/// Suggestion service HTTP client
pub mod suggestion_client;

/// Settings file and environment overrides
pub mod settings;

/// Training run CSV log
pub mod metrics;

/// JSON export of the database
pub mod backup;
