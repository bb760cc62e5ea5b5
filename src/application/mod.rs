// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates the other layers to accomplish one
// user-visible goal (upload, train, ask for insights, show the
// dashboard, maintain the database).
//
// Rules for this layer:
//   - No ML math or encoding code here
//   - No printing here (that's Layer 1)
//   - No SQL here (that's Layer 6)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Survey CSV → stored upload batch
pub mod upload_use_case;

// The training workflow
pub mod train_use_case;

// Current model → stored prediction run
pub mod predict_use_case;

// Current model → suggestion service → stored insight
pub mod insight_use_case;

// Read model for the dashboard
pub mod dashboard_use_case;

// History, purge and backup
pub mod admin_use_case;
