// ============================================================
// Layer 3 — Pipeline Errors
// ============================================================
// Every failure the pipeline can report to the operator falls
// into one of five kinds:
//
//   Format                — the upload is not a usable CSV
//   Schema                — target column missing or degenerate,
//                           configured columns absent
//   Training              — the classifier could not be fitted
//   SuggestionUnavailable — the external suggestion call failed
//                           or timed out
//   Persistence           — storage write/read failure
//
// Lower layers return `PipelineResult<T>`; the application and
// CLI layers wrap it in anyhow for context.
//
// Reference: thiserror crate documentation
//            Rust Book §9 (Recoverable Errors with Result)

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("format error: {0}")]
    Format(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("training error: {0}")]
    Training(String),

    #[error("suggestion service unavailable: {0}")]
    SuggestionUnavailable(String),

    #[error("persistence error: {0}")]
    Persistence(String),
}

impl PipelineError {
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    pub fn training(msg: impl Into<String>) -> Self {
        Self::Training(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::SuggestionUnavailable(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Short machine-friendly label, used in log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Format(_)                => "FormatError",
            Self::Schema(_)                => "SchemaError",
            Self::Training(_)              => "TrainingError",
            Self::SuggestionUnavailable(_) => "SuggestionUnavailable",
            Self::Persistence(_)           => "PersistenceError",
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
