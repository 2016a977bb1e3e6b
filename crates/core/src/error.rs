use crate::generator::GeneratorError;

/// Failure taxonomy for the triage core.
///
/// Every principal-facing operation resolves to exactly one of these
/// variants; the request boundary owns the mapping to transport codes.
/// Existence is always checked before policy, so `NotFound` never masks a
/// denial and a denial never masks a missing resource.
#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("access denied")]
    AccessDenied,
    #[error("invalid reference: {0}")]
    InvalidReference(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("prediagnosis generation failed: {0}")]
    Generation(#[from] GeneratorError),
    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),
}

pub type TriageResult<T> = std::result::Result<T, TriageError>;
