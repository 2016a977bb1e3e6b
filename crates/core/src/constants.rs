//! Shared constants for the triage core.

/// Cap applied to conversation listings when the caller does not specify a
/// limit, to avoid unbounded scans.
pub const DEFAULT_CONVERSATION_LIMIT: usize = 50;

/// Cap applied to per-patient prediagnosis listings when the caller does not
/// specify a limit.
pub const DEFAULT_PREDIAGNOSIS_LIMIT: usize = 10;

/// Number of leading symptoms used to derive a title for a conversation
/// created implicitly by a prediagnosis request.
pub const DERIVED_TITLE_SYMPTOM_COUNT: usize = 3;

/// Lifetime of an issued session token, in hours.
pub const SESSION_TTL_HOURS: i64 = 24;
