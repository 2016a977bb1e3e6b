//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into
//! core services. Reading process-wide environment variables during request
//! handling leads to inconsistent behaviour in multi-threaded runtimes and
//! test harnesses, so the environment is consulted only in `main` and the
//! resolved values travel through this type.

use crate::constants::{DEFAULT_CONVERSATION_LIMIT, DEFAULT_PREDIAGNOSIS_LIMIT};
use std::path::{Path, PathBuf};

/// Default on-disk location of the SQLite database.
const DEFAULT_DATABASE_FILE: &str = "fastaid.db";

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    database_path: PathBuf,
    conversation_list_cap: usize,
    prediagnosis_list_cap: usize,
}

impl CoreConfig {
    /// Create a new `CoreConfig` with the default listing caps.
    pub fn new(database_path: PathBuf) -> Self {
        Self {
            database_path,
            conversation_list_cap: DEFAULT_CONVERSATION_LIMIT,
            prediagnosis_list_cap: DEFAULT_PREDIAGNOSIS_LIMIT,
        }
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    /// Cap for conversation listings with an unspecified limit.
    pub fn conversation_list_cap(&self) -> usize {
        self.conversation_list_cap
    }

    /// Cap for per-patient prediagnosis listings with an unspecified limit.
    pub fn prediagnosis_list_cap(&self) -> usize {
        self.prediagnosis_list_cap
    }
}

/// Resolve the database path from an optional environment value.
///
/// If `value` is `None` or empty/whitespace, the default path is used.
pub fn database_path_from_env_value(value: Option<String>) -> PathBuf {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_FILE))
}
