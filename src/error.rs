//! Error handling utilities shared across the crate.

use std::path::PathBuf;

use thiserror::Error;

/// Convenient result type used throughout the crate.
pub type Result<T, E = SvmTextError> = std::result::Result<T, E>;

/// Domain-specific error describing failures while building an index or classifying text.
#[derive(Debug, Error)]
pub enum SvmTextError {
    /// Configuration failed validation or a required artifact is missing.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Filesystem IO error with optional context path.
    #[error("io error while processing {path:?}: {source}")]
    Io {
        /// Underlying IO error returned by the standard library.
        source: std::io::Error,
        /// Target path associated with the IO failure if available.
        path: Option<PathBuf>,
    },
    /// An external LIBSVM tool could not be started, timed out, or exited unsuccessfully.
    #[error("external tool `{tool}` failed ({status}): `{command}`{}", format_stderr(.stderr))]
    ExternalTool {
        /// Logical tool name (`scale`, `train`, `predict`).
        tool: String,
        /// Full command line that was executed.
        command: String,
        /// Exit status, signal, or spawn/timeout description.
        status: String,
        /// Captured standard error output.
        stderr: String,
    },
    /// Persisted artifacts or intermediate results violate a required invariant.
    #[error("integrity error: {0}")]
    Integrity(String),
    /// Malformed vocabulary, instance, or prediction text.
    #[error("parse error: {0}")]
    Parse(String),
    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Catch-all variant for invariants that should not occur.
    #[error("internal error: {0}")]
    Internal(String),
}

fn format_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}

impl From<serde_json::Error> for SvmTextError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl SvmTextError {
    /// Helper constructor that attaches an optional path when wrapping IO errors.
    pub fn io(source: std::io::Error, path: Option<PathBuf>) -> Self {
        Self::Io { source, path }
    }
}
