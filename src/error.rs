//! Centralized error types for buildstat.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::month::MonthKey;

/// All errors produced by the buildstat library.
#[derive(Error, Debug)]
pub enum StatusError {
    /// Network or transport failure while fetching an archive. Retryable.
    #[error("Download of '{url}' failed: {reason}")]
    Download { url: String, reason: String },

    /// A downloaded archive does not match its expected length or hash.
    #[error("Integrity check failed for '{path}': {reason}")]
    Integrity { path: PathBuf, reason: String },

    /// Local filesystem failure inside the archive cache.
    #[error("Cache storage error at '{path}': {source}")]
    CacheStorage {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The archive could not be decompressed or is not an mbox stream.
    #[error("Invalid archive '{path}': {reason}")]
    Format { path: PathBuf, reason: String },

    /// A single build subject does not follow the expected grammar.
    #[error("Invalid build subject '{subject}': {reason}")]
    SubjectGrammar { subject: String, reason: String },

    /// Results for this month were already aggregated.
    #[error("Results for {0} already inserted")]
    DuplicateMonth(MonthKey),

    /// The month was never cached or ingested.
    #[error("Unknown month: {0}")]
    UnknownMonth(String),

    /// A month label or number could not be interpreted.
    #[error("Invalid month: {0}")]
    InvalidMonth(String),

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,
}

/// Convenience alias for `Result<T, StatusError>`.
pub type Result<T> = std::result::Result<T, StatusError>;

impl StatusError {
    /// Create a `CacheStorage` variant from a path and an `io::Error`.
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::CacheStorage {
            path: path.into(),
            source,
        }
    }

    /// Create a `Format` variant for the given archive.
    pub fn format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Format {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a `SubjectGrammar` variant naming the offending subject.
    pub fn grammar(subject: &str, reason: impl Into<String>) -> Self {
        Self::SubjectGrammar {
            subject: subject.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the failure only affects a single month and a driver may
    /// move on to the next one. A malformed build subject fails only the
    /// month it was found in.
    pub fn is_per_month(&self) -> bool {
        matches!(
            self,
            Self::Download { .. }
                | Self::Integrity { .. }
                | Self::Format { .. }
                | Self::SubjectGrammar { .. }
        )
    }
}
