//! Metadata for one cached monthly archive.

use std::path::PathBuf;

use super::month::MonthKey;

/// Manifest entry describing the cached archive for one month.
///
/// `sha512` is the lowercase hex SHA-512 of `file` as last verified. A record
/// for the current month is never treated as final.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ArchiveRecord {
    /// Month this archive covers.
    pub month: MonthKey,

    /// Remote location the archive was fetched from.
    pub url: String,

    /// Local path of the cached compressed archive.
    pub file: PathBuf,

    /// Content length in bytes; `None` when never reported or never verified.
    pub size: Option<u64>,

    /// Server `ETag` seen on the last download.
    pub etag: Option<String>,

    /// Hex SHA-512 of the cached file.
    pub sha512: String,
}

impl ArchiveRecord {
    /// Whether the stored hash is present and equals `digest`.
    pub fn matches(&self, digest: &str) -> bool {
        !self.sha512.is_empty() && self.sha512 == digest
    }
}
