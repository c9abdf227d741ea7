//! Persistent manifest of cached archives.
//!
//! Stored as pretty-printed JSON mapping month label → [`ArchiveRecord`]:
//!
//! ```text
//! {
//!   "2023-November": {
//!     "month": "2023-November",
//!     "url": "https://lists.rtems.org/pipermail/build/2023-November.txt.gz",
//!     "file": "/home/user/.cache/buildstat/2023-November.txt.gz",
//!     "size": 183211,
//!     "etag": "\"2cbab-6093c6c3\"",
//!     "sha512": "9b71d2..."
//!   }
//! }
//! ```
//!
//! The file is always rewritten whole through a temp file and rename.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use tracing::debug;

use crate::error::{Result, StatusError};
use crate::model::archive::ArchiveRecord;
use crate::model::month::MonthKey;

/// File name of the manifest inside the cache root.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Month → archive metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ArchiveManifest {
    records: BTreeMap<MonthKey, ArchiveRecord>,
}

impl ArchiveManifest {
    /// Load from `path`; a missing file yields an empty manifest.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No manifest yet");
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path).map_err(|e| StatusError::storage(path, e))?;
        serde_json::from_str(&data).map_err(|e| {
            StatusError::storage(
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })
    }

    /// Write to `path` atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = path.parent().unwrap_or(Path::new("."));
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            StatusError::storage(path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".manifest.")
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|e| StatusError::storage(dir, e))?;
        tmp.write_all(json.as_bytes())
            .and_then(|_| tmp.as_file().sync_data())
            .map_err(|e| StatusError::storage(tmp.path(), e))?;
        tmp.persist(path)
            .map_err(|e| StatusError::storage(path, e.error))?;
        debug!(path = %path.display(), records = self.records.len(), "Manifest saved");
        Ok(())
    }

    pub fn get(&self, month: MonthKey) -> Option<&ArchiveRecord> {
        self.records.get(&month)
    }

    /// Insert or replace the record for its month.
    pub fn insert(&mut self, record: ArchiveRecord) {
        self.records.insert(record.month, record);
    }

    /// Cached months, ascending.
    pub fn months(&self) -> Vec<MonthKey> {
        self.records.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(label: &str) -> ArchiveRecord {
        ArchiveRecord {
            month: MonthKey::parse(label).unwrap(),
            url: format!("https://example.org/{label}.txt.gz"),
            file: format!("/tmp/{label}.txt.gz").into(),
            size: Some(10),
            etag: None,
            sha512: "ab".to_string(),
        }
    }

    #[test]
    fn test_missing_manifest_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = ArchiveManifest::load(&dir.path().join(MANIFEST_FILE)).unwrap();
        assert!(manifest.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        let mut manifest = ArchiveManifest::default();
        manifest.insert(record("2023-November"));
        manifest.insert(record("2022-January"));
        manifest.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"2023-November\": {"));

        let loaded = ArchiveManifest::load(&path).unwrap();
        assert_eq!(loaded, manifest);
        assert_eq!(
            loaded.months(),
            vec![
                MonthKey::new(2022, 1).unwrap(),
                MonthKey::new(2023, 11).unwrap()
            ]
        );
        // only the manifest remains; the temp file was renamed
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_corrupt_manifest_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            ArchiveManifest::load(&path),
            Err(StatusError::CacheStorage { .. })
        ));
    }
}
