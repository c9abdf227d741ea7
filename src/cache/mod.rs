//! Local cache of monthly compressed archives.
//!
//! Layout of the cache root:
//!
//! ```text
//! <root>/manifest.json          month label → ArchiveRecord
//! <root>/2023-November.txt.gz   one archive per month
//! ```
//!
//! Past months are fetched once and then only re-verified by hash. The
//! current month is still growing, so it is re-checked against the server
//! on every call.

pub mod manifest;
pub mod source;

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha512};
use tracing::{debug, info, warn};

use crate::error::{Result, StatusError};
use crate::model::archive::ArchiveRecord;
use crate::model::month::MonthKey;

pub use manifest::{ArchiveManifest, MANIFEST_FILE};
pub use source::{ArchiveSource, FetchResponse, HttpSource};

/// Download chunk size.
const CHUNK_SIZE: usize = 256 * 1024;

/// Extension of cached archives and of the remote files.
pub const ARCHIVE_EXT: &str = ".txt.gz";

/// Download progress: `(bytes_so_far, total_if_known)`. Return `false` to
/// cancel the download.
pub type Progress<'a> = &'a dyn Fn(u64, Option<u64>) -> bool;

/// Fetches, verifies and stores one archive per month.
///
/// The manifest is loaded by [`ArchiveCache::open`] and written after each
/// completed download. Nothing is saved on drop.
pub struct ArchiveCache<S: ArchiveSource = HttpSource> {
    root: PathBuf,
    base_url: String,
    source: S,
    manifest: ArchiveManifest,
    current: MonthKey,
}

impl<S: ArchiveSource> ArchiveCache<S> {
    /// Open (creating if needed) the cache at `root`.
    pub fn open(root: impl Into<PathBuf>, base_url: &str, source: S) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| StatusError::storage(&root, e))?;
        let manifest = ArchiveManifest::load(&root.join(MANIFEST_FILE))?;
        info!(root = %root.display(), archives = manifest.len(), "Opened archive cache");
        Ok(Self {
            root,
            base_url: base_url.trim_end_matches('/').to_string(),
            source,
            manifest,
            current: MonthKey::current(),
        })
    }

    /// Reload the manifest from disk, discarding in-memory changes.
    pub fn load(&mut self) -> Result<()> {
        self.manifest = ArchiveManifest::load(&self.manifest_path())?;
        Ok(())
    }

    /// Write the manifest to disk.
    pub fn save(&self) -> Result<()> {
        self.manifest.save(&self.manifest_path())
    }

    /// Override which month is treated as in progress.
    pub fn set_current_month(&mut self, month: MonthKey) {
        self.current = month;
    }

    pub fn current_month(&self) -> MonthKey {
        self.current
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> &ArchiveManifest {
        &self.manifest
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    /// Remote location of a month's archive.
    pub fn archive_url(&self, month: MonthKey) -> String {
        format!("{}/{}{}", self.base_url, month.label(), ARCHIVE_EXT)
    }

    /// Local path of a month's archive.
    pub fn archive_path(&self, month: MonthKey) -> PathBuf {
        self.root.join(format!("{}{}", month.label(), ARCHIVE_EXT))
    }

    pub fn record(&self, month: MonthKey) -> Option<&ArchiveRecord> {
        self.manifest.get(month)
    }

    /// Cached file of a month, or `UnknownMonth` if it was never fetched.
    pub fn file_name(&self, month: MonthKey) -> Result<&Path> {
        self.manifest
            .get(month)
            .map(|r| r.file.as_path())
            .ok_or_else(|| StatusError::UnknownMonth(month.label()))
    }

    /// Whether the cached file exists and matches its recorded hash.
    pub fn check_checksum(&self, month: MonthKey) -> Result<bool> {
        let record = self
            .manifest
            .get(month)
            .ok_or_else(|| StatusError::UnknownMonth(month.label()))?;
        let path = self.archive_path(month);
        if !path.exists() {
            return Ok(false);
        }
        Ok(record.matches(&sha512_file(&path)?))
    }

    /// Return a verified local archive for `month`, downloading it if needed.
    pub fn ensure_fresh(&mut self, month: MonthKey) -> Result<PathBuf> {
        self.ensure_fresh_with_progress(month, None)
    }

    /// [`ensure_fresh`](Self::ensure_fresh) reporting download progress. A
    /// cancelled download leaves the previous file and manifest untouched.
    pub fn ensure_fresh_with_progress(
        &mut self,
        month: MonthKey,
        progress: Option<Progress<'_>>,
    ) -> Result<PathBuf> {
        let path = self.archive_path(month);
        let url = self.archive_url(month);
        let is_current = month >= self.current;

        let verified = match self.manifest.get(month) {
            Some(record) if path.exists() => {
                let ok = record.matches(&sha512_file(&path)?);
                if !ok {
                    warn!(month = %month, path = %path.display(), "Cached archive hash mismatch");
                }
                ok
            }
            _ => false,
        };

        if verified && !is_current {
            debug!(month = %month, "Archive verified, no fetch needed");
            return Ok(path);
        }

        let FetchResponse {
            etag,
            content_length,
            body,
        } = self.source.fetch(&url)?;

        if verified {
            let stored = self.manifest.get(month).and_then(|r| r.etag.as_deref());
            if let (Some(server), Some(stored)) = (etag.as_deref(), stored) {
                if server == stored {
                    info!(month = %month, "Archive unchanged on server");
                    return Ok(path);
                }
            }
        }

        info!(month = %month, url = %url, size = ?content_length, "Downloading archive");
        let (size, sha512) = self.download(month, &path, body, content_length, progress)?;

        self.manifest.insert(ArchiveRecord {
            month,
            url,
            file: path.clone(),
            size: Some(size),
            etag,
            sha512,
        });
        self.save()?;
        Ok(path)
    }

    /// Stream `body` into `path` via a temp file in the cache root. Returns
    /// the byte count and hex SHA-512.
    fn download(
        &self,
        month: MonthKey,
        path: &Path,
        mut body: Box<dyn Read + Send>,
        content_length: Option<u64>,
        progress: Option<Progress<'_>>,
    ) -> Result<(u64, String)> {
        let url = self.archive_url(month);
        let tmp = tempfile::Builder::new()
            .prefix(&format!(".{}.", month.label()))
            .suffix(".part")
            .tempfile_in(&self.root)
            .map_err(|e| StatusError::storage(&self.root, e))?;

        let mut writer = BufWriter::new(tmp.as_file());
        let mut hasher = Sha512::new();
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut have: u64 = 0;

        loop {
            let n = match body.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(StatusError::Download {
                        url,
                        reason: e.to_string(),
                    })
                }
            };
            writer
                .write_all(&buf[..n])
                .map_err(|e| StatusError::storage(tmp.path(), e))?;
            hasher.update(&buf[..n]);
            have += n as u64;

            if let Some(cb) = progress {
                if !cb(have, content_length) {
                    info!(month = %month, bytes = have, "Download cancelled");
                    return Err(StatusError::Cancelled);
                }
            }
        }
        writer
            .flush()
            .map_err(|e| StatusError::storage(tmp.path(), e))?;
        drop(writer);

        if let Some(expected) = content_length {
            if expected != have {
                return Err(StatusError::Integrity {
                    path: path.to_path_buf(),
                    reason: format!("expected {expected} bytes, received {have}"),
                });
            }
        }

        let digest = format!("{:x}", hasher.finalize());
        tmp.persist(path)
            .map_err(|e| StatusError::storage(path, e.error))?;

        let on_disk = sha512_file(path)?;
        if on_disk != digest {
            let _ = std::fs::remove_file(path);
            return Err(StatusError::Integrity {
                path: path.to_path_buf(),
                reason: "hash of stored file differs from downloaded content".to_string(),
            });
        }

        info!(month = %month, bytes = have, path = %path.display(), "Archive stored");
        Ok((have, digest))
    }
}

/// Hex SHA-512 of a file's contents.
pub fn sha512_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| StatusError::storage(path, e))?;
    let mut hasher = Sha512::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).map_err(|e| StatusError::storage(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoNetwork;

    impl ArchiveSource for NoNetwork {
        fn fetch(&self, url: &str) -> Result<FetchResponse> {
            Err(StatusError::Download {
                url: url.to_string(),
                reason: "offline".to_string(),
            })
        }
    }

    #[test]
    fn test_paths_and_urls() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArchiveCache::open(dir.path(), "https://lists.example.org/build/", NoNetwork).unwrap();
        let month = MonthKey::new(2023, 11).unwrap();
        assert_eq!(
            cache.archive_url(month),
            "https://lists.example.org/build/2023-November.txt.gz"
        );
        assert_eq!(cache.archive_path(month), dir.path().join("2023-November.txt.gz"));
    }

    #[test]
    fn test_unknown_month_lookups() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArchiveCache::open(dir.path(), "https://x", NoNetwork).unwrap();
        let month = MonthKey::new(2020, 1).unwrap();
        assert!(matches!(cache.file_name(month), Err(StatusError::UnknownMonth(_))));
        assert!(matches!(cache.check_checksum(month), Err(StatusError::UnknownMonth(_))));
    }

    #[test]
    fn test_download_error_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ArchiveCache::open(dir.path(), "https://x", NoNetwork).unwrap();
        let month = MonthKey::new(2020, 1).unwrap();
        let err = cache.ensure_fresh(month).unwrap_err();
        assert!(matches!(err, StatusError::Download { .. }));
        assert!(cache.manifest().is_empty());
        assert!(!cache.manifest_path().exists());
    }

    #[test]
    fn test_sha512_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(
            sha512_file(&path).unwrap(),
            "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
             2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f"
        );
    }
}
