//! # File Resume Cache
//!
//! Stores one JSON record per fingerprint in a hidden directory under the output directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use crate::DownloadRequest;
use crate::cache::types::CacheRecord;
use crate::error::{M3u8Error, Result};
use crate::output::{probe_index, sha256_file};

use super::ResumeCache;

pub const CACHE_DIR_NAME: &str = ".m3u8d-cache";

#[derive(Debug, Clone, Copy, Default)]
pub struct FileResumeCache;

impl FileResumeCache {
    pub fn new() -> Self {
        Self
    }

    fn cache_dir(base_dir: &Path) -> PathBuf {
        base_dir.join(CACHE_DIR_NAME)
    }

    fn record_path(base_dir: &Path, fingerprint: &str) -> PathBuf {
        Self::cache_dir(base_dir).join(format!("{fingerprint}.json"))
    }

    /// Whether `path` holds exactly the recorded content.
    async fn matches(record: &CacheRecord, path: &Path) -> Result<bool> {
        let metadata = match fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(M3u8Error::fs(path, e)),
        };
        if !metadata.is_file() || metadata.len() != record.file_size {
            return Ok(false);
        }
        Ok(sha256_file(path).await? == record.content_hash)
    }

    /// Renumbered siblings of the recorded output, ordered by probe index.
    async fn renumbered_candidates(record: &CacheRecord, base_dir: &Path) -> Result<Vec<PathBuf>> {
        let recorded = Path::new(&record.file_name);
        let Some(ext) = recorded.extension().and_then(|ext| ext.to_str()) else {
            return Ok(Vec::new());
        };
        let base = if record.request.file_name.is_empty() {
            recorded
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or_default()
        } else {
            record.request.file_name.as_str()
        };

        let mut entries = match fs::read_dir(base_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(M3u8Error::fs(base_dir, e)),
        };

        let mut candidates = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| M3u8Error::fs(base_dir, e))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name == record.file_name {
                continue;
            }
            if let Some(index) = probe_index(name, base, ext) {
                candidates.push((index, entry.path()));
            }
        }
        candidates.sort_by_key(|(index, _)| *index);
        Ok(candidates.into_iter().map(|(_, path)| path).collect())
    }
}

#[async_trait::async_trait]
impl ResumeCache for FileResumeCache {
    async fn read(&self, base_dir: &Path, fingerprint: &str) -> Result<Option<CacheRecord>> {
        let path = Self::record_path(base_dir, fingerprint);

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(M3u8Error::Cache(format!(
                    "failed to read {}: {e}",
                    path.display()
                )));
            }
        };

        match serde_json::from_slice::<CacheRecord>(&bytes) {
            Ok(record) if record.fingerprint == fingerprint => Ok(Some(record)),
            Ok(_) => {
                warn!(path = ?path, "Cache record belongs to another fingerprint, ignoring");
                Ok(None)
            }
            Err(e) => {
                warn!(path = ?path, error = %e, "Failed to parse cache record, ignoring");
                Ok(None)
            }
        }
    }

    async fn write(
        &self,
        base_dir: &Path,
        fingerprint: &str,
        request: &DownloadRequest,
        final_path: &Path,
        content_hash: &str,
    ) -> Result<()> {
        let file_name = final_path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                M3u8Error::Cache(format!("invalid output path {}", final_path.display()))
            })?;
        let file_size = fs::metadata(final_path)
            .await
            .map_err(|e| M3u8Error::fs(final_path, e))?
            .len();

        let record = CacheRecord::new(
            fingerprint,
            request.clone(),
            file_name,
            file_size,
            content_hash,
        );
        let json = serde_json::to_vec_pretty(&record)
            .map_err(|e| M3u8Error::Cache(format!("failed to serialize record: {e}")))?;

        let dir = Self::cache_dir(base_dir);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| M3u8Error::Cache(format!("failed to create {}: {e}", dir.display())))?;

        let path = Self::record_path(base_dir, fingerprint);
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, json)
            .await
            .map_err(|e| M3u8Error::Cache(format!("failed to write {}: {e}", tmp_path.display())))?;
        fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| M3u8Error::Cache(format!("failed to write {}: {e}", path.display())))?;

        debug!(path = ?path, file = file_name, "Stored resume record");
        Ok(())
    }

    async fn locate(&self, record: &CacheRecord, base_dir: &Path) -> Result<Option<PathBuf>> {
        let recorded = base_dir.join(&record.file_name);
        if Self::matches(record, &recorded).await? {
            return Ok(Some(recorded));
        }

        for candidate in Self::renumbered_candidates(record, base_dir).await? {
            if Self::matches(record, &candidate).await? {
                debug!(recorded = %record.file_name, found = ?candidate, "Located renumbered output");
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }
}
