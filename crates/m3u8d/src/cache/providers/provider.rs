//! # Resume Cache Provider
//!
//! The trait every resume cache implementation follows.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::DownloadRequest;
use crate::cache::types::CacheRecord;
use crate::error::Result;

/// Storage for records of completed downloads, scoped to an output directory.
#[async_trait]
pub trait ResumeCache: Send + Sync {
    /// The record stored under `fingerprint`, if any.
    async fn read(&self, base_dir: &Path, fingerprint: &str) -> Result<Option<CacheRecord>>;

    /// Record that `request` produced `final_path` with the given content hash.
    async fn write(
        &self,
        base_dir: &Path,
        fingerprint: &str,
        request: &DownloadRequest,
        final_path: &Path,
        content_hash: &str,
    ) -> Result<()>;

    /// Find the recorded output on disk, following renumbered file names.
    ///
    /// A file only counts when its size and content hash match the record.
    async fn locate(&self, record: &CacheRecord, base_dir: &Path) -> Result<Option<PathBuf>>;
}
