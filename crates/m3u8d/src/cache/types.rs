//! # Cache Types

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::DownloadRequest;

/// Stable identifier of a download: the resolved playlist URL plus the skip count.
pub fn fingerprint(resolved_url: &str, skip_segments: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(resolved_url.as_bytes());
    hasher.update(b"\n");
    hasher.update(skip_segments.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// A completed download, as persisted by a [`ResumeCache`](crate::cache::ResumeCache).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub fingerprint: String,
    pub request: DownloadRequest,
    /// File name of the output inside the output directory
    pub file_name: String,
    pub file_size: u64,
    /// sha256 hex of the output file
    pub content_hash: String,
    /// Unix seconds
    pub created_at: u64,
}

impl CacheRecord {
    pub fn new(
        fingerprint: impl Into<String>,
        request: DownloadRequest,
        file_name: impl Into<String>,
        file_size: u64,
        content_hash: impl Into<String>,
    ) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            request,
            file_name: file_name.into(),
            file_size,
            content_hash: content_hash.into(),
            created_at: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        }
    }
}
