//! # Segment merging
//!
//! Joins downloaded segment files into the single output file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{M3u8Error, Result};

/// Produces one output file from an ordered list of segment files.
#[async_trait]
pub trait SegmentMerger: Send + Sync {
    /// Merge `files`, in the given order, into `dest`.
    async fn merge(&self, files: &[PathBuf], dest: &Path, token: &CancellationToken)
    -> Result<()>;

    /// Extension of the produced file, without the leading dot.
    fn extension(&self) -> &str;
}

/// Byte-for-byte concatenation of transport stream segments.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcatMerger;

#[async_trait]
impl SegmentMerger for ConcatMerger {
    async fn merge(
        &self,
        files: &[PathBuf],
        dest: &Path,
        token: &CancellationToken,
    ) -> Result<()> {
        if files.is_empty() {
            return Err(M3u8Error::Merge("no segment files to merge".to_string()));
        }

        let output = fs::File::create(dest)
            .await
            .map_err(|e| M3u8Error::fs(dest, e))?;
        let mut writer = BufWriter::new(output);

        for file in files {
            if token.is_cancelled() {
                return Err(M3u8Error::Cancelled);
            }
            let mut input = fs::File::open(file)
                .await
                .map_err(|e| M3u8Error::fs(file, e))?;
            let copied = tokio::io::copy(&mut input, &mut writer)
                .await
                .map_err(|e| M3u8Error::fs(dest, e))?;
            debug!(segment = %file.display(), bytes = copied, "Appended segment");
        }

        writer.flush().await.map_err(|e| M3u8Error::fs(dest, e))?;
        Ok(())
    }

    fn extension(&self) -> &str {
        "ts"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_concat_preserves_given_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("00001.ts");
        let second = dir.path().join("00002.ts");
        std::fs::write(&first, b"\x47first").unwrap();
        std::fs::write(&second, b"\x47second").unwrap();
        let dest = dir.path().join("all.merge.ts");

        ConcatMerger
            .merge(&[first, second], &dest, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"\x47first\x47second");
        assert_eq!(ConcatMerger.extension(), "ts");
    }

    #[tokio::test]
    async fn test_concat_errors() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.ts");
        let token = CancellationToken::new();

        assert!(matches!(
            ConcatMerger.merge(&[], &dest, &token).await,
            Err(M3u8Error::Merge(_))
        ));
        assert!(matches!(
            ConcatMerger
                .merge(&[dir.path().join("missing.ts")], &dest, &token)
                .await,
            Err(M3u8Error::Filesystem { .. })
        ));

        std::fs::write(dir.path().join("a.ts"), b"a").unwrap();
        token.cancel();
        assert!(matches!(
            ConcatMerger
                .merge(&[dir.path().join("a.ts")], &dest, &token)
                .await,
            Err(M3u8Error::Cancelled)
        ));
    }
}
