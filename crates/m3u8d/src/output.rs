//! # Output files
//!
//! Non-colliding final file names and content hashing of finished outputs.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncReadExt;

use crate::error::{M3u8Error, Result};

const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// File name for probe `index`: `base.ext` for 0, `base_0001.ext` after that.
pub fn numbered_file_name(base: &str, ext: &str, index: usize) -> String {
    if index == 0 {
        format!("{base}.{ext}")
    } else {
        format!("{base}_{index:04}.{ext}")
    }
}

/// Parse a name produced by [`numbered_file_name`] back into its probe index.
pub fn probe_index(file_name: &str, base: &str, ext: &str) -> Option<usize> {
    let stem = file_name.strip_prefix(base)?.strip_suffix(ext)?.strip_suffix('.')?;
    if stem.is_empty() {
        return Some(0);
    }
    let digits = stem.strip_prefix('_')?;
    if digits.len() < 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().filter(|index| *index > 0)
}

/// First path in `dir` that does not exist yet, probing at most `max_probes` suffixes.
pub async fn pick_output_path(
    dir: &Path,
    base: &str,
    ext: &str,
    max_probes: usize,
) -> Result<PathBuf> {
    for index in 0..=max_probes {
        let candidate = dir.join(numbered_file_name(base, ext, index));
        let exists = fs::try_exists(&candidate)
            .await
            .map_err(|e| M3u8Error::fs(&candidate, e))?;
        if !exists {
            return Ok(candidate);
        }
    }
    Err(M3u8Error::NamingExhausted(max_probes))
}

/// Lowercase hex sha256 of a file's contents.
pub async fn sha256_file(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)
        .await
        .map_err(|e| M3u8Error::fs(path, e))?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];
    loop {
        let read = file
            .read(&mut buffer)
            .await
            .map_err(|e| M3u8Error::fs(path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}
