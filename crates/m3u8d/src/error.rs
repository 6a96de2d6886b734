use std::path::PathBuf;

use reqwest::StatusCode;

/// Errors produced by the download pipeline.
#[derive(Debug, thiserror::Error)]
pub enum M3u8Error {
    #[error("Invalid request: {0}")]
    Config(String),

    #[error("No playable m3u8 found: {0}")]
    Resolution(String),

    #[error("Network error: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("Server returned status code {status} for {url}")]
    Status { status: StatusCode, url: String },

    #[error("Decryption error: {0}")]
    Crypto(String),

    #[error("Nothing to download: {0}")]
    EmptyResult(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not find a free output file name after {0} attempts")]
    NamingExhausted(usize),

    #[error("Resume cache error: {0}")]
    Cache(String),

    #[error("Merge error: {0}")]
    Merge(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl M3u8Error {
    pub(crate) fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        M3u8Error::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Whether this error is a transport-level failure (network or HTTP status).
    pub fn is_fetch(&self) -> bool {
        matches!(self, M3u8Error::Network { .. } | M3u8Error::Status { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, M3u8Error::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, M3u8Error>;
