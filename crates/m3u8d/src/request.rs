use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{M3u8Error, Result};

pub const DEFAULT_FILE_NAME: &str = "all";

/// How the prefix for relative segment and key URIs is derived from the playlist URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostMode {
    /// `scheme://host` followed by the directory of the playlist path
    #[default]
    Apiv1,
    /// `scheme://host` only
    Apiv2,
}

impl FromStr for HostMode {
    type Err = M3u8Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "apiv1" => Ok(HostMode::Apiv1),
            "apiv2" => Ok(HostMode::Apiv2),
            other => Err(M3u8Error::Config(format!("invalid host type '{other}'"))),
        }
    }
}

impl fmt::Display for HostMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostMode::Apiv1 => f.write_str("apiv1"),
            HostMode::Apiv2 => f.write_str("apiv2"),
        }
    }
}

/// Everything a caller supplies to start a download.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub m3u8_url: String,
    #[serde(default)]
    pub host_mode: HostMode,
    /// Accept invalid TLS certificates
    #[serde(default)]
    pub insecure: bool,
    /// Output directory, the current directory when empty
    #[serde(default)]
    pub save_dir: PathBuf,
    /// Output base name without extension, `all` when empty
    #[serde(default)]
    pub file_name: String,
    /// Number of leading segments to drop
    #[serde(default)]
    pub skip_segments: usize,
    /// Scheme-prefixed proxy spec, direct connection when empty
    #[serde(default)]
    pub proxy: String,
    /// Extra request headers, merged over the defaults
    #[serde(default)]
    pub headers: BTreeMap<String, Vec<String>>,
}

impl DownloadRequest {
    pub fn new(m3u8_url: impl Into<String>) -> Self {
        Self {
            m3u8_url: m3u8_url.into(),
            ..Default::default()
        }
    }

    /// Fill in defaults for empty fields.
    pub fn normalized(mut self) -> Result<Self> {
        self.m3u8_url = self.m3u8_url.trim().to_string();
        if self.save_dir.as_os_str().is_empty() {
            self.save_dir = current_dir()?;
        }
        if self.file_name.trim().is_empty() {
            self.file_name = DEFAULT_FILE_NAME.to_string();
        }
        self.proxy = self.proxy.trim().to_lowercase();
        Ok(self)
    }
}

/// The process working directory.
pub fn current_dir() -> Result<PathBuf> {
    std::env::current_dir().map_err(|e| M3u8Error::fs(".", e))
}

/// Outcome of one download run.
///
/// Exactly one of success (`saved_path` set), skip, cancellation or error is reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadResult {
    /// Empty on success
    pub error_message: String,
    /// The output already existed from a previous run
    pub skipped: bool,
    pub cancelled: bool,
    pub saved_path: Option<PathBuf>,
}

impl DownloadResult {
    pub fn saved(path: PathBuf) -> Self {
        Self {
            saved_path: Some(path),
            ..Default::default()
        }
    }

    pub fn skipped(path: PathBuf) -> Self {
        Self {
            skipped: true,
            saved_path: Some(path),
            ..Default::default()
        }
    }

    pub fn cancelled() -> Self {
        Self {
            cancelled: true,
            ..Default::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error_message: message.into(),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.error_message.is_empty() && !self.cancelled
    }
}
