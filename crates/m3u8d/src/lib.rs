//! # m3u8d
//!
//! A library for downloading HLS (m3u8) video-on-demand assets into a
//! single file.
//!
//! ## Features
//!
//! - Playlist sniffing through nested manifests and landing pages
//! - AES-CBC segment decryption and MPEG-TS sync byte repair
//! - Bounded-concurrency segment downloads with cancellable retry
//! - Single-flight sessions: a new download cancels the running one
//! - Resume cache keyed by a request fingerprint
//!
//! ```no_run
//! use m3u8d_engine::{DownloadRequest, SessionConfig, SessionManager};
//!
//! # async fn example() {
//! let manager = SessionManager::new(SessionConfig::default());
//! let result = manager
//!     .run(DownloadRequest::new("https://example.com/vod/index.m3u8"))
//!     .await;
//! println!("{result:?}");
//! # }
//! ```

pub mod builder;
pub mod cache;
pub mod config;
pub mod curl;
pub mod error;
pub mod fetcher;
pub mod hls;
pub mod merge;
pub mod output;
pub mod progress;
pub mod proxy;
pub mod request;
pub mod session;

pub use builder::SessionConfigBuilder;
pub use cache::{CacheRecord, FileResumeCache, ResumeCache};
pub use config::SessionConfig;
pub use error::M3u8Error;

pub use fetcher::{FetcherFactory, HttpFetcher, HttpFetcherFactory, ResourceFetcher, create_client};
pub use merge::{ConcatMerger, SegmentMerger};
pub use progress::{ProgressSnapshot, ProgressState};
pub use proxy::{ProxyConfig, ProxyType};
pub use request::{DownloadRequest, DownloadResult, HostMode, current_dir};
pub use session::SessionManager;
