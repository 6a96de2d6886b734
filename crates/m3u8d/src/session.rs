//! # Download Sessions
//!
//! [`SessionManager`] runs one download at a time. Starting a new run cancels
//! the one in flight; the superseded run reports itself as cancelled.
//!
//! A run resolves the playlist, checks the resume cache, downloads every
//! segment into `<save_dir>/downloading/<fingerprint>`, merges them, and
//! moves the result to a free file name in the output directory.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::cache::{FileResumeCache, ResumeCache, fingerprint};
use crate::error::{M3u8Error, Result};
use crate::fetcher::{FetcherFactory, HttpFetcherFactory};
use crate::hls::{
    SegmentScheduler, apply_skip, extract_segments, fetch_key, playlist_host, resolve_playlist,
};
use crate::merge::{ConcatMerger, SegmentMerger};
use crate::output::{pick_output_path, sha256_file};
use crate::progress::{ProgressSnapshot, ProgressState};
use crate::{DownloadRequest, DownloadResult, HostMode, SessionConfig};

/// Directory under the output directory holding in-progress downloads.
pub const WORKING_DIR_NAME: &str = "downloading";

const MERGE_STEM: &str = "all.merge";

const TITLE_SNIFFING: &str = "Sniffing m3u8";
const TITLE_CHECKING: &str = "Checking existing download";
const TITLE_SEGMENT_LIST: &str = "Fetching segment list";
const TITLE_DOWNLOADING: &str = "Downloading segments";
const TITLE_MERGING: &str = "Merging segments";
const TITLE_HASHING: &str = "Hashing output";

struct ActiveSession {
    id: u64,
    token: CancellationToken,
}

enum Outcome {
    Saved(PathBuf),
    Skipped(PathBuf),
}

/// Single-flight supervisor for download runs.
pub struct SessionManager {
    config: SessionConfig,
    fetchers: Arc<dyn FetcherFactory>,
    cache: Arc<dyn ResumeCache>,
    merger: Arc<dyn SegmentMerger>,
    progress: Arc<ProgressState>,
    active: Mutex<Option<ActiveSession>>,
    next_id: AtomicU64,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl SessionManager {
    /// Manager with the HTTP fetcher, file resume cache and concatenating merger.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            fetchers: Arc::new(HttpFetcherFactory::new(config.clone())),
            cache: Arc::new(FileResumeCache::new()),
            merger: Arc::new(ConcatMerger),
            progress: Arc::new(ProgressState::new()),
            active: Mutex::new(None),
            next_id: AtomicU64::new(1),
            config,
        }
    }

    pub fn with_fetcher_factory(mut self, fetchers: Arc<dyn FetcherFactory>) -> Self {
        self.fetchers = fetchers;
        self
    }

    pub fn with_resume_cache(mut self, cache: Arc<dyn ResumeCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_merger(mut self, merger: Arc<dyn SegmentMerger>) -> Self {
        self.merger = merger;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current phase title and percent; callable at any time.
    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Cancel the run in flight, if any.
    pub fn cancel_current(&self) {
        if let Some(active) = self.active.lock().as_ref() {
            info!(session = active.id, "Cancelling current download");
            active.token.cancel();
        }
    }

    /// Run one download to completion, superseding any run already in flight.
    pub async fn run(&self, request: DownloadRequest) -> DownloadResult {
        let (id, token) = self.begin();
        info!(session = id, url = %request.m3u8_url, "Starting download");

        let outcome = self.execute(request, &token).await;
        self.finish(id);

        match outcome {
            Ok(Outcome::Saved(path)) => {
                self.progress.reset_title();
                info!(session = id, path = %path.display(), "Download finished");
                DownloadResult::saved(path)
            }
            Ok(Outcome::Skipped(path)) => {
                self.progress.reset_title();
                info!(session = id, path = %path.display(), "Download already present, skipped");
                DownloadResult::skipped(path)
            }
            Err(e) if e.is_cancelled() || token.is_cancelled() => {
                warn!(session = id, "Download cancelled");
                DownloadResult::cancelled()
            }
            Err(e) => {
                error!(session = id, error = %e, "Download failed");
                DownloadResult::failed(e.to_string())
            }
        }
    }

    fn begin(&self) -> (u64, CancellationToken) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();

        let mut active = self.active.lock();
        if let Some(previous) = active.replace(ActiveSession {
            id,
            token: token.clone(),
        }) {
            info!(previous = previous.id, session = id, "Superseding running download");
            previous.token.cancel();
        }
        (id, token)
    }

    fn finish(&self, id: u64) {
        let mut active = self.active.lock();
        if active.as_ref().is_some_and(|session| session.id == id) {
            *active = None;
        }
    }

    async fn execute(&self, request: DownloadRequest, token: &CancellationToken) -> Result<Outcome> {
        let request = request.normalized()?;

        let referer = playlist_host(&request.m3u8_url, HostMode::Apiv2)?;
        let headers = self.config.build_headers(&referer, &request.headers)?;
        let fetcher = self.fetchers.create(&request, headers, token.clone())?;

        self.progress.set_title(TITLE_SNIFFING);
        let playlist = resolve_playlist(
            fetcher.as_ref(),
            &request.m3u8_url,
            self.config.max_resolve_hops,
        )
        .await?;
        info!(url = %playlist.url, "Resolved media playlist");

        let fingerprint = fingerprint(&playlist.url, request.skip_segments);
        if let Some(record) = self.cache.read(&request.save_dir, &fingerprint).await? {
            self.progress.set_title(TITLE_CHECKING);
            if let Some(path) = self.cache.locate(&record, &request.save_dir).await? {
                return Ok(Outcome::Skipped(path));
            }
        }

        if !playlist.url.starts_with("http") {
            return Err(M3u8Error::Config(format!(
                "playlist URL is not http(s): {:?}",
                playlist.url
            )));
        }

        let work_dir = request.save_dir.join(WORKING_DIR_NAME).join(&fingerprint);
        fs::create_dir_all(&work_dir)
            .await
            .map_err(|e| M3u8Error::fs(&work_dir, e))?;

        let host = playlist_host(&playlist.url, request.host_mode)?;
        let key = fetch_key(fetcher.as_ref(), &host, &playlist.body).await?;

        self.progress.set_title(TITLE_SEGMENT_LIST);
        let segments = apply_skip(
            extract_segments(&host, &playlist.body),
            request.skip_segments,
        )?;

        self.progress.set_title(TITLE_DOWNLOADING);
        self.progress.set_fraction(0, segments.len());
        SegmentScheduler::new(
            &self.config,
            Arc::clone(&fetcher),
            Arc::clone(&self.progress),
            token.clone(),
        )
        .download_all(&segments, &work_dir, key)
        .await?;
        self.progress.set_fraction(1, 1);

        self.progress.set_title(TITLE_MERGING);
        let files: Vec<PathBuf> = segments
            .iter()
            .map(|segment| work_dir.join(&segment.name))
            .collect();
        let ext = self.merger.extension().to_string();
        let merged = work_dir.join(format!("{MERGE_STEM}.{ext}"));
        self.merger.merge(&files, &merged, token).await?;
        if token.is_cancelled() {
            return Err(M3u8Error::Cancelled);
        }

        self.progress.set_title(TITLE_HASHING);
        let content_hash = sha256_file(&merged).await?;

        let final_path = pick_output_path(
            &request.save_dir,
            &request.file_name,
            &ext,
            self.config.max_name_probes,
        )
        .await?;
        fs::rename(&merged, &final_path)
            .await
            .map_err(|e| M3u8Error::fs(&final_path, e))?;

        self.cache
            .write(
                &request.save_dir,
                &fingerprint,
                &request,
                &final_path,
                &content_hash,
            )
            .await?;

        fs::remove_dir_all(&work_dir)
            .await
            .map_err(|e| M3u8Error::fs(&work_dir, e))?;
        // Only succeeds once no other download is using it
        let _ = fs::remove_dir(request.save_dir.join(WORKING_DIR_NAME)).await;

        Ok(Outcome::Saved(final_path))
    }
}
