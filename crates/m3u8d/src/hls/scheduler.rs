// HLS Segment Scheduler: downloads every segment of a playlist with bounded concurrency and retry.

use bytes::Bytes;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::SessionConfig;
use crate::error::{M3u8Error, Result};
use crate::fetcher::ResourceFetcher;
use crate::hls::decryption::decrypt;
use crate::hls::playlist::SegmentRef;
use crate::hls::segment_utils::realign_sync_byte;
use crate::progress::ProgressState;

#[derive(Default)]
struct BatchState {
    completed: usize,
    first_error: Option<M3u8Error>,
}

/// Everything a worker needs to download one segment.
#[derive(Clone)]
struct SegmentJob {
    fetcher: Arc<dyn ResourceFetcher>,
    token: CancellationToken,
    key: Option<Bytes>,
    target_dir: PathBuf,
    max_attempts: u32,
    retry_delay_unit: Duration,
}

impl SegmentJob {
    /// Download `segment` into the target directory, retrying failed attempts.
    async fn run(&self, segment: &SegmentRef) -> Result<()> {
        let final_path = self.target_dir.join(&segment.name);
        if fs::try_exists(&final_path).await.unwrap_or(false) {
            debug!(segment = %segment.name, "Segment already on disk, skipping");
            return Ok(());
        }

        let mut attempt = 0;
        loop {
            if attempt > 0 {
                let delay = self.retry_delay_unit * attempt;
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => return Err(M3u8Error::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            attempt += 1;

            match self.attempt(segment, &final_path).await {
                Ok(()) => {
                    debug!(segment = %segment.name, attempt, "Segment saved");
                    return Ok(());
                }
                Err(_) if self.token.is_cancelled() => return Err(M3u8Error::Cancelled),
                Err(e) if attempt >= self.max_attempts => return Err(e),
                Err(e) => {
                    warn!(segment = %segment.name, url = %segment.url, attempt, error = %e, "Segment attempt failed, retrying");
                }
            }
        }
    }

    /// fetch → decrypt → realign → write to a temp file → rename into place
    async fn attempt(&self, segment: &SegmentRef, final_path: &Path) -> Result<()> {
        let raw = self.fetcher.fetch(&segment.url).await?;

        let data = match &self.key {
            Some(key) => Bytes::from(decrypt(&raw, key)?),
            None => raw,
        };
        let data = realign_sync_byte(data);

        let tmp_path = self.target_dir.join(format!("{}.tmp", segment.name));
        fs::write(&tmp_path, &data)
            .await
            .map_err(|e| M3u8Error::fs(&tmp_path, e))?;
        fs::rename(&tmp_path, final_path)
            .await
            .map_err(|e| M3u8Error::fs(final_path, e))?;
        Ok(())
    }
}

/// Worker pool that downloads a playlist's segments into a directory.
pub struct SegmentScheduler {
    fetcher: Arc<dyn ResourceFetcher>,
    progress: Arc<ProgressState>,
    token: CancellationToken,
    download_concurrency: usize,
    max_attempts: u32,
    retry_delay_unit: Duration,
}

impl SegmentScheduler {
    pub fn new(
        config: &SessionConfig,
        fetcher: Arc<dyn ResourceFetcher>,
        progress: Arc<ProgressState>,
        token: CancellationToken,
    ) -> Self {
        Self {
            fetcher,
            progress,
            token,
            download_concurrency: config.download_concurrency.max(1),
            max_attempts: config.max_segment_attempts.max(1),
            retry_delay_unit: config.retry_delay_unit,
        }
    }

    /// Download all `segments` into `target_dir`, decrypting with `key` when present.
    ///
    /// Every segment is attempted even after another one has failed; the first
    /// terminal failure is returned once the whole batch is done. Progress is
    /// published as each segment concludes.
    pub async fn download_all(
        &self,
        segments: &[SegmentRef],
        target_dir: &Path,
        key: Option<Bytes>,
    ) -> Result<()> {
        let total = segments.len();
        info!(
            total,
            concurrency = self.download_concurrency,
            encrypted = key.is_some(),
            "Starting segment downloads"
        );

        let semaphore = Arc::new(Semaphore::new(self.download_concurrency));
        let state = Arc::new(Mutex::new(BatchState::default()));
        let job = SegmentJob {
            fetcher: Arc::clone(&self.fetcher),
            token: self.token.clone(),
            key,
            target_dir: target_dir.to_path_buf(),
            max_attempts: self.max_attempts,
            retry_delay_unit: self.retry_delay_unit,
        };

        let mut workers = JoinSet::new();
        for segment in segments.iter().cloned() {
            let job = job.clone();
            let semaphore = Arc::clone(&semaphore);
            let state = Arc::clone(&state);
            let progress = Arc::clone(&self.progress);

            workers.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                if job.token.is_cancelled() {
                    return;
                }

                let result = job.run(&segment).await;

                let mut state = state.lock();
                match result {
                    Ok(()) | Err(M3u8Error::Cancelled) => {}
                    Err(e) => {
                        error!(segment = %segment.name, url = %segment.url, error = %e, "Segment failed after all attempts");
                        if state.first_error.is_none() {
                            state.first_error = Some(e);
                        }
                    }
                }
                state.completed += 1;
                progress.set_fraction(state.completed, total);
            });
        }

        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => {
                    info!("Cancellation requested, aborting segment workers");
                    workers.abort_all();
                    return Err(M3u8Error::Cancelled);
                }
                joined = workers.join_next() => match joined {
                    Some(Ok(())) => {}
                    Some(Err(e)) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                    Some(Err(_)) => {}
                    None => break,
                }
            }
        }

        let mut state = state.lock();
        match state.first_error.take() {
            Some(e) => Err(e),
            None => {
                info!(total, "All segments downloaded");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PAYLOAD: &[u8] = &[0x47, 0x40, 0x00, 0x10, 0x00];

    /// Serves `PAYLOAD` for every URL, after a configurable number of failures.
    #[derive(Default)]
    struct ScriptedFetcher {
        failures_before_success: HashMap<String, usize>,
        always_fail: HashSet<String>,
        calls: Mutex<HashMap<String, usize>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        latency: Duration,
    }

    impl ScriptedFetcher {
        fn calls(&self, url: &str) -> usize {
            self.calls.lock().get(url).copied().unwrap_or_default()
        }
    }

    #[async_trait]
    impl ResourceFetcher for ScriptedFetcher {
        async fn fetch(&self, url: &str) -> Result<Bytes> {
            let call = {
                let mut calls = self.calls.lock();
                let entry = calls.entry(url.to_string()).or_default();
                *entry += 1;
                *entry
            };

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let failures = self
                .failures_before_success
                .get(url)
                .copied()
                .unwrap_or_default();
            if self.always_fail.contains(url) || call <= failures {
                return Err(M3u8Error::Resolution(format!("scripted failure #{call}")));
            }
            Ok(Bytes::from_static(PAYLOAD))
        }
    }

    fn segments(count: usize) -> Vec<SegmentRef> {
        (1..=count)
            .map(|idx| SegmentRef {
                name: SegmentRef::file_name(idx),
                url: format!("http://h/{idx}.ts"),
            })
            .collect()
    }

    fn scheduler(
        fetcher: Arc<ScriptedFetcher>,
        progress: Arc<ProgressState>,
        token: CancellationToken,
        retry_delay_unit: Duration,
    ) -> SegmentScheduler {
        let config = SessionConfig::builder()
            .with_retry_delay_unit(retry_delay_unit)
            .build();
        SegmentScheduler::new(&config, fetcher, progress, token)
    }

    #[tokio::test]
    async fn test_segment_succeeds_on_fourth_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let mut fetcher = ScriptedFetcher::default();
        fetcher
            .failures_before_success
            .insert("http://h/1.ts".to_string(), 3);
        let fetcher = Arc::new(fetcher);
        let progress = Arc::new(ProgressState::new());

        let result = scheduler(
            Arc::clone(&fetcher),
            Arc::clone(&progress),
            CancellationToken::new(),
            Duration::from_millis(1),
        )
        .download_all(&segments(1), dir.path(), None)
        .await;

        assert!(result.is_ok());
        assert_eq!(fetcher.calls("http://h/1.ts"), 4);
        assert_eq!(std::fs::read(dir.path().join("00001.ts")).unwrap(), PAYLOAD);
        assert_eq!(progress.snapshot().percent, 100);
    }

    #[tokio::test]
    async fn test_one_failure_still_counts_every_segment() {
        let dir = tempfile::tempdir().unwrap();
        let mut fetcher = ScriptedFetcher::default();
        fetcher.always_fail.insert("http://h/4.ts".to_string());
        let fetcher = Arc::new(fetcher);
        let progress = Arc::new(ProgressState::new());

        let result = scheduler(
            Arc::clone(&fetcher),
            Arc::clone(&progress),
            CancellationToken::new(),
            Duration::from_millis(1),
        )
        .download_all(&segments(10), dir.path(), None)
        .await;

        assert!(matches!(result, Err(M3u8Error::Resolution(_))));
        assert_eq!(progress.snapshot().percent, 100);
        assert_eq!(fetcher.calls("http://h/4.ts"), 5);
        for idx in (1..=10).filter(|idx| *idx != 4) {
            assert!(dir.path().join(SegmentRef::file_name(idx)).exists());
        }
        assert!(!dir.path().join("00004.ts").exists());
    }

    #[tokio::test]
    async fn test_existing_segment_is_not_refetched() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("00001.ts"), b"cached").unwrap();
        let fetcher = Arc::new(ScriptedFetcher::default());

        scheduler(
            Arc::clone(&fetcher),
            Arc::new(ProgressState::new()),
            CancellationToken::new(),
            Duration::from_millis(1),
        )
        .download_all(&segments(2), dir.path(), None)
        .await
        .unwrap();

        assert_eq!(fetcher.calls("http://h/1.ts"), 0);
        assert_eq!(fetcher.calls("http://h/2.ts"), 1);
        assert_eq!(std::fs::read(dir.path().join("00001.ts")).unwrap(), b"cached");
    }

    #[tokio::test]
    async fn test_concurrency_ceiling_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(ScriptedFetcher {
            latency: Duration::from_millis(20),
            ..Default::default()
        });
        let config = SessionConfig::builder().with_download_concurrency(3).build();
        let scheduler = SegmentScheduler::new(
            &config,
            Arc::clone(&fetcher) as Arc<dyn ResourceFetcher>,
            Arc::new(ProgressState::new()),
            CancellationToken::new(),
        );

        scheduler
            .download_all(&segments(12), dir.path(), None)
            .await
            .unwrap();

        let max = fetcher.max_in_flight.load(Ordering::SeqCst);
        assert!(max <= 3, "saw {max} concurrent fetches");
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_backoff() {
        let dir = tempfile::tempdir().unwrap();
        let mut fetcher = ScriptedFetcher::default();
        fetcher.always_fail.insert("http://h/1.ts".to_string());
        let fetcher = Arc::new(fetcher);
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let started = std::time::Instant::now();
        let result = scheduler(
            Arc::clone(&fetcher),
            Arc::new(ProgressState::new()),
            token,
            Duration::from_secs(60),
        )
        .download_all(&segments(1), dir.path(), None)
        .await;

        assert!(matches!(result, Err(M3u8Error::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(fetcher.calls("http://h/1.ts"), 1);
    }

    struct JunkPrefixedFetcher;

    #[async_trait]
    impl ResourceFetcher for JunkPrefixedFetcher {
        async fn fetch(&self, _url: &str) -> Result<Bytes> {
            let mut body = b"ID3junk".to_vec();
            body.extend_from_slice(PAYLOAD);
            Ok(Bytes::from(body))
        }
    }

    #[tokio::test]
    async fn test_downloaded_segment_is_realigned() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = SegmentScheduler::new(
            &SessionConfig::default(),
            Arc::new(JunkPrefixedFetcher),
            Arc::new(ProgressState::new()),
            CancellationToken::new(),
        );

        scheduler
            .download_all(&segments(1), dir.path(), None)
            .await
            .unwrap();

        assert_eq!(std::fs::read(dir.path().join("00001.ts")).unwrap(), PAYLOAD);
        assert!(!dir.path().join("00001.ts.tmp").exists());
    }
}
