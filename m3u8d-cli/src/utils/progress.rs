use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use m3u8d_engine::SessionManager;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const REFRESH_INTERVAL: Duration = Duration::from_millis(200);

fn download_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} {msg}\n[{elapsed_precise}] [{bar:40.green/white}] {pos}%")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

/// Renders the session's phase title and percent until stopped.
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    pub fn new(disabled: bool) -> Self {
        let bar = if disabled {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(100)
        };
        bar.set_style(download_style());
        Self { bar }
    }

    /// Poll `manager` for progress until `stop` fires.
    pub fn spawn(self, manager: Arc<SessionManager>, stop: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(REFRESH_INTERVAL);
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = interval.tick() => self.render(&manager),
                }
            }
            self.render(&manager);
            self.bar.finish();
        })
    }

    fn render(&self, manager: &SessionManager) {
        let snapshot = manager.progress();
        self.bar.set_message(snapshot.title);
        self.bar.set_position(u64::from(snapshot.percent));
    }
}
