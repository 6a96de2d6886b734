use parking_lot::Mutex;

/// Title reported while no phase has been published.
pub const DEFAULT_TITLE: &str = "Downloading";

/// Point-in-time copy of the progress state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub title: String,
    /// 0..=100
    pub percent: u8,
}

#[derive(Debug, Default)]
struct Inner {
    title: Option<String>,
    percent: u8,
}

/// Phase title and completion percent, shared between the session and its workers.
#[derive(Debug, Default)]
pub struct ProgressState {
    inner: Mutex<Inner>,
}

impl ProgressState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let inner = self.inner.lock();
        ProgressSnapshot {
            title: inner
                .title
                .clone()
                .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            percent: inner.percent,
        }
    }

    pub fn set_title(&self, title: impl Into<String>) {
        self.inner.lock().title = Some(title.into());
    }

    pub fn reset_title(&self) {
        self.inner.lock().title = None;
    }

    /// Publish `completed / total` as a percentage. A zero total is ignored.
    pub fn set_fraction(&self, completed: usize, total: usize) {
        if total == 0 {
            return;
        }
        let percent = (completed.min(total) * 100 / total) as u8;
        self.inner.lock().percent = percent;
    }
}
