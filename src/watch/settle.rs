use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Tracks files and determines when they've "settled" (stopped changing).
#[derive(Debug)]
pub struct FileSettleTracker {
    /// Path to last observed change.
    pending: HashMap<PathBuf, Instant>,
    settle_duration: Duration,
}

impl FileSettleTracker {
    pub fn new(settle_duration: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            settle_duration,
        }
    }

    /// Record that a file was modified.
    pub fn file_changed(&mut self, path: PathBuf) {
        self.pending.insert(path, Instant::now());
    }

    /// Stop tracking a file (e.g. it was deleted before settling).
    pub fn remove(&mut self, path: &Path) {
        self.pending.remove(path);
    }

    /// Remove and return files unchanged for the settle duration as of `now`.
    pub fn take_settled(&mut self, now: Instant) -> Vec<PathBuf> {
        let mut settled = Vec::new();
        self.pending.retain(|path, last_change| {
            if now.saturating_duration_since(*last_change) >= self.settle_duration {
                settled.push(path.clone());
                false
            } else {
                true
            }
        });
        settled.sort();
        settled
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
