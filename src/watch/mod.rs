//! Library watcher.
//!
//! Watches the library roots for new media files, waits for them to settle,
//! then registers them in the catalog and announces them on the event bus.
//! Deleted files are dropped from the catalog. Files inside packaged output
//! directories are ignored.

pub mod settle;

pub use settle::FileSettleTracker;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use abr_core::{Config, EventBus, LibraryEvent};
use anyhow::{Context, Result};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::library::LibraryCatalog;

const CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Watch `config.library.roots` until `cancel` fires.
pub async fn run_watcher(
    config: Arc<Config>,
    library: Arc<LibraryCatalog>,
    bus: EventBus,
    cancel: CancellationToken,
) -> Result<()> {
    let lib_config = &config.library;
    if !lib_config.watch || lib_config.roots.is_empty() {
        tracing::info!("Library watcher disabled or no roots configured");
        return Ok(());
    }

    let tracker = Arc::new(Mutex::new(FileSettleTracker::new(Duration::from_secs(
        lib_config.settle_time_secs,
    ))));
    let (removed_tx, mut removed_rx) = mpsc::unbounded_channel::<PathBuf>();

    let callback_tracker = tracker.clone();
    let callback_library = library.clone();
    let mut watcher: RecommendedWatcher =
        notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let Ok(event) = res else {
                return;
            };
            match event.kind {
                EventKind::Create(_) | EventKind::Modify(_) => {
                    let mut tracker = callback_tracker.lock();
                    for path in event.paths {
                        if callback_library.is_media_file(&path) {
                            tracker.file_changed(path);
                        }
                    }
                }
                EventKind::Remove(_) => {
                    let mut tracker = callback_tracker.lock();
                    for path in event.paths {
                        tracker.remove(&path);
                        let _ = removed_tx.send(path);
                    }
                }
                _ => {}
            }
        })
        .context("Failed to create file watcher")?;

    for root in &lib_config.roots {
        if root.exists() {
            watcher
                .watch(root, RecursiveMode::Recursive)
                .with_context(|| format!("Failed to watch path: {}", root.display()))?;
            tracing::info!("Watching directory: {}", root.display());
        } else {
            tracing::warn!("Watch path does not exist: {}", root.display());
        }
    }

    let mut interval = tokio::time::interval(CHECK_INTERVAL);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            Some(path) = removed_rx.recv() => {
                handle_removed(&library, &bus, &path);
            }
            _ = interval.tick() => {
                let settled = tracker.lock().take_settled(Instant::now());
                for path in settled {
                    handle_settled(&library, &bus, &path);
                }
            }
        }
    }

    drop(watcher);
    tracing::info!("Library watcher stopped");
    Ok(())
}

/// Register a settled file and announce it. Returns whether it was added.
pub fn handle_settled(library: &LibraryCatalog, bus: &EventBus, path: &Path) -> bool {
    if !path.is_file() || !library.is_media_file(path) {
        return false;
    }
    let item = library.register(path);
    tracing::info!(item_id = %item.id, file = %path.display(), "New library item");
    bus.publish(LibraryEvent::ItemAdded {
        item_id: item.id,
        path: item.path.unwrap_or_else(|| path.to_path_buf()),
    });
    true
}

pub fn handle_removed(library: &LibraryCatalog, bus: &EventBus, path: &Path) -> bool {
    match library.remove_path(path) {
        Some(item) => {
            tracing::info!(item_id = %item.id, file = %path.display(), "Library item removed");
            bus.publish(LibraryEvent::ItemRemoved {
                item_id: item.id,
                path: path.to_path_buf(),
            });
            true
        }
        None => false,
    }
}
