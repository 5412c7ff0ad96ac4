//! Shared fixtures for packaging integration tests.
//!
//! [`Harness`] wires a [`Packager`] to an in-memory catalog holding one
//! source file inside a temp dir, plus a [`CountingEncoder`] double.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use abr_av::ThumbnailOptions;
use abr_core::{Config, StreamInfo};
use abr_pack::runner::create_rendition_dirs;
use abr_pack::{CatalogItem, Encoder, JobSpec, MemoryCatalog, PackError, PackResult, Packager};
use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// What the encoder double does when invoked.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Write the master and variant playlists after `delay`.
    Succeed { delay: Duration },
    /// Exit non-zero with a diagnostic, leaving a partial segment behind.
    Fail,
}

/// Encoder double counting invocations.
pub struct CountingEncoder {
    behavior: Mutex<Behavior>,
    pub encodes: AtomicUsize,
    /// Encodes running right now, and the most ever seen at once.
    pub active: AtomicUsize,
    pub peak: AtomicUsize,
    pub thumbnail_runs: AtomicUsize,
    /// Rendition names seen by the last encode, in variant order.
    pub last_renditions: Mutex<Vec<String>>,
}

impl CountingEncoder {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            encodes: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            thumbnail_runs: AtomicUsize::new(0),
            last_renditions: Mutex::new(Vec::new()),
        }
    }

    pub fn set_behavior(&self, behavior: Behavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn encodes(&self) -> usize {
        self.encodes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Encoder for CountingEncoder {
    async fn encode(&self, spec: &JobSpec, cancel: CancellationToken) -> PackResult<()> {
        self.encodes.fetch_add(1, Ordering::SeqCst);
        *self.last_renditions.lock() = spec.rendition_names().map(str::to_string).collect();
        create_rendition_dirs(spec).await?;

        let behavior = self.behavior.lock().clone();
        match behavior {
            Behavior::Succeed { delay } => {
                let running = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(running, Ordering::SeqCst);
                let cancelled = tokio::select! {
                    _ = tokio::time::sleep(delay) => false,
                    _ = cancel.cancelled() => true,
                };
                self.active.fetch_sub(1, Ordering::SeqCst);
                if cancelled {
                    return Err(PackError::Cancelled);
                }
                for name in spec.rendition_names() {
                    std::fs::write(spec.output_dir.join(name).join("index.m3u8"), "#EXTM3U\n")
                        .map_err(|e| PackError::Internal(e.to_string()))?;
                }
                std::fs::write(spec.output_dir.join("master.m3u8"), "#EXTM3U\n")
                    .map_err(|e| PackError::Internal(e.to_string()))?;
                Ok(())
            }
            Behavior::Fail => {
                if let Some(first) = spec.rendition_names().next() {
                    let _ = std::fs::write(spec.output_dir.join(first).join("seg_00000.m4s"), b"");
                }
                Err(PackError::EncoderExit {
                    status: Some(1),
                    stderr: "Invalid data found when processing input".into(),
                })
            }
        }
    }

    async fn thumbnails(
        &self,
        _input: &Path,
        _out_dir: &Path,
        _opts: ThumbnailOptions,
        _cancel: CancellationToken,
    ) -> PackResult<usize> {
        self.thumbnail_runs.fetch_add(1, Ordering::SeqCst);
        Err(PackError::Internal("no thumbnails in tests".into()))
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub catalog: Arc<MemoryCatalog>,
    pub encoder: Arc<CountingEncoder>,
    pub packager: Packager,
    pub item: CatalogItem,
}

impl Harness {
    /// A 1080p source with stereo AAC and the default config.
    pub fn new(behavior: Behavior) -> Self {
        Self::with(
            Config::default(),
            behavior,
            vec![
                StreamInfo::video("h264", 1920, 1080),
                StreamInfo::audio("aac", 2).with_default(true),
            ],
        )
    }

    pub fn with(config: Config, behavior: Behavior, streams: Vec<StreamInfo>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("media");
        std::fs::create_dir_all(&media).unwrap();
        let source = media.join("Film.mkv");
        std::fs::write(&source, b"not really matroska").unwrap();

        let catalog = Arc::new(MemoryCatalog::new());
        let item = CatalogItem::from_path(&source);
        catalog.insert(item.clone(), streams);

        let encoder = Arc::new(CountingEncoder::new(behavior));
        let packager = Packager::new(Arc::new(config), catalog.clone(), encoder.clone());

        Self {
            dir,
            catalog,
            encoder,
            packager,
            item,
        }
    }

    /// Catalog another source in its own directory so its package does not
    /// share an output directory with the test item.
    pub fn add_item(&self, dir_name: &str) -> CatalogItem {
        let dir = self.dir.path().join(dir_name);
        std::fs::create_dir_all(&dir).unwrap();
        let source = dir.join("Film.mkv");
        std::fs::write(&source, b"not really matroska").unwrap();
        let item = CatalogItem::from_path(&source);
        self.catalog.insert(
            item.clone(),
            vec![
                StreamInfo::video("h264", 1920, 1080),
                StreamInfo::audio("aac", 2),
            ],
        );
        item
    }

    /// Where the `profile` package of the test item lands.
    pub fn out_dir(&self, profile: &str) -> PathBuf {
        self.dir.path().join("media").join("abr_hls").join(profile)
    }
}

pub fn instant() -> Behavior {
    Behavior::Succeed {
        delay: Duration::ZERO,
    }
}
