//! Shared fixtures for HTTP tests.
//!
//! [`TestApp`] serves one catalogued source file from a temp dir through a
//! [`Packager`] backed by [`FakeEncoder`].

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use abr_core::{Config, StreamInfo};
use abr_pack::runner::create_rendition_dirs;
use abr_pack::{CatalogItem, Encoder, JobSpec, MemoryCatalog, PackError, PackResult, Packager};
use abrhls::server::{create_router, AppState};
use async_trait::async_trait;
use axum::body::Body;
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Writes playlists and one segment per rendition after `delay`.
pub struct FakeEncoder {
    pub delay: Duration,
    pub encodes: AtomicUsize,
}

#[async_trait]
impl Encoder for FakeEncoder {
    async fn encode(&self, spec: &JobSpec, cancel: CancellationToken) -> PackResult<()> {
        self.encodes.fetch_add(1, Ordering::SeqCst);
        create_rendition_dirs(spec).await?;
        tokio::select! {
            _ = tokio::time::sleep(self.delay) => {}
            _ = cancel.cancelled() => return Err(PackError::Cancelled),
        }
        let write = |path: PathBuf, body: &str| {
            std::fs::write(path, body).map_err(|e| PackError::Internal(e.to_string()))
        };
        for name in spec.rendition_names() {
            let dir = spec.output_dir.join(name);
            write(dir.join("index.m3u8"), "#EXTM3U\n#EXT-X-VERSION:7\n")?;
            write(dir.join("seg_00000.m4s"), "segment")?;
        }
        write(spec.output_dir.join("master.m3u8"), "#EXTM3U\n")
    }
}

pub struct TestApp {
    pub dir: TempDir,
    pub item: CatalogItem,
    pub encoder: Arc<FakeEncoder>,
    pub packager: Packager,
    pub router: Router,
}

impl TestApp {
    pub fn new(delay: Duration, manifest_wait: Duration) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("Film.mkv");
        std::fs::write(&source, b"not really matroska").unwrap();

        let catalog = Arc::new(MemoryCatalog::new());
        let item = CatalogItem::from_path(&source);
        catalog.insert(
            item.clone(),
            vec![
                StreamInfo::video("h264", 1280, 720),
                StreamInfo::audio("aac", 2),
            ],
        );

        let encoder = Arc::new(FakeEncoder {
            delay,
            encodes: AtomicUsize::new(0),
        });
        let packager = Packager::new(Arc::new(Config::default()), catalog, encoder.clone());
        let state = AppState::new(packager.clone(), CancellationToken::new())
            .with_manifest_wait(manifest_wait);

        Self {
            router: create_router(state),
            dir,
            item,
            encoder,
            packager,
        }
    }

    /// A package that finishes well within the manifest wait.
    pub fn fast() -> Self {
        Self::new(Duration::ZERO, Duration::from_secs(10))
    }

    pub fn out_dir(&self, profile: &str) -> PathBuf {
        self.dir.path().join("abr_hls").join(profile)
    }

    pub fn url(&self, profile: &str, rel: &str) -> String {
        format!("/abr/{}/{}/{}", profile, self.item.id, rel)
    }

    pub fn encodes(&self) -> usize {
        self.encoder.encodes.load(Ordering::SeqCst)
    }
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = body.collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
