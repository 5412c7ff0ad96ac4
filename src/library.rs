//! Filesystem-backed media catalog.
//!
//! Items are media files found under the configured library roots. Ids are
//! UUID v5 of the canonical path, so they survive restarts without any
//! persisted state. Stream metadata is read with ffprobe on first use and
//! cached until the item is re-registered.

use std::path::{Path, PathBuf};

use abr_av::FfprobeProber;
use abr_core::{ItemId, StreamInfo};
use abr_pack::paths::COLOCATED_DIR;
use abr_pack::{Catalog, CatalogItem};
use async_trait::async_trait;
use dashmap::DashMap;
use walkdir::WalkDir;

/// Extensions used when the config lists none.
pub const DEFAULT_EXTENSIONS: &[&str] = &["mkv", "mp4", "avi", "mov", "wmv", "m4v", "ts", "m2ts"];

/// Check if a file has a media extension.
pub fn is_media_file(path: &Path, extensions: &[String]) -> bool {
    let Some(ext) = path.extension() else {
        return false;
    };
    let ext = ext.to_string_lossy().to_lowercase();

    if extensions.is_empty() {
        return DEFAULT_EXTENSIONS.contains(&ext.as_str());
    }
    extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext))
}

/// Whether `path` lies inside a packaged output directory next to a source.
pub fn is_packaged_output(path: &Path) -> bool {
    path.components()
        .any(|c| c.as_os_str() == std::ffi::OsStr::new(COLOCATED_DIR))
}

pub struct LibraryCatalog {
    items: DashMap<ItemId, CatalogItem>,
    streams: DashMap<ItemId, Vec<StreamInfo>>,
    prober: FfprobeProber,
    extensions: Vec<String>,
}

impl LibraryCatalog {
    pub fn new(prober: FfprobeProber, extensions: Vec<String>) -> Self {
        Self {
            items: DashMap::new(),
            streams: DashMap::new(),
            prober,
            extensions,
        }
    }

    /// Media files outside packaged output directories.
    pub fn is_media_file(&self, path: &Path) -> bool {
        !is_packaged_output(path) && is_media_file(path, &self.extensions)
    }

    /// Walk `roots` and register every media file. Returns the number of
    /// items found.
    pub fn scan(&self, roots: &[PathBuf]) -> usize {
        let mut found = 0;
        for root in roots {
            if !root.exists() {
                tracing::warn!("Library root does not exist: {}", root.display());
                continue;
            }
            let walker = WalkDir::new(root)
                .follow_links(true)
                .into_iter()
                .filter_entry(|e| e.depth() == 0 || e.file_name() != COLOCATED_DIR);
            for entry in walker {
                let entry = match entry {
                    Ok(e) => e,
                    Err(e) => {
                        tracing::debug!("Skipping unreadable entry: {e}");
                        continue;
                    }
                };
                if entry.file_type().is_file() && self.is_media_file(entry.path()) {
                    self.register(entry.path());
                    found += 1;
                }
            }
            tracing::info!(root = %root.display(), "Library root scanned");
        }
        found
    }

    /// Add or refresh the item for `path`.
    pub fn register(&self, path: &Path) -> CatalogItem {
        let path = canonical(path);
        let item = CatalogItem::from_path(&path);
        self.streams.remove(&item.id);
        self.items.insert(item.id, item.clone());
        tracing::debug!(item_id = %item.id, path = %path.display(), "Item registered");
        item
    }

    /// Forget the item for `path`, if any.
    pub fn remove_path(&self, path: &Path) -> Option<CatalogItem> {
        let id = ItemId::from_path(&canonical(path));
        self.streams.remove(&id);
        self.items.remove(&id).map(|(_, item)| item)
    }

    /// Look an item up by id, or by file path when `target` is not an id.
    pub fn resolve(&self, target: &str) -> Option<CatalogItem> {
        if let Ok(id) = target.parse::<ItemId>() {
            return self.items.get(&id).map(|i| i.clone());
        }
        let path = Path::new(target);
        if path.is_file() {
            Some(self.register(path))
        } else {
            None
        }
    }

    /// All items, sorted by name.
    pub fn items(&self) -> Vec<CatalogItem> {
        let mut items: Vec<CatalogItem> = self.items.iter().map(|e| e.value().clone()).collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Paths are identified in canonical form; files that vanished keep the
/// path as given.
fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[async_trait]
impl Catalog for LibraryCatalog {
    async fn get_item(&self, id: ItemId) -> Option<CatalogItem> {
        self.items.get(&id).map(|i| i.clone())
    }

    async fn streams(&self, item: &CatalogItem) -> abr_core::Result<Vec<StreamInfo>> {
        if let Some(cached) = self.streams.get(&item.id) {
            return Ok(cached.clone());
        }
        let path = item
            .path
            .as_deref()
            .ok_or_else(|| abr_core::Error::not_found("file for item", item.id))?;

        let streams = self.prober.streams(path).await?;
        self.streams.insert(item.id, streams.clone());
        Ok(streams)
    }
}
