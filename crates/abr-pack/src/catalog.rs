//! Media catalog seam.
//!
//! The packager only needs two things from a catalog: the item's file path
//! and its stream metadata. [`MemoryCatalog`] is an in-process implementation
//! used by one-shot CLI runs and tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use abr_core::{ItemId, StreamInfo};
use async_trait::async_trait;
use dashmap::DashMap;

/// A catalogued source item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    pub id: ItemId,
    /// Source file; `None` for items the catalog knows but cannot locate.
    pub path: Option<PathBuf>,
    pub name: String,
}

impl CatalogItem {
    /// Item for a file on disk, with a path-derived id.
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            id: ItemId::from_path(path),
            path: Some(path.to_path_buf()),
            name,
        }
    }
}

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get_item(&self, id: ItemId) -> Option<CatalogItem>;

    /// Stream metadata of an item's source file.
    async fn streams(&self, item: &CatalogItem) -> abr_core::Result<Vec<StreamInfo>>;
}

#[async_trait]
impl<C: Catalog + ?Sized> Catalog for Arc<C> {
    async fn get_item(&self, id: ItemId) -> Option<CatalogItem> {
        (**self).get_item(id).await
    }

    async fn streams(&self, item: &CatalogItem) -> abr_core::Result<Vec<StreamInfo>> {
        (**self).streams(item).await
    }
}

/// Catalog with fixed, in-memory stream metadata.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    items: DashMap<ItemId, (CatalogItem, Vec<StreamInfo>)>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, item: CatalogItem, streams: Vec<StreamInfo>) {
        self.items.insert(item.id, (item, streams));
    }

    pub fn remove(&self, id: ItemId) -> Option<CatalogItem> {
        self.items.remove(&id).map(|(_, (item, _))| item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn get_item(&self, id: ItemId) -> Option<CatalogItem> {
        self.items.get(&id).map(|entry| entry.0.clone())
    }

    async fn streams(&self, item: &CatalogItem) -> abr_core::Result<Vec<StreamInfo>> {
        self.items
            .get(&item.id)
            .map(|entry| entry.1.clone())
            .ok_or_else(|| abr_core::Error::not_found("item", item.id))
    }
}
