//! Library events.
//!
//! [`EventBus`] wraps a `tokio::sync::broadcast` channel. The library watcher
//! publishes [`LibraryEvent`]s and the packaging listener subscribes to them.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::ids::ItemId;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LibraryEvent {
    /// A settled media file was registered in the catalog.
    ItemAdded { item_id: ItemId, path: PathBuf },
    /// A media file disappeared from disk.
    ItemRemoved { item_id: ItemId, path: PathBuf },
}

impl LibraryEvent {
    pub fn item_id(&self) -> ItemId {
        match self {
            Self::ItemAdded { item_id, .. } | Self::ItemRemoved { item_id, .. } => *item_id,
        }
    }
}

/// Fan-out channel for [`LibraryEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LibraryEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publish an event. Returns the number of subscribers that received it.
    pub fn publish(&self, event: LibraryEvent) -> usize {
        tracing::debug!(item_id = %event.item_id(), ?event, "Library event");
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LibraryEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
