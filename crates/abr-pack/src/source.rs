//! Source characteristics.
//!
//! Probing never fails: metadata errors fall back to defaults so packaging is
//! never blocked by an unreadable stream list.

use std::sync::Arc;

use abr_core::{StreamInfo, StreamKind};
use async_trait::async_trait;

use crate::catalog::{Catalog, CatalogItem};

/// Height assumed when the source video height is unknown.
pub const DEFAULT_SOURCE_HEIGHT: u32 = 1080;

/// The facts about a source that drive ladder planning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCharacteristics {
    pub height: u32,
    /// Codec of the default audio stream, lowercase.
    pub audio_codec: Option<String>,
    pub audio_channels: Option<u32>,
    /// Position of that stream among the source's audio streams (`0:a:N`).
    pub audio_stream: usize,
    /// False only when metadata was read and lists no audio stream.
    pub has_audio: bool,
}

impl Default for SourceCharacteristics {
    fn default() -> Self {
        Self {
            height: DEFAULT_SOURCE_HEIGHT,
            audio_codec: None,
            audio_channels: None,
            audio_stream: 0,
            has_audio: true,
        }
    }
}

impl SourceCharacteristics {
    /// Derive characteristics from a stream list.
    ///
    /// The default-flagged stream of each kind wins, else the first one. An
    /// empty list carries no information and yields the defaults.
    pub fn from_streams(streams: &[StreamInfo]) -> Self {
        if streams.is_empty() {
            return Self::default();
        }

        let height = pick(streams, StreamKind::Video)
            .and_then(|(_, s)| s.height)
            .filter(|h| *h > 0)
            .unwrap_or(DEFAULT_SOURCE_HEIGHT);

        match pick(streams, StreamKind::Audio) {
            Some((audio_stream, audio)) => Self {
                height,
                audio_codec: audio.codec.clone(),
                audio_channels: audio.channels.filter(|c| *c > 0),
                audio_stream,
                has_audio: true,
            },
            None => Self {
                height,
                audio_codec: None,
                audio_channels: None,
                audio_stream: 0,
                has_audio: false,
            },
        }
    }
}

/// The chosen stream of `kind` with its index among streams of that kind.
fn pick(streams: &[StreamInfo], kind: StreamKind) -> Option<(usize, &StreamInfo)> {
    let mut of_kind = streams.iter().filter(|s| s.kind == kind).enumerate();
    of_kind
        .clone()
        .find(|(_, s)| s.is_default)
        .or_else(|| of_kind.next())
}

#[async_trait]
pub trait SourceProbe: Send + Sync {
    async fn probe(&self, item: &CatalogItem) -> SourceCharacteristics;
}

/// Probe backed by the catalog's stream metadata.
pub struct CatalogProbe {
    catalog: Arc<dyn Catalog>,
}

impl CatalogProbe {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl SourceProbe for CatalogProbe {
    async fn probe(&self, item: &CatalogItem) -> SourceCharacteristics {
        match self.catalog.streams(item).await {
            Ok(streams) => SourceCharacteristics::from_streams(&streams),
            Err(e) => {
                tracing::warn!(
                    item_id = %item.id,
                    error = %e,
                    "Could not read stream metadata; using defaults"
                );
                SourceCharacteristics::default()
            }
        }
    }
}
