//! Quality levels that exist on disk.

use std::path::Path;

use abr_core::Ladder;
use serde::Serialize;

use crate::paths::VARIANT_PLAYLIST;

/// One materialized rendition, as reported to players.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualityLevel {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub bitrate: u64,
    pub max_bitrate: u64,
    pub audio_only: bool,
    /// Playlist path relative to the output directory.
    pub playlist: String,
}

/// Ladder entries whose variant playlist exists under `out_dir`, in ladder
/// order.
pub fn available_levels(ladder: &Ladder, out_dir: &Path) -> Vec<QualityLevel> {
    ladder
        .profiles
        .iter()
        .filter(|p| out_dir.join(&p.name).join(VARIANT_PLAYLIST).is_file())
        .map(|p| QualityLevel {
            name: p.name.clone(),
            width: p.width,
            height: p.height,
            bitrate: p.target_bitrate,
            max_bitrate: p.max_bitrate,
            audio_only: p.is_audio_only(),
            playlist: format!("{}/{}", p.name, VARIANT_PLAYLIST),
        })
        .collect()
}
