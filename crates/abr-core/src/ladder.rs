//! Rendition ladders.
//!
//! A [`Ladder`] is an ordered list of [`LadderProfile`]s offered to a player,
//! plus the dynamic-range flag that decides 8-bit vs 10-bit encoding for the
//! whole ladder.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One target rendition in a ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LadderProfile {
    /// Unique label within the ladder; also the rendition's subdirectory name.
    pub name: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    /// Descriptive only; no rate-control lower bound is derived from it.
    #[serde(default)]
    pub min_bitrate: u64,
    #[serde(default)]
    pub target_bitrate: u64,
    #[serde(default)]
    pub max_bitrate: u64,
    /// Empty for audio-only profiles.
    #[serde(default)]
    pub video_codec: String,
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,
    #[serde(default)]
    pub audio_bitrate: u64,
    #[serde(default)]
    pub use_original_resolution: bool,
    #[serde(default)]
    pub copy_video: bool,
}

fn default_audio_codec() -> String {
    "aac".to_string()
}

impl LadderProfile {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: &str,
        width: u32,
        height: u32,
        min_bitrate: u64,
        target_bitrate: u64,
        max_bitrate: u64,
        video_codec: &str,
        audio_codec: &str,
        audio_bitrate: u64,
    ) -> Self {
        Self {
            name: name.to_string(),
            width,
            height,
            min_bitrate,
            target_bitrate,
            max_bitrate,
            video_codec: video_codec.to_string(),
            audio_codec: audio_codec.to_string(),
            audio_bitrate,
            use_original_resolution: false,
            copy_video: false,
        }
    }

    /// Mark the profile as "keep source resolution".
    #[must_use]
    pub fn original_resolution(mut self) -> Self {
        self.use_original_resolution = true;
        self
    }

    /// Mark the profile as a video stream copy.
    #[must_use]
    pub fn stream_copy(mut self) -> Self {
        self.copy_video = true;
        self
    }

    /// Whether this profile produces an audio-only rendition.
    pub fn is_audio_only(&self) -> bool {
        self.video_codec.trim().is_empty() || self.name.eq_ignore_ascii_case("audio")
    }

    /// Whether the never-upscale rule applies to this profile.
    pub fn may_be_filtered_by_height(&self) -> bool {
        !self.use_original_resolution && !self.copy_video
    }

    /// Rate-control buffer size (twice the peak bitrate).
    pub fn bufsize(&self) -> u64 {
        self.max_bitrate.saturating_mul(2)
    }
}

/// A named, ordered rendition ladder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ladder {
    /// Encode HDR-capable codecs with a 10-bit profile.
    #[serde(default)]
    pub hdr: bool,

    #[serde(default)]
    pub profiles: Vec<LadderProfile>,
}

impl Ladder {
    pub fn new(profiles: Vec<LadderProfile>) -> Self {
        Self {
            hdr: false,
            profiles,
        }
    }

    #[must_use]
    pub fn with_hdr(mut self, hdr: bool) -> Self {
        self.hdr = hdr;
        self
    }

    /// Look up a profile by name.
    pub fn profile(&self, name: &str) -> Option<&LadderProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// General-purpose H.264 ladder.
    pub fn default_ladder() -> Self {
        Self::new(vec![
            LadderProfile::new(
                "source", 0, 0, 12_000_000, 16_000_000, 32_000_000, "libx264", "aac", 192_000,
            )
            .original_resolution(),
            LadderProfile::new(
                "1080p", 1920, 1080, 6_000_000, 6_400_000, 12_000_000, "libx264", "aac", 128_000,
            ),
            LadderProfile::new(
                "720p", 1280, 720, 3_000_000, 3_200_000, 6_000_000, "libx264", "aac", 128_000,
            ),
            LadderProfile::new(
                "480p", 854, 480, 1_500_000, 1_800_000, 3_000_000, "libx264", "aac", 128_000,
            ),
        ])
    }

    /// UHD HEVC ladder for Fire TV devices, SDR.
    pub fn firetv_sdr() -> Self {
        Self::new(vec![
            LadderProfile::new(
                "2160p", 3840, 2160, 12_000_000, 14_000_000, 28_000_000, "hevc", "eac3", 640_000,
            ),
            LadderProfile::new(
                "1080p", 1920, 1080, 5_000_000, 6_000_000, 12_000_000, "hevc", "eac3", 448_000,
            ),
            LadderProfile::new(
                "720p", 1280, 720, 2_500_000, 3_000_000, 6_000_000, "hevc", "eac3", 320_000,
            ),
            LadderProfile::new("audio", 0, 0, 96_000, 128_000, 256_000, "", "aac", 96_000)
                .original_resolution(),
        ])
    }

    /// UHD HEVC ladder for Fire TV devices, HDR (10-bit).
    pub fn firetv_hdr() -> Self {
        Self::new(vec![
            LadderProfile::new(
                "2160p", 3840, 2160, 15_000_000, 18_000_000, 35_000_000, "hevc", "eac3", 640_000,
            ),
            LadderProfile::new(
                "1080p", 1920, 1080, 6_000_000, 7_000_000, 14_000_000, "hevc", "eac3", 448_000,
            ),
            LadderProfile::new("audio", 0, 0, 96_000, 128_000, 256_000, "", "aac", 96_000)
                .original_resolution(),
        ])
        .with_hdr(true)
    }

    /// Check name uniqueness and dimension rules.
    pub fn validate(&self, ladder_name: &str) -> Result<()> {
        let mut seen = HashSet::new();
        for profile in &self.profiles {
            if profile.name.trim().is_empty() {
                return Err(Error::Config(format!(
                    "Ladder '{ladder_name}' has a profile without a name"
                )));
            }
            if profile.name.contains(['/', '\\']) || profile.name == "." || profile.name == ".." {
                return Err(Error::Config(format!(
                    "Ladder '{ladder_name}': profile name '{}' is not a valid directory name",
                    profile.name
                )));
            }
            if !seen.insert(profile.name.as_str()) {
                return Err(Error::Config(format!(
                    "Ladder '{ladder_name}' has duplicate profile '{}'",
                    profile.name
                )));
            }
            let zero_dims = profile.width == 0 || profile.height == 0;
            if zero_dims
                && !profile.use_original_resolution
                && !profile.copy_video
                && !profile.is_audio_only()
            {
                return Err(Error::Config(format!(
                    "Ladder '{ladder_name}': profile '{}' needs width and height",
                    profile.name
                )));
            }
        }
        Ok(())
    }
}
