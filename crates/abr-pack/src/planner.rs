//! Ladder planning.
//!
//! Filters a configured ladder against the probed source and decides, per
//! retained profile, what happens to the audio track.

use abr_core::config::PackagingConfig;
use abr_core::{Ladder, LadderProfile};

use crate::source::SourceCharacteristics;

/// Bitrate per channel for multichannel transcodes.
const PER_CHANNEL_BITRATE: u64 = 64_000;
const MIN_MULTICHANNEL_BITRATE: u64 = 192_000;
const MAX_MULTICHANNEL_BITRATE: u64 = 640_000;
const MAX_MULTICHANNEL_CHANNELS: u32 = 6;

/// Audio handling switches taken from the packaging config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanOptions {
    pub keep_eac3_if_present: bool,
    pub transcode_dts_to_ac3: bool,
    pub transcode_truehd_to_eac3: bool,
    pub add_stereo_aac_fallback: bool,
    pub fallback_aac_bitrate: u64,
}

impl From<&PackagingConfig> for PlanOptions {
    fn from(p: &PackagingConfig) -> Self {
        Self {
            keep_eac3_if_present: p.keep_eac3_if_present,
            transcode_dts_to_ac3: p.transcode_dts_to_ac3,
            transcode_truehd_to_eac3: p.transcode_truehd_to_eac3,
            add_stereo_aac_fallback: p.add_stereo_aac_fallback,
            fallback_aac_bitrate: p.fallback_aac_bitrate,
        }
    }
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self::from(&PackagingConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenditionKind {
    Video,
    AudioOnly,
}

/// What to do with the source's audio for one rendition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioPlan {
    Copy,
    Transcode {
        codec: String,
        bitrate: u64,
        channels: u32,
    },
}

impl AudioPlan {
    fn stereo_aac(bitrate: u64) -> Self {
        Self::Transcode {
            codec: "aac".to_string(),
            bitrate,
            channels: 2,
        }
    }
}

/// One rendition the encoder will produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRendition {
    /// Zero-based position among retained renditions.
    pub index: usize,
    pub kind: RenditionKind,
    pub profile: LadderProfile,
    /// `None` for a video-only rendition of a silent source.
    pub audio: Option<AudioPlan>,
    /// Source audio stream the rendition reads, counted among audio streams.
    pub audio_stream: usize,
}

impl PlannedRendition {
    pub fn name(&self) -> &str {
        &self.profile.name
    }
}

/// Plan the renditions for `ladder` against `source`, preserving ladder order.
///
/// An empty result means nothing can be encoded for this source.
pub fn plan(
    ladder: &Ladder,
    source: &SourceCharacteristics,
    opts: &PlanOptions,
) -> Vec<PlannedRendition> {
    let mut planned = Vec::new();

    for profile in &ladder.profiles {
        let (kind, audio) = if profile.is_audio_only() {
            if !opts.add_stereo_aac_fallback || !source.has_audio {
                tracing::debug!(profile = %profile.name, "Skipping audio-only rendition");
                continue;
            }
            (
                RenditionKind::AudioOnly,
                Some(AudioPlan::stereo_aac(audio_only_bitrate(profile, opts))),
            )
        } else {
            if profile.may_be_filtered_by_height() && profile.height > source.height {
                tracing::debug!(
                    profile = %profile.name,
                    profile_height = profile.height,
                    source_height = source.height,
                    "Skipping rendition above source height"
                );
                continue;
            }
            (RenditionKind::Video, decide_audio(profile, source, opts))
        };

        planned.push(PlannedRendition {
            index: planned.len(),
            kind,
            profile: profile.clone(),
            audio,
            audio_stream: source.audio_stream,
        });
    }

    planned
}

/// Audio decision for a video rendition.
pub fn decide_audio(
    profile: &LadderProfile,
    source: &SourceCharacteristics,
    opts: &PlanOptions,
) -> Option<AudioPlan> {
    if !source.has_audio {
        return None;
    }

    let codec = source.audio_codec.as_deref().unwrap_or("");

    if codec == "eac3" && opts.keep_eac3_if_present {
        return Some(AudioPlan::Copy);
    }

    let target = match codec {
        "dts" if opts.transcode_dts_to_ac3 => Some("ac3"),
        "truehd" if opts.transcode_truehd_to_eac3 => Some("eac3"),
        _ => None,
    };

    match target {
        Some(target) => {
            let channels = source
                .audio_channels
                .unwrap_or(MAX_MULTICHANNEL_CHANNELS)
                .clamp(1, MAX_MULTICHANNEL_CHANNELS);
            Some(AudioPlan::Transcode {
                codec: target.to_string(),
                bitrate: multichannel_bitrate(channels),
                channels,
            })
        }
        None => Some(AudioPlan::stereo_aac(opts.fallback_aac_bitrate)),
    }
}

/// Bitrate for a multichannel transcode, scaled by channel count.
pub fn multichannel_bitrate(channels: u32) -> u64 {
    (u64::from(channels) * PER_CHANNEL_BITRATE)
        .clamp(MIN_MULTICHANNEL_BITRATE, MAX_MULTICHANNEL_BITRATE)
}

/// The audio-only rendition honors its own ladder bitrate.
fn audio_only_bitrate(profile: &LadderProfile, opts: &PlanOptions) -> u64 {
    if profile.audio_bitrate > 0 {
        profile.audio_bitrate
    } else {
        opts.fallback_aac_bitrate
    }
}
