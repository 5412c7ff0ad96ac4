//! Typed encode job description.
//!
//! [`build`] turns a plan into a [`JobSpec`]; [`crate::args`] serializes it
//! into the encoder's argument vector. Keeping the two apart means codec and
//! rate decisions are testable without string matching on command lines.

use std::path::{Path, PathBuf};

use abr_core::config::PackagingConfig;
use abr_core::{ItemId, Ladder};

use crate::error::{PackError, PackResult};
use crate::planner::{AudioPlan, PlannedRendition, RenditionKind};

/// One packaging unit: an item, the ladder name, and the resolved ladder.
#[derive(Debug, Clone)]
pub struct PackagingRequest {
    pub item_id: ItemId,
    pub profile_name: String,
    pub ladder: Ladder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentFormat {
    MpegTs,
    Fmp4,
}

impl SegmentFormat {
    pub fn from_fmp4_flag(use_fmp4: bool) -> Self {
        if use_fmp4 {
            Self::Fmp4
        } else {
            Self::MpegTs
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::MpegTs => "ts",
            Self::Fmp4 => "m4s",
        }
    }

    /// Value of the muxer's `-hls_segment_type` option.
    pub fn hls_segment_type(self) -> &'static str {
        match self {
            Self::MpegTs => "mpegts",
            Self::Fmp4 => "fmp4",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoEncoding {
    Copy,
    Encode(VideoParams),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoParams {
    /// Encoder library, e.g. `libx265`.
    pub encoder: String,
    pub bitrate: u64,
    pub maxrate: u64,
    pub bufsize: u64,
    /// `scale=...` filter; `None` keeps the source resolution.
    pub scale_filter: Option<String>,
    pub profile: Option<String>,
    pub pix_fmt: String,
    pub preset: String,
    /// Tag HEVC as `hvc1` so Apple players accept it.
    pub hvc1_tag: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioEncoding {
    Copy,
    Encode {
        codec: String,
        bitrate: u64,
        channels: u32,
    },
}

/// One output rendition.
///
/// `video_ordinal` and `audio_ordinal` number the output streams per type,
/// which is how the muxer addresses per-stream options and variant maps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenditionSpec {
    pub index: usize,
    pub name: String,
    pub kind: RenditionKind,
    pub video: Option<VideoEncoding>,
    pub video_ordinal: Option<usize>,
    pub audio: Option<AudioEncoding>,
    pub audio_ordinal: Option<usize>,
    /// Source audio stream mapped into this rendition.
    pub audio_source: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantEntry {
    pub index: usize,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    pub renditions: Vec<RenditionSpec>,
    pub variant_map: Vec<VariantEntry>,
    pub segment_format: SegmentFormat,
    pub segment_duration_seconds: u32,
}

impl JobSpec {
    /// Rendition subdirectory names, in variant order.
    pub fn rendition_names(&self) -> impl Iterator<Item = &str> {
        self.variant_map.iter().map(|v| v.name.as_str())
    }

    /// Keyframe expression forcing an IDR at every segment boundary.
    pub fn keyframe_expr(&self) -> String {
        format!("expr:gte(t,n_forced*{})", self.segment_duration_seconds)
    }
}

/// Build the job spec for a plan.
///
/// An empty plan is rejected before this point with
/// [`PackError::EmptyPlan`]; reaching here with one is an internal error.
pub fn build(
    request: &PackagingRequest,
    input_path: &Path,
    output_dir: &Path,
    plan: &[PlannedRendition],
    config: &PackagingConfig,
) -> PackResult<JobSpec> {
    if plan.is_empty() {
        return Err(PackError::Internal(format!(
            "no renditions planned for item {}",
            request.item_id
        )));
    }

    let mut renditions = Vec::with_capacity(plan.len());
    let mut video_count = 0;
    let mut audio_count = 0;

    for planned in plan {
        let video = match planned.kind {
            RenditionKind::Video => Some(video_encoding(planned, request.ladder.hdr, config)),
            RenditionKind::AudioOnly => None,
        };
        let audio = planned.audio.as_ref().map(audio_encoding);

        let video_ordinal = video.as_ref().map(|_| {
            video_count += 1;
            video_count - 1
        });
        let audio_ordinal = audio.as_ref().map(|_| {
            audio_count += 1;
            audio_count - 1
        });

        renditions.push(RenditionSpec {
            index: planned.index,
            name: planned.name().to_string(),
            kind: planned.kind,
            video,
            video_ordinal,
            audio_source: audio.as_ref().map(|_| planned.audio_stream),
            audio,
            audio_ordinal,
        });
    }

    let variant_map = renditions
        .iter()
        .map(|r| VariantEntry {
            index: r.index,
            name: r.name.clone(),
        })
        .collect();

    Ok(JobSpec {
        input_path: input_path.to_path_buf(),
        output_dir: output_dir.to_path_buf(),
        renditions,
        variant_map,
        segment_format: SegmentFormat::from_fmp4_flag(config.use_fmp4),
        segment_duration_seconds: config.segment_duration(),
    })
}

fn video_encoding(planned: &PlannedRendition, hdr: bool, config: &PackagingConfig) -> VideoEncoding {
    let profile = &planned.profile;
    if profile.copy_video {
        return VideoEncoding::Copy;
    }

    let encoder = video_encoder(&profile.video_codec);
    let is_hevc = encoder == "libx265";
    let ten_bit = hdr && is_hevc;

    let codec_profile = match encoder.as_str() {
        "libx265" if ten_bit => Some("main10".to_string()),
        "libx265" => Some("main".to_string()),
        "libx264" => Some("high".to_string()),
        _ => None,
    };

    let scale_filter = (!profile.use_original_resolution && profile.width > 0 && profile.height > 0)
        .then(|| scale_filter(profile.width, profile.height));

    let maxrate = profile.max_bitrate.max(profile.target_bitrate);

    VideoEncoding::Encode(VideoParams {
        encoder,
        bitrate: profile.target_bitrate,
        maxrate,
        bufsize: maxrate.saturating_mul(2),
        scale_filter,
        profile: codec_profile,
        pix_fmt: if ten_bit { "yuv420p10le" } else { "yuv420p" }.to_string(),
        preset: config.video_preset.clone(),
        hvc1_tag: is_hevc,
    })
}

fn audio_encoding(plan: &AudioPlan) -> AudioEncoding {
    match plan {
        AudioPlan::Copy => AudioEncoding::Copy,
        AudioPlan::Transcode {
            codec,
            bitrate,
            channels,
        } => AudioEncoding::Encode {
            codec: codec.clone(),
            bitrate: *bitrate,
            channels: *channels,
        },
    }
}

/// Map a ladder codec name to the encoder library.
pub fn video_encoder(codec: &str) -> String {
    match codec.trim().to_ascii_lowercase().as_str() {
        "hevc" | "h265" | "x265" | "libx265" => "libx265".to_string(),
        "h264" | "avc" | "x264" | "libx264" => "libx264".to_string(),
        other => other.to_string(),
    }
}

/// Scale filter that fits inside `width`x`height` without ever enlarging.
pub fn scale_filter(width: u32, height: u32) -> String {
    format!(
        "scale=w={width}:h={height}:force_original_aspect_ratio=decrease:force_divisible_by=2"
    )
}
