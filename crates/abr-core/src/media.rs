//! Stream metadata shared by the catalog, the prober, and the planner.
//!
//! Codec names are kept as the lowercase strings ffprobe reports (`eac3`,
//! `truehd`, `dts`, ...) so unknown codecs pass through untouched.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// StreamKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
    Other,
}

impl StreamKind {
    /// Map an ffprobe `codec_type` value.
    pub fn from_codec_type(codec_type: &str) -> Self {
        match codec_type {
            "video" => Self::Video,
            "audio" => Self::Audio,
            "subtitle" => Self::Subtitle,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
            Self::Subtitle => write!(f, "subtitle"),
            Self::Other => write!(f, "other"),
        }
    }
}

// ---------------------------------------------------------------------------
// StreamInfo
// ---------------------------------------------------------------------------

/// One elementary stream of a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub kind: StreamKind,
    /// Lowercase codec name, e.g. `hevc`, `eac3`.
    pub codec: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub channels: Option<u32>,
    /// Disposition `default` flag.
    #[serde(default)]
    pub is_default: bool,
    pub language: Option<String>,
}

impl StreamInfo {
    pub fn video(codec: &str, width: u32, height: u32) -> Self {
        Self {
            kind: StreamKind::Video,
            codec: Some(codec.to_string()),
            width: Some(width),
            height: Some(height),
            channels: None,
            is_default: true,
            language: None,
        }
    }

    pub fn audio(codec: &str, channels: u32) -> Self {
        Self {
            kind: StreamKind::Audio,
            codec: Some(codec.to_string()),
            width: None,
            height: None,
            channels: Some(channels),
            is_default: false,
            language: None,
        }
    }

    #[must_use]
    pub fn with_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }
}
