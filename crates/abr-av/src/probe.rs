//! FFprobe-backed stream reader.
//!
//! Shells out to `ffprobe -v quiet -print_format json -show_streams` and maps
//! the JSON output into [`StreamInfo`] values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use abr_core::{StreamInfo, StreamKind};
use serde::Deserialize;

use crate::command::ToolCommand;

const PROBE_TIMEOUT: Duration = Duration::from_secs(60);

/// A stream reader backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe_path: PathBuf,
}

impl FfprobeProber {
    pub fn new(ffprobe_path: PathBuf) -> Self {
        Self { ffprobe_path }
    }

    /// Create a prober that finds ffprobe on `PATH`.
    pub fn from_path() -> Option<Self> {
        which::which("ffprobe")
            .ok()
            .map(|p| Self { ffprobe_path: p })
    }

    /// Read the elementary streams of `path`.
    pub async fn streams(&self, path: &Path) -> abr_core::Result<Vec<StreamInfo>> {
        let mut cmd = ToolCommand::new(self.ffprobe_path.clone());
        cmd.args(["-v", "quiet", "-print_format", "json", "-show_streams"]);
        cmd.arg(path.to_string_lossy().as_ref());
        cmd.timeout(PROBE_TIMEOUT);

        let output = cmd.execute().await?;
        parse_streams(&output.stdout)
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    channels: Option<u32>,
    #[serde(default)]
    disposition: FfprobeDisposition,
    #[serde(default)]
    tags: FfprobeTags,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeDisposition {
    #[serde(default)]
    default: u8,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeTags {
    language: Option<String>,
}

/// Parse ffprobe's JSON into stream descriptions, in file order.
pub fn parse_streams(json: &str) -> abr_core::Result<Vec<StreamInfo>> {
    let ff: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| abr_core::Error::Probe(format!("ffprobe JSON parse error: {e}")))?;

    Ok(ff
        .streams
        .into_iter()
        .map(|s| StreamInfo {
            kind: StreamKind::from_codec_type(s.codec_type.as_deref().unwrap_or("")),
            codec: s.codec_name.map(|c| c.to_lowercase()),
            width: s.width,
            height: s.height,
            channels: s.channels,
            is_default: s.disposition.default == 1,
            language: s.tags.language,
        })
        .collect())
}
