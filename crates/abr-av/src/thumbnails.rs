//! Seek-preview thumbnails with a WebVTT index.
//!
//! One JPEG is extracted every `interval_seconds` into `thumbnails/`, then
//! `thumbnails.vtt` maps each interval to its image. The cue list is built
//! from the files actually produced, so it never points at a missing image.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::command::ToolCommand;

pub const THUMBNAIL_DIR: &str = "thumbnails";
pub const THUMBNAIL_VTT: &str = "thumbnails.vtt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailOptions {
    pub interval_seconds: u32,
    pub width: u32,
}

/// Encoder arguments extracting thumbnails from `input` into `thumb_dir`.
pub fn thumbnail_args(input: &Path, thumb_dir: &Path, opts: ThumbnailOptions) -> Vec<String> {
    vec![
        "-y".into(),
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-nostdin".into(),
        "-i".into(),
        input.to_string_lossy().to_string(),
        "-map".into(),
        "0:v:0".into(),
        "-vf".into(),
        format!(
            "fps=1/{},scale={}:-2",
            opts.interval_seconds.max(1),
            opts.width
        ),
        "-q:v".into(),
        "5".into(),
        thumb_dir
            .join("thumb_%05d.jpg")
            .to_string_lossy()
            .to_string(),
    ]
}

/// Extract thumbnails for `input` into `out_dir` and write the WebVTT index.
///
/// Returns the number of cues written.
pub async fn generate(
    ffmpeg: &Path,
    input: &Path,
    out_dir: &Path,
    opts: ThumbnailOptions,
    timeout: Duration,
    cancel: CancellationToken,
) -> abr_core::Result<usize> {
    let thumb_dir = out_dir.join(THUMBNAIL_DIR);
    tokio::fs::create_dir_all(&thumb_dir).await?;

    ToolCommand::new(ffmpeg.to_path_buf())
        .args(thumbnail_args(input, &thumb_dir, opts))
        .timeout(timeout)
        .cancel_on(cancel)
        .execute()
        .await?;

    let images = list_thumbnails(&thumb_dir).await?;
    let vtt = build_vtt(&images, opts.interval_seconds.max(1));
    tokio::fs::write(out_dir.join(THUMBNAIL_VTT), vtt).await?;

    tracing::debug!(dir = %out_dir.display(), count = images.len(), "Thumbnails written");
    Ok(images.len())
}

/// Sorted `thumb_*.jpg` file names in `dir`.
async fn list_thumbnails(dir: &Path) -> abr_core::Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with("thumb_") && name.ends_with(".jpg") {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Build a WebVTT document with one cue per image.
pub fn build_vtt(images: &[String], interval_seconds: u32) -> String {
    let mut out = String::from("WEBVTT\n");
    for (i, name) in images.iter().enumerate() {
        let start = i as u64 * u64::from(interval_seconds);
        let end = start + u64::from(interval_seconds);
        let _ = write!(
            out,
            "\n{} --> {}\n{}/{}\n",
            timestamp(start),
            timestamp(end),
            THUMBNAIL_DIR,
            name
        );
    }
    out
}

fn timestamp(total_secs: u64) -> String {
    let h = total_secs / 3600;
    let m = (total_secs % 3600) / 60;
    let s = total_secs % 60;
    format!("{h:02}:{m:02}:{s:02}.000")
}

/// Path of the WebVTT index for an output directory.
pub fn vtt_path(out_dir: &Path) -> PathBuf {
    out_dir.join(THUMBNAIL_VTT)
}
