//! Job execution.
//!
//! [`Encoder`] is the seam between orchestration and the external process.
//! [`FfmpegRunner`] is the production implementation; tests substitute
//! in-process doubles.

use std::path::{Path, PathBuf};
use std::time::Duration;

use abr_av::thumbnails::{self, ThumbnailOptions};
use abr_av::{CommandError, ToolCommand};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::args;
use crate::error::{PackError, PackResult};
use crate::paths;
use crate::spec::JobSpec;

/// Bytes of encoder stderr kept for error reports.
const STDERR_TAIL_BYTES: usize = 8 * 1024;

#[async_trait]
pub trait Encoder: Send + Sync {
    /// Run one packaging job into `spec.output_dir`.
    async fn encode(&self, spec: &JobSpec, cancel: CancellationToken) -> PackResult<()>;

    /// Generate seek thumbnails next to a finished package.
    ///
    /// Returns the number of images written.
    async fn thumbnails(
        &self,
        _input: &Path,
        _out_dir: &Path,
        _opts: ThumbnailOptions,
        _cancel: CancellationToken,
    ) -> PackResult<usize> {
        Ok(0)
    }
}

/// Runs jobs with the `ffmpeg` binary.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    ffmpeg: PathBuf,
    timeout: Duration,
}

impl FfmpegRunner {
    pub fn new(ffmpeg: PathBuf, timeout: Duration) -> Self {
        Self { ffmpeg, timeout }
    }

    pub fn ffmpeg(&self) -> &Path {
        &self.ffmpeg
    }
}

#[async_trait]
impl Encoder for FfmpegRunner {
    async fn encode(&self, spec: &JobSpec, cancel: CancellationToken) -> PackResult<()> {
        create_rendition_dirs(spec).await?;

        let argv = args::to_args(spec);
        tracing::info!(
            output = %spec.output_dir.display(),
            renditions = spec.renditions.len(),
            "Starting encoder"
        );
        tracing::debug!("{} {}", self.ffmpeg.display(), argv.join(" "));

        let started = std::time::Instant::now();
        let output = ToolCommand::new(self.ffmpeg.clone())
            .args(argv)
            .timeout(self.timeout)
            .cancel_on(cancel)
            .run()
            .await
            .map_err(|e| match e {
                CommandError::Spawn { tool, source } => PackError::EncoderLaunch {
                    program: tool,
                    message: source.to_string(),
                },
                CommandError::TimedOut { timeout, .. } => PackError::Timeout(timeout),
                CommandError::Cancelled { .. } => PackError::Cancelled,
                CommandError::Wait { source, .. } => PackError::Internal(format!(
                    "failed waiting for encoder: {source}"
                )),
            })?;

        if !output.status.success() {
            let stderr = tail(&output.stderr, STDERR_TAIL_BYTES);
            tracing::error!(
                output = %spec.output_dir.display(),
                status = ?output.status.code(),
                stderr = %stderr,
                "Encoder failed"
            );
            return Err(PackError::EncoderExit {
                status: output.status.code(),
                stderr,
            });
        }

        let master = paths::master_playlist(&spec.output_dir);
        if !master.is_file() {
            return Err(PackError::MissingManifest {
                path: master.display().to_string(),
            });
        }

        tracing::info!(
            output = %spec.output_dir.display(),
            elapsed = ?started.elapsed(),
            "Encoder finished"
        );
        Ok(())
    }

    async fn thumbnails(
        &self,
        input: &Path,
        out_dir: &Path,
        opts: ThumbnailOptions,
        cancel: CancellationToken,
    ) -> PackResult<usize> {
        thumbnails::generate(&self.ffmpeg, input, out_dir, opts, self.timeout, cancel)
            .await
            .map_err(|e| PackError::Internal(format!("thumbnail generation failed: {e}")))
    }
}

/// Create the output directory and one subdirectory per variant.
pub async fn create_rendition_dirs(spec: &JobSpec) -> PackResult<()> {
    for name in spec.rendition_names() {
        let dir = spec.output_dir.join(name);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| PackError::DirectoryCreate {
                path: dir.display().to_string(),
                message: e.to_string(),
            })?;
    }
    Ok(())
}

/// Last `max` bytes of `s`, cut on a char boundary.
fn tail(s: &str, max: usize) -> String {
    let s = s.trim();
    if s.len() <= max {
        return s.to_string();
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    s[start..].to_string()
}
