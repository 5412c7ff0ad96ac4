//! abrhls - adaptive-bitrate HLS packaging for media libraries.
//!
//! The binary wires the [`abr_pack::Packager`] to a filesystem
//! [`library::LibraryCatalog`], an HTTP responder, and a library watcher.

pub mod library;
pub mod server;
pub mod watch;

use std::sync::Arc;

use abr_av::{FfprobeProber, ToolRegistry};
use abr_core::Config;
use abr_pack::{FfmpegRunner, Packager};

use crate::library::LibraryCatalog;

/// Catalog over the configured library, probing with the discovered ffprobe.
pub fn build_library(config: &Config, tools: &ToolRegistry) -> LibraryCatalog {
    LibraryCatalog::new(
        FfprobeProber::new(tools.ffprobe()),
        config.library.extensions.clone(),
    )
}

/// Packager running the discovered ffmpeg against `library`.
pub fn build_packager(
    config: Arc<Config>,
    library: Arc<LibraryCatalog>,
    tools: &ToolRegistry,
) -> Packager {
    let runner = FfmpegRunner::new(tools.ffmpeg(), config.packaging.job_timeout());
    Packager::new(config, library, Arc::new(runner))
}
