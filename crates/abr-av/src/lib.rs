//! # abr-av
//!
//! External tool management for the abrhls packager.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- locate ffmpeg and ffprobe from
//!   config overrides or `PATH`.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout and
//!   cancellation support for running external processes.
//! - **Stream probing** ([`FfprobeProber`]) -- read elementary stream metadata.
//! - **Thumbnails** ([`thumbnails`]) -- seek-preview images plus a WebVTT index.

pub mod command;
pub mod probe;
pub mod thumbnails;
pub mod tools;

// ---- Re-exports for convenience ----

pub use command::{CommandError, ToolCommand, ToolOutput};
pub use probe::FfprobeProber;
pub use thumbnails::ThumbnailOptions;
pub use tools::{ToolInfo, ToolRegistry};
