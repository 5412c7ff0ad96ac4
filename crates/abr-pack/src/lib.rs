//! # abr-pack
//!
//! Adaptive-bitrate HLS packaging: ladder planning, encoder job construction,
//! single-flight execution, and the [`Packager`] facade that ties them
//! together.
//!
//! Leaf-first:
//!
//! - [`paths`] -- deterministic output directory per (item, profile).
//! - [`source`] -- the source facts planning needs, with safe defaults.
//! - [`planner`] -- filter a ladder against the source, decide audio.
//! - [`spec`] / [`args`] -- typed job description and its argv form.
//! - [`runner`] -- the [`Encoder`] seam and the ffmpeg implementation.
//! - [`single_flight`] -- at most one run per key, shared by all callers.
//! - [`orchestrator`] -- [`Packager::ensure_packed`].

pub mod args;
pub mod catalog;
pub mod error;
pub mod levels;
pub mod listener;
pub mod orchestrator;
pub mod paths;
pub mod planner;
pub mod runner;
pub mod single_flight;
pub mod source;
pub mod spec;

pub use catalog::{Catalog, CatalogItem, MemoryCatalog};
pub use error::{PackError, PackResult};
pub use levels::QualityLevel;
pub use listener::spawn_listener;
pub use orchestrator::{Packager, PreparedJob};
pub use runner::{Encoder, FfmpegRunner};
pub use source::{SourceCharacteristics, SourceProbe};
pub use spec::{JobSpec, PackagingRequest};
