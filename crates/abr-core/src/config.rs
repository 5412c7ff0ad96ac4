//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from TOML and carries the
//! server, library, tool, packaging, thumbnail, and ladder sections. Every
//! section defaults sensibly so an empty file is valid. Once loaded the
//! config is an immutable snapshot shared behind an `Arc`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::ladder::Ladder;

/// Output root used when none is configured.
pub const DEFAULT_OUTPUT_ROOT: &str = "data/abrhls";

/// Name of the ladder used when a request does not name one.
pub const DEFAULT_PROFILE: &str = "default";

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Host writable data directory. Relative output roots resolve against it.
    /// Filled in from the config file location when unset.
    pub data_dir: Option<PathBuf>,
    pub server: ServerConfig,
    pub library: LibraryConfig,
    pub tools: ToolsConfig,
    pub packaging: PackagingConfig,
    pub thumbnails: ThumbnailConfig,
    pub ladders: BTreeMap<String, Ladder>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            server: ServerConfig::default(),
            library: LibraryConfig::default(),
            tools: ToolsConfig::default(),
            packaging: PackagingConfig::default(),
            thumbnails: ThumbnailConfig::default(),
            ladders: default_ladders(),
        }
    }
}

fn default_ladders() -> BTreeMap<String, Ladder> {
    let mut ladders = BTreeMap::new();
    ladders.insert(DEFAULT_PROFILE.to_string(), Ladder::default_ladder());
    ladders.insert("firetv_sdr".to_string(), Ladder::firetv_sdr());
    ladders.insert("firetv_hdr".to_string(), Ladder::firetv_hdr());
    ladders
}

impl Config {
    /// Deserialize a `Config` from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::Config(format!("config parse error: {e}")))
    }

    /// Look up a named ladder.
    pub fn ladder(&self, profile_name: &str) -> Option<&Ladder> {
        self.ladders.get(profile_name)
    }

    /// Data directory, defaulting to the current directory.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Absolute-or-data-relative packaging output root.
    pub fn output_root(&self) -> PathBuf {
        let configured = self
            .packaging
            .output_root
            .as_ref()
            .filter(|p| !p.as_os_str().is_empty())
            .cloned()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_ROOT));

        if configured.is_absolute() {
            configured
        } else {
            self.data_dir().join(configured)
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(Error::Config("Server port cannot be 0".into()));
        }

        let p = &self.packaging;
        if p.min_segment_seconds == 0 {
            return Err(Error::Config("min_segment_seconds must be at least 1".into()));
        }
        if p.min_segment_seconds > p.max_segment_seconds {
            return Err(Error::Config(format!(
                "min_segment_seconds ({}) exceeds max_segment_seconds ({})",
                p.min_segment_seconds, p.max_segment_seconds
            )));
        }
        if p.job_timeout_secs == 0 {
            return Err(Error::Config("job_timeout_secs must be positive".into()));
        }
        if p.max_concurrent_jobs == 0 {
            return Err(Error::Config("max_concurrent_jobs must be at least 1".into()));
        }

        if self.thumbnails.enabled {
            if self.thumbnails.interval_seconds == 0 {
                return Err(Error::Config("thumbnail interval must be positive".into()));
            }
            if self.thumbnails.width == 0 {
                return Err(Error::Config("thumbnail width must be positive".into()));
            }
        }

        for (name, ladder) in &self.ladders {
            ladder.validate(name)?;
        }

        for root in &self.library.roots {
            if !root.exists() {
                tracing::warn!("Library root does not exist: {:?}", root);
            }
        }

        Ok(())
    }
}

/// Load configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file {:?}: {e}", path)))?;

    let mut config = Config::from_toml(&content)?;

    if config.data_dir.is_none() {
        config.data_dir = path.parent().map(|p| {
            if p.as_os_str().is_empty() {
                PathBuf::from(".")
            } else {
                p.to_path_buf()
            }
        });
    }

    config.validate()?;
    Ok(config)
}

/// Load config from the given path, the default locations, or defaults.
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./abrhls.toml",
        "./config.toml",
        "~/.config/abrhls/config.toml",
        "/etc/abrhls/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    tracing::info!("No config file found; using defaults");
    Ok(Config::default())
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// How long a manifest request waits for packaging before answering
    /// "not ready yet".
    pub manifest_wait_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8096,
            manifest_wait_secs: 20,
        }
    }
}

// ---------------------------------------------------------------------------
// Library
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Directories scanned for source media.
    pub roots: Vec<PathBuf>,
    /// Media extensions (lowercase, without dot). Empty means built-in list.
    pub extensions: Vec<String>,
    /// Watch `roots` for new files.
    pub watch: bool,
    /// Seconds a new file must stay unchanged before it is registered.
    pub settle_time_secs: u64,
    /// Package newly added items with the default ladder.
    pub auto_pack: bool,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            extensions: Vec::new(),
            watch: false,
            settle_time_secs: 30,
            auto_pack: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tools
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Encoder override. Falls back to `PATH`, then the host default.
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Packaging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PackagingConfig {
    /// Output root for items without a known source directory.
    pub output_root: Option<PathBuf>,
    /// Write output next to the source file (`<dir>/abr_hls/<profile>`).
    pub colocate_with_source: bool,
    pub segment_duration_seconds: u32,
    pub min_segment_seconds: u32,
    pub max_segment_seconds: u32,
    /// Fragmented MP4 segments (`.m4s`) instead of MPEG-TS (`.ts`).
    pub use_fmp4: bool,
    pub keep_eac3_if_present: bool,
    pub transcode_dts_to_ac3: bool,
    pub transcode_truehd_to_eac3: bool,
    pub add_stereo_aac_fallback: bool,
    /// Fixed bitrate of the stereo AAC fallback track.
    pub fallback_aac_bitrate: u64,
    /// x264/x265 preset.
    pub video_preset: String,
    pub job_timeout_secs: u64,
    /// Packages the library listener runs at once.
    pub max_concurrent_jobs: usize,
}

impl Default for PackagingConfig {
    fn default() -> Self {
        Self {
            output_root: Some(PathBuf::from(DEFAULT_OUTPUT_ROOT)),
            colocate_with_source: true,
            segment_duration_seconds: 4,
            min_segment_seconds: 2,
            max_segment_seconds: 6,
            use_fmp4: true,
            keep_eac3_if_present: true,
            transcode_dts_to_ac3: true,
            transcode_truehd_to_eac3: true,
            add_stereo_aac_fallback: true,
            fallback_aac_bitrate: 128_000,
            video_preset: "veryfast".to_string(),
            job_timeout_secs: 6 * 60 * 60,
            max_concurrent_jobs: 1,
        }
    }
}

impl PackagingConfig {
    /// Segment duration clamped to the configured safe range.
    pub fn segment_duration(&self) -> u32 {
        self.segment_duration_seconds
            .clamp(self.min_segment_seconds, self.max_segment_seconds.max(self.min_segment_seconds))
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Thumbnails
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    pub enabled: bool,
    pub interval_seconds: u32,
    pub width: u32,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 10,
            width: 240,
        }
    }
}
