//! Output directory layout.
//!
//! Every (item, profile) pair maps to exactly one directory. The mapping is
//! pure so the idempotency check, the single-flight key, and the file
//! responder all agree on where a package lives.

use std::path::{Component, Path, PathBuf};

use abr_core::{Config, ItemId};

/// Master playlist written by the encoder.
pub const MASTER_PLAYLIST: &str = "master.m3u8";

/// Per-rendition playlist name.
pub const VARIANT_PLAYLIST: &str = "index.m3u8";

/// Directory created next to a source file when output is co-located.
pub const COLOCATED_DIR: &str = "abr_hls";

/// Resolve the output directory for an item and profile.
///
/// With a known source path and co-location enabled the package sits in
/// `<source dir>/abr_hls/<profile>`; otherwise it goes under the configured
/// root as `<root>/<item id>/<profile>`.
pub fn output_dir(
    config: &Config,
    item_id: ItemId,
    source_path: Option<&Path>,
    profile_name: &str,
) -> PathBuf {
    if config.packaging.colocate_with_source {
        if let Some(parent) = source_path.and_then(Path::parent) {
            return parent.join(COLOCATED_DIR).join(profile_name);
        }
    }

    config.output_root().join(item_id.simple()).join(profile_name)
}

pub fn master_playlist(out_dir: &Path) -> PathBuf {
    out_dir.join(MASTER_PLAYLIST)
}

/// Whether the package in `out_dir` is complete.
pub fn is_ready(out_dir: &Path) -> bool {
    master_playlist(out_dir).is_file()
}

/// Join a client-supplied relative path onto `out_dir`.
///
/// Returns `None` when the path is absolute or would climb out of `out_dir`.
pub fn join_within(out_dir: &Path, relative: &str) -> Option<PathBuf> {
    let mut joined = out_dir.to_path_buf();
    let mut depth = 0usize;

    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => {
                joined.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return None;
                }
                joined.pop();
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    (depth > 0).then_some(joined)
}
