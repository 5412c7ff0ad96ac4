//! Item identifiers.
//!
//! [`ItemId`] is a newtype over `Uuid`. Items discovered on disk get a
//! name-based (v5) id derived from their absolute path, so the same file keeps
//! the same id (and therefore the same output directory) across restarts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a library item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Uuid);

impl ItemId {
    /// Create a new random ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Derive a stable ID from a file path.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        Self(Uuid::new_v5(
            &Uuid::NAMESPACE_URL,
            path.to_string_lossy().as_bytes(),
        ))
    }

    /// Return the inner UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Hyphen-less form used for directory names.
    #[must_use]
    pub fn simple(&self) -> String {
        self.0.simple().to_string()
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ItemId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for ItemId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<ItemId> for Uuid {
    fn from(id: ItemId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_ids_are_stable() {
        let a = ItemId::from_path(Path::new("/media/movies/a.mkv"));
        let b = ItemId::from_path(Path::new("/media/movies/a.mkv"));
        let c = ItemId::from_path(Path::new("/media/movies/b.mkv"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn parse_accepts_both_forms() {
        let id = ItemId::new();
        let hyphenated: ItemId = id.to_string().parse().unwrap();
        let simple: ItemId = id.simple().parse().unwrap();
        assert_eq!(hyphenated, id);
        assert_eq!(simple, id);
        assert_eq!(id.simple().len(), 32);
    }
}
