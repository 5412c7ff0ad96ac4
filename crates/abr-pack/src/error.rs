//! Packaging failure taxonomy.
//!
//! [`PackError`] is `Clone` because one in-flight packaging result is handed
//! to every caller waiting on the same (item, profile) key.

use std::time::Duration;

use abr_core::ItemId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PackError {
    /// Catalog lookup failed or the item has no file path.
    #[error("source unavailable for item {item_id}: {reason}")]
    SourceUnavailable { item_id: ItemId, reason: String },

    /// Ladder filtering left nothing to encode.
    #[error("empty plan: no rendition fits a source of height {source_height}")]
    EmptyPlan { source_height: u32 },

    /// The encoder binary could not be started.
    #[error("failed to launch encoder {program}: {message}")]
    EncoderLaunch { program: String, message: String },

    /// The encoder exited with a non-zero status.
    #[error("encoder exited with {}: {stderr}", exit_label(.status))]
    EncoderExit { status: Option<i32>, stderr: String },

    /// The encoder reported success but wrote no master playlist.
    #[error("encoder finished but {path} is missing")]
    MissingManifest { path: String },

    /// The encoder ran past its deadline and was killed.
    #[error("encoder timed out after {0:?}")]
    Timeout(Duration),

    #[error("packaging cancelled")]
    Cancelled,

    #[error("failed to create directory {path}: {message}")]
    DirectoryCreate { path: String, message: String },

    #[error("unknown profile '{0}'")]
    UnknownProfile(String),

    #[error("internal error: {0}")]
    Internal(String),
}

fn exit_label(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {code}"),
        None => "signal".to_string(),
    }
}

impl PackError {
    /// Non-zero exit, missing manifest, and timeout are all encoder failures
    /// that a later call may retry.
    pub fn is_encoder_failure(&self) -> bool {
        matches!(
            self,
            Self::EncoderExit { .. } | Self::MissingManifest { .. } | Self::Timeout(_)
        )
    }
}

pub type PackResult<T> = std::result::Result<T, PackError>;

impl From<PackError> for abr_core::Error {
    fn from(err: PackError) -> Self {
        match err {
            PackError::UnknownProfile(name) => abr_core::Error::not_found("profile", name),
            PackError::SourceUnavailable { item_id, .. } => {
                abr_core::Error::not_found("item", item_id)
            }
            PackError::EncoderLaunch { program, message } => abr_core::Error::tool(program, message),
            other => abr_core::Error::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoder_failure_classification() {
        assert!(PackError::EncoderExit {
            status: Some(1),
            stderr: String::new()
        }
        .is_encoder_failure());
        assert!(PackError::MissingManifest { path: "x".into() }.is_encoder_failure());
        assert!(PackError::Timeout(Duration::from_secs(1)).is_encoder_failure());
        assert!(!PackError::Cancelled.is_encoder_failure());
        assert!(!PackError::EncoderLaunch {
            program: "ffmpeg".into(),
            message: "missing".into()
        }
        .is_encoder_failure());
    }

    #[test]
    fn exit_display_includes_status_and_stderr() {
        let err = PackError::EncoderExit {
            status: Some(1),
            stderr: "Invalid data".into(),
        };
        assert_eq!(err.to_string(), "encoder exited with status 1: Invalid data");

        let killed = PackError::EncoderExit {
            status: None,
            stderr: String::new(),
        };
        assert!(killed.to_string().contains("signal"));
    }

    #[test]
    fn maps_to_core_error() {
        let err: abr_core::Error = PackError::UnknownProfile("nope".into()).into();
        assert_eq!(err.http_status(), 404);
        let err: abr_core::Error = PackError::EmptyPlan { source_height: 360 }.into();
        assert_eq!(err.http_status(), 500);
    }
}
