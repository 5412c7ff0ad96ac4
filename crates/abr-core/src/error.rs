//! Errors shared by the catalog, configuration, and tool layers.
//!
//! Packaging outcomes have their own taxonomy in `abr-pack` and convert into
//! [`Error`] at the HTTP and CLI boundaries.

use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A library item, ladder, or file was looked up and is not there.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Malformed input, such as an item id that is not a UUID.
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O failure: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// ffmpeg or ffprobe could not be started or exited non-zero.
    #[error("{tool} failed: {message}")]
    Tool { tool: String, message: String },

    /// ffprobe ran but its stream list was unusable.
    #[error("Cannot read streams: {0}")]
    Probe(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Status code the HTTP layer answers with.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound { .. } => 404,
            Error::Validation(_) => 400,
            Error::Tool { .. } => 502,
            Error::Probe(_) => 422,
            Error::Config(_) | Error::Io { .. } | Error::Internal(_) => 500,
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_ladder_is_404() {
        let err = Error::not_found("ladder", "firetv_4k");
        assert_eq!(err.to_string(), "ladder not found: firetv_4k");
        assert_eq!(err.http_status(), 404);
    }

    #[test]
    fn bad_item_id_is_400() {
        let err = Error::Validation("item id is not a UUID: abc".into());
        assert_eq!(err.http_status(), 400);
        assert!(err.to_string().starts_with("Invalid request"));
    }

    #[test]
    fn missing_source_file_is_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "Film.mkv");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn ffprobe_failures() {
        let exited = Error::tool("ffprobe", "exit status 1");
        assert_eq!(exited.to_string(), "ffprobe failed: exit status 1");
        assert_eq!(exited.http_status(), 502);

        let unreadable = Error::Probe("no streams array".into());
        assert_eq!(unreadable.http_status(), 422);
    }

    #[test]
    fn config_errors_are_server_side() {
        assert_eq!(Error::Config("port cannot be 0".into()).http_status(), 500);
    }
}
