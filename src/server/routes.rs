//! Packaged-output handlers.
//!
//! Everything under `/abr/{profile}/{item_id}/` goes through [`abr_file`]:
//! `master.m3u8` triggers packaging, `levels` reports materialized
//! renditions, and any other path is served from the output directory.

use std::path::Path as FsPath;
use std::str::FromStr;

use abr_core::ItemId;
use abr_pack::paths::{self, MASTER_PLAYLIST};
use abr_pack::PackError;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tokio_util::io::ReaderStream;

use super::error::AppError;
use super::AppState;

/// Seconds clients are told to wait before asking for a pending package.
pub const RETRY_AFTER_SECS: u64 = 5;

const LEVELS_PATH: &str = "levels";

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "packaging": state.packager.in_flight(),
    }))
}

pub async fn abr_file(
    State(state): State<AppState>,
    Path((profile, item_id, rel)): Path<(String, String, String)>,
) -> Result<Response, AppError> {
    let item_id = ItemId::from_str(&item_id)
        .map_err(|_| abr_core::Error::Validation(format!("invalid item id: {item_id}")))?;
    if state.packager.config().ladder(&profile).is_none() {
        return Err(PackError::UnknownProfile(profile).into());
    }

    match rel.as_str() {
        MASTER_PLAYLIST => master_playlist(state, item_id, profile).await,
        LEVELS_PATH => {
            let levels = state.packager.levels(item_id, &profile).await?;
            Ok(Json(levels).into_response())
        }
        _ => {
            let out_dir = state.packager.output_dir(item_id, &profile).await;
            let path = paths::join_within(&out_dir, &rel)
                .ok_or_else(|| abr_core::Error::Validation(format!("invalid path: {rel}")))?;
            serve_file(&path).await
        }
    }
}

/// Serve the master playlist, packaging first if needed.
///
/// The job runs on its own task under the server's shutdown token, so a
/// client giving up does not abort it. If it is not finished within the
/// configured wait, the client gets 202 and retries later.
async fn master_playlist(
    state: AppState,
    item_id: ItemId,
    profile: String,
) -> Result<Response, AppError> {
    let out_dir = state.packager.output_dir(item_id, &profile).await;
    if paths::is_ready(&out_dir) {
        return serve_file(&paths::master_playlist(&out_dir)).await;
    }

    let packager = state.packager.clone();
    let cancel = state.shutdown.child_token();
    let job_profile = profile.clone();
    let job = tokio::spawn(async move {
        packager
            .try_ensure_packed(item_id, &job_profile, cancel)
            .await
    });

    match tokio::time::timeout(state.manifest_wait, job).await {
        Ok(Ok(Ok(dir))) => serve_file(&paths::master_playlist(&dir)).await,
        Ok(Ok(Err(e @ (PackError::SourceUnavailable { .. } | PackError::UnknownProfile(_))))) => {
            Err(e.into())
        }
        Ok(Ok(Err(e))) => {
            tracing::warn!(item_id = %item_id, profile = %profile, error = %e, "Package not available");
            Ok(not_ready())
        }
        Ok(Err(e)) => {
            tracing::error!(item_id = %item_id, profile = %profile, error = %e, "Packaging task failed");
            Ok(not_ready())
        }
        Err(_) => {
            tracing::debug!(item_id = %item_id, profile = %profile, "Packaging still running");
            Ok(not_ready())
        }
    }
}

fn not_ready() -> Response {
    (
        StatusCode::ACCEPTED,
        [(header::RETRY_AFTER, RETRY_AFTER_SECS.to_string())],
        Json(json!({
            "status": "packaging",
            "retry_after": RETRY_AFTER_SECS,
        })),
    )
        .into_response()
}

async fn serve_file(path: &FsPath) -> Result<Response, AppError> {
    let file = match tokio::fs::File::open(path).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(abr_core::Error::not_found("file", path.display()).into());
        }
        Err(e) => return Err(abr_core::Error::from(e).into()),
    };
    let len = file.metadata().await.map_err(abr_core::Error::from)?.len();

    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let cache = if ext == "m3u8" {
        "no-cache"
    } else {
        "max-age=31536000, immutable"
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type(&ext))
        .header(header::CONTENT_LENGTH, len)
        .header(header::CACHE_CONTROL, cache)
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| AppError(abr_core::Error::Internal(format!("response build failed: {e}"))))
}

/// Content type for a packaged file extension (lowercase, without dot).
pub fn content_type(ext: &str) -> &'static str {
    match ext {
        "m3u8" => "application/vnd.apple.mpegurl",
        "ts" => "video/mp2t",
        "m4s" => "video/iso.segment",
        "mp4" => "video/mp4",
        "vtt" => "text/vtt",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}
