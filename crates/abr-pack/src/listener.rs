//! Packages newly added library items.
//!
//! The listener consumes [`LibraryEvent`]s and calls the same
//! [`Packager::ensure_packed`] entry point the HTTP layer uses, so the
//! single-flight and idempotency guarantees hold for both triggers. At most
//! `max_jobs` packages run at once; the rest wait for a permit.

use std::sync::Arc;

use abr_core::{ItemId, LibraryEvent};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::orchestrator::Packager;

/// Spawn the listener task. It stops when `shutdown` fires or the event
/// channel closes, and returns once every job it started has finished.
/// Shutdown cancels running jobs and drops queued ones.
pub fn spawn_listener(
    packager: Packager,
    mut events: broadcast::Receiver<LibraryEvent>,
    profile_name: String,
    max_jobs: usize,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let max_jobs = max_jobs.max(1);
        let permits = Arc::new(Semaphore::new(max_jobs));
        let mut jobs: JoinSet<()> = JoinSet::new();
        tracing::info!(profile = %profile_name, max_jobs, "Auto-packaging listener started");

        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                Some(done) = jobs.join_next(), if !jobs.is_empty() => {
                    if let Err(e) = done {
                        tracing::error!(error = %e, "Auto-packaging job panicked");
                    }
                    continue;
                }
                event = events.recv() => event,
            };

            match event {
                Ok(LibraryEvent::ItemAdded { item_id, path }) => {
                    tracing::info!(item_id = %item_id, path = %path.display(), "New item, queued for packaging");
                    jobs.spawn(package_item(
                        packager.clone(),
                        item_id,
                        profile_name.clone(),
                        permits.clone(),
                        shutdown.child_token(),
                    ));
                }
                Ok(LibraryEvent::ItemRemoved { item_id, .. }) => {
                    tracing::debug!(item_id = %item_id, "Item removed; output left in place");
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Auto-packaging listener lagged behind");
                }
                Err(RecvError::Closed) => break,
            }
        }

        if !jobs.is_empty() {
            tracing::info!(pending = jobs.len(), "Waiting for auto-packaging jobs");
        }
        while let Some(done) = jobs.join_next().await {
            if let Err(e) = done {
                tracing::error!(error = %e, "Auto-packaging job panicked");
            }
        }
        tracing::info!("Auto-packaging listener stopped");
    })
}

async fn package_item(
    packager: Packager,
    item_id: ItemId,
    profile_name: String,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
) {
    let _permit = tokio::select! {
        _ = cancel.cancelled() => {
            tracing::debug!(item_id = %item_id, "Queued packaging dropped on shutdown");
            return;
        }
        permit = permits.acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => return,
        },
    };

    if !packager.ensure_packed(item_id, &profile_name, cancel).await {
        tracing::warn!(item_id = %item_id, profile = %profile_name, "Auto-packaging did not complete");
    }
}
