//! The packaging facade.
//!
//! [`Packager::ensure_packed`] composes path resolution, probing, planning,
//! spec building, and the encoder behind a per-(item, profile) single-flight
//! slot. A finished package is recognized by its master playlist; failures
//! leave no state behind, so the next call retries from scratch.

use std::path::PathBuf;
use std::sync::Arc;

use abr_av::ThumbnailOptions;
use abr_core::{Config, ItemId, Ladder};
use tokio_util::sync::CancellationToken;

use crate::catalog::{Catalog, CatalogItem};
use crate::error::{PackError, PackResult};
use crate::levels::{self, QualityLevel};
use crate::paths;
use crate::planner::{self, PlanOptions, PlannedRendition};
use crate::runner::Encoder;
use crate::single_flight::SingleFlight;
use crate::source::{CatalogProbe, SourceCharacteristics, SourceProbe};
use crate::spec::{self, JobSpec, PackagingRequest};

type FlightKey = (ItemId, String);

/// Everything decided for a job before the encoder runs.
#[derive(Debug, Clone)]
pub struct PreparedJob {
    pub item: CatalogItem,
    pub source: SourceCharacteristics,
    pub plan: Vec<PlannedRendition>,
    pub spec: JobSpec,
}

/// Cheaply cloneable handle to the packaging pipeline.
#[derive(Clone)]
pub struct Packager {
    inner: Arc<Inner>,
}

struct Inner {
    config: Arc<Config>,
    catalog: Arc<dyn Catalog>,
    probe: Arc<dyn SourceProbe>,
    encoder: Arc<dyn Encoder>,
    flights: Arc<SingleFlight<FlightKey, PathBuf>>,
}

impl Packager {
    /// Packager probing sources through the catalog's stream metadata.
    pub fn new(config: Arc<Config>, catalog: Arc<dyn Catalog>, encoder: Arc<dyn Encoder>) -> Self {
        let probe = Arc::new(CatalogProbe::new(catalog.clone()));
        Self::with_probe(config, catalog, probe, encoder)
    }

    pub fn with_probe(
        config: Arc<Config>,
        catalog: Arc<dyn Catalog>,
        probe: Arc<dyn SourceProbe>,
        encoder: Arc<dyn Encoder>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                catalog,
                probe,
                encoder,
                flights: Arc::new(SingleFlight::new()),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Number of (item, profile) jobs currently running.
    pub fn in_flight(&self) -> usize {
        self.inner.flights.len()
    }

    pub fn is_packaging(&self, item_id: ItemId, profile_name: &str) -> bool {
        self.inner
            .flights
            .contains(&(item_id, profile_name.to_string()))
    }

    fn ladder(&self, profile_name: &str) -> PackResult<&Ladder> {
        self.inner
            .config
            .ladder(profile_name)
            .ok_or_else(|| PackError::UnknownProfile(profile_name.to_string()))
    }

    /// Output directory for an item and profile.
    pub async fn output_dir(&self, item_id: ItemId, profile_name: &str) -> PathBuf {
        let item = self.inner.catalog.get_item(item_id).await;
        paths::output_dir(
            &self.inner.config,
            item_id,
            item.as_ref().and_then(|i| i.path.as_deref()),
            profile_name,
        )
    }

    /// Make sure the package for `item_id` and `profile_name` exists.
    ///
    /// Never fails across this boundary: errors are logged and reported as
    /// `false`.
    pub async fn ensure_packed(
        &self,
        item_id: ItemId,
        profile_name: &str,
        cancel: CancellationToken,
    ) -> bool {
        match self.try_ensure_packed(item_id, profile_name, cancel).await {
            Ok(_) => true,
            Err(e) => {
                if e.is_encoder_failure() {
                    tracing::error!(item_id = %item_id, profile = %profile_name, error = %e, "Packaging failed");
                } else {
                    tracing::warn!(item_id = %item_id, profile = %profile_name, error = %e, "Packaging not completed");
                }
                false
            }
        }
    }

    /// Like [`Packager::ensure_packed`] but returns the output directory or
    /// the reason packaging did not complete.
    pub async fn try_ensure_packed(
        &self,
        item_id: ItemId,
        profile_name: &str,
        cancel: CancellationToken,
    ) -> PackResult<PathBuf> {
        let ladder = self.ladder(profile_name)?.clone();
        let out_dir = self.output_dir(item_id, profile_name).await;

        if paths::is_ready(&out_dir) {
            tracing::debug!(item_id = %item_id, profile = %profile_name, "Package already present");
            return Ok(out_dir);
        }

        let request = PackagingRequest {
            item_id,
            profile_name: profile_name.to_string(),
            ladder,
        };
        let inner = self.inner.clone();
        let job_cancel = cancel.clone();

        self.inner
            .flights
            .run((item_id, profile_name.to_string()), cancel, move || {
                package(inner, request, out_dir, job_cancel)
            })
            .await
    }

    /// Resolve, probe, plan, and build without running the encoder.
    pub async fn prepare(&self, item_id: ItemId, profile_name: &str) -> PackResult<PreparedJob> {
        let request = PackagingRequest {
            item_id,
            profile_name: profile_name.to_string(),
            ladder: self.ladder(profile_name)?.clone(),
        };
        let out_dir = self.output_dir(item_id, profile_name).await;
        prepare(&self.inner, &request, out_dir).await
    }

    /// Renditions of the ladder that exist on disk.
    pub async fn levels(&self, item_id: ItemId, profile_name: &str) -> PackResult<Vec<QualityLevel>> {
        let ladder = self.ladder(profile_name)?;
        let out_dir = self.output_dir(item_id, profile_name).await;
        Ok(levels::available_levels(ladder, &out_dir))
    }
}

async fn package(
    inner: Arc<Inner>,
    request: PackagingRequest,
    out_dir: PathBuf,
    cancel: CancellationToken,
) -> PackResult<PathBuf> {
    // A previous flight may have finished between the caller's check and ours.
    if paths::is_ready(&out_dir) {
        return Ok(out_dir);
    }

    let job = prepare(&inner, &request, out_dir.clone()).await?;

    tracing::info!(
        item_id = %request.item_id,
        profile = %request.profile_name,
        source_height = job.source.height,
        renditions = ?job.spec.rendition_names().collect::<Vec<_>>(),
        "Packaging"
    );

    inner.encoder.encode(&job.spec, cancel.clone()).await?;

    let thumbs = &inner.config.thumbnails;
    if thumbs.enabled {
        let opts = ThumbnailOptions {
            interval_seconds: thumbs.interval_seconds,
            width: thumbs.width,
        };
        match inner
            .encoder
            .thumbnails(&job.spec.input_path, &out_dir, opts, cancel)
            .await
        {
            Ok(count) => tracing::debug!(item_id = %request.item_id, count, "Thumbnails generated"),
            Err(e) => tracing::warn!(item_id = %request.item_id, error = %e, "Thumbnail generation failed"),
        }
    }

    if paths::is_ready(&out_dir) {
        tracing::info!(item_id = %request.item_id, profile = %request.profile_name, "Package ready");
        Ok(out_dir)
    } else {
        Err(PackError::MissingManifest {
            path: paths::master_playlist(&out_dir).display().to_string(),
        })
    }
}

async fn prepare(
    inner: &Inner,
    request: &PackagingRequest,
    out_dir: PathBuf,
) -> PackResult<PreparedJob> {
    let item_id = request.item_id;
    let item = inner
        .catalog
        .get_item(item_id)
        .await
        .ok_or_else(|| PackError::SourceUnavailable {
            item_id,
            reason: "not in catalog".into(),
        })?;
    let input = item
        .path
        .clone()
        .ok_or_else(|| PackError::SourceUnavailable {
            item_id,
            reason: "item has no file path".into(),
        })?;
    if !tokio::fs::try_exists(&input).await.unwrap_or(false) {
        return Err(PackError::SourceUnavailable {
            item_id,
            reason: format!("{} does not exist", input.display()),
        });
    }

    let source = inner.probe.probe(&item).await;
    let plan = planner::plan(
        &request.ladder,
        &source,
        &PlanOptions::from(&inner.config.packaging),
    );
    if plan.is_empty() {
        tracing::warn!(
            item_id = %item_id,
            profile = %request.profile_name,
            source_height = source.height,
            "No rendition fits the source"
        );
        return Err(PackError::EmptyPlan {
            source_height: source.height,
        });
    }

    let spec = spec::build(request, &input, &out_dir, &plan, &inner.config.packaging)?;

    Ok(PreparedJob {
        item,
        source,
        plan,
        spec,
    })
}
