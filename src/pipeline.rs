//! Worker stage of a capture: everything after the snapshot exists.
//!
//! Runs on the worker pool, off the view thread. In order: sub-rect
//! extraction, persisting the actual image, baseline lookup and decode,
//! size check, comparison, persisting the diff image.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::codec::ImageCodec;
use crate::compare;
use crate::delivery::{CaptureOutcome, CompareResult};
use crate::error::{CaptureError, CaptureResult};
use crate::frame::PixelBuffer;
use crate::naming::ResolvedName;
use crate::options::CompareRequest;
use crate::region::{self, CaptureRegion};
use crate::storage::{self, ArtifactStore, AssetSource};

/// A snapshot handed from the view thread to the worker pool.
pub(crate) struct SnapshotReady {
    pub snapshot: PixelBuffer,
    pub name: ResolvedName,
    pub region: Option<CaptureRegion>,
    pub compare: Option<CompareRequest>,
}

/// Shared, read-only collaborators of the worker stage.
pub(crate) struct WorkerEnv {
    pub store: ArtifactStore,
    pub codec: Arc<dyn ImageCodec>,
    pub assets: Arc<dyn AssetSource>,
}

pub(crate) fn process(ready: SnapshotReady, env: &WorkerEnv) -> CaptureOutcome {
    let label = ready.name.label();
    match run(ready, env) {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(label = %label, error = %err, "capture request failed");
            CaptureOutcome::Failed(err)
        }
    }
}

fn run(ready: SnapshotReady, env: &WorkerEnv) -> CaptureResult<CaptureOutcome> {
    let SnapshotReady {
        snapshot,
        name,
        region,
        compare,
    } = ready;
    let label = name.label();
    let (source_width, source_height) = snapshot.dimensions();
    let sub_rect = region.is_some_and(|r| r.is_active_for(source_width, source_height));

    let pixels = region::extract(&snapshot, region, compare.is_some())?;
    debug!(
        label = %label,
        sub_rect,
        width = pixels.width(),
        height = pixels.height(),
        "extracted capture pixels"
    );

    // The file holds the sub-rect when one was selected, otherwise the
    // whole snapshot.
    let persisted = if sub_rect { &pixels } else { &snapshot };

    let Some(request) = compare else {
        let location = persist(env, &label, persisted)?;
        return Ok(CaptureOutcome::Captured { location });
    };

    let actual_location = if request.write_actual {
        Some(persist(env, &label, persisted)?)
    } else {
        None
    };
    drop(snapshot);

    let bytes = storage::load_baseline(env.assets.as_ref(), &request.baseline)?;
    let baseline = env.codec.decode(&bytes)?;
    if baseline.dimensions() != pixels.dimensions() {
        return Err(CaptureError::SizeMismatch {
            actual: pixels.dimensions(),
            baseline: baseline.dimensions(),
        });
    }

    let comparison = compare::compare(
        &pixels,
        &baseline,
        request.tolerances,
        request.write_diff.then_some(request.mode),
    )?;

    let diff_location = match comparison.diff {
        Some(diff) if comparison.differing_pixels > 0 => {
            Some(persist(env, &name.diff_label(), &diff)?)
        }
        _ => None,
    };

    info!(
        label = %label,
        baseline = %request.baseline,
        differing = comparison.differing_pixels,
        raw_differing = comparison.raw_differing_pixels,
        total = pixels.len(),
        "comparison finished"
    );

    Ok(CaptureOutcome::Compared(CompareResult {
        differing_pixels: comparison.differing_pixels,
        actual_location,
        diff_location,
    }))
}

fn persist(env: &WorkerEnv, label: &str, buffer: &PixelBuffer) -> CaptureResult<PathBuf> {
    let bytes = env.codec.encode(buffer)?;
    let path = env.store.persist(label, env.codec.extension(), &bytes)?;
    info!(
        path = %path.display(),
        width = buffer.width(),
        height = buffer.height(),
        "persisted capture artifact"
    );
    Ok(path)
}
