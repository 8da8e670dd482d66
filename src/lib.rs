pub mod codec;
pub mod compare;
pub mod delivery;
pub mod diff;
pub(crate) mod env_config;
pub mod error;
pub mod frame;
pub mod naming;
pub mod options;
pub mod orchestrator;
mod pipeline;
pub mod pixel;
pub mod region;
pub mod snapshot;
pub mod storage;

use error::CaptureResult;
use frame::PixelBuffer;

pub use codec::{ImageCodec, PngCodec};
pub use compare::{Comparison, Tolerances};
pub use delivery::{CaptureOutcome, CaptureReply, CaptureSuccess, CaptureTicket, CompareResult};
pub use diff::DiffMode;
pub use error::{CaptureError, CaptureErrorClass};
pub use naming::{NameCounterState, ResolvedName};
pub use options::{CaptureOptions, CompareOptions};
pub use orchestrator::{CaptureOrchestrator, CaptureOrchestratorBuilder, OrchestratorConfig};
pub use pixel::Pixel;
pub use region::CaptureRegion;
pub use snapshot::ViewSnapshotProvider;
pub use storage::{ArtifactStore, AssetSource, DirectoryAssets, MemoryAssets, NoAssets};

#[cfg(feature = "tokio-stream")]
pub use delivery::AsyncCaptureTicket;

/// Compare two in-memory images without going through an orchestrator.
pub fn compare_images(
    actual: &PixelBuffer,
    baseline: &PixelBuffer,
    tolerances: Tolerances,
    diff: Option<DiffMode>,
) -> CaptureResult<Comparison> {
    compare::compare(actual, baseline, tolerances, diff)
}
