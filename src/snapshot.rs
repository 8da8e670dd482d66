use crate::error::CaptureResult;
use crate::frame::PixelBuffer;

/// Source of full-frame view snapshots.
///
/// The provider is moved onto the orchestrator's view thread and only ever
/// called from there, one snapshot at a time. A snapshot covers the view's
/// entire rendered content, including parts scrolled out of sight, at its
/// native width and height.
pub trait ViewSnapshotProvider: Send {
    fn snapshot(&mut self) -> CaptureResult<PixelBuffer>;
}

impl<F> ViewSnapshotProvider for F
where
    F: FnMut() -> CaptureResult<PixelBuffer> + Send,
{
    fn snapshot(&mut self) -> CaptureResult<PixelBuffer> {
        self()
    }
}
