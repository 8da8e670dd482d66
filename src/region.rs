//! Sub-rectangle selection within a snapshot.
//!
//! [`CaptureRegion`] is the optional rectangle a caller asks for.
//! [`extract`] turns a full snapshot plus that request into the pixel
//! buffer the rest of the pipeline works on.

use crate::error::{CaptureError, CaptureResult};
use crate::frame::PixelBuffer;

/// A rectangle in snapshot coordinates, as sent by the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CaptureRegion {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl CaptureRegion {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the rectangle requests any area at all.
    pub fn has_area(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Whether this region selects a sub-rect of a `source_width` x
    /// `source_height` snapshot.
    ///
    /// The bound is strict: a region as large as the source (or larger) is
    /// not a sub-rect and takes the full-buffer path in [`extract`].
    pub fn is_active_for(&self, source_width: u32, source_height: u32) -> bool {
        self.has_area()
            && (self.width as u32) < source_width
            && (self.height as u32) < source_height
    }
}

/// Produce the region of interest from a full snapshot.
///
/// - Active region: `x`/`y` are clamped to zero and exactly
///   `width * height` samples are copied from that origin.
/// - No active region, no comparison: an empty buffer. Only the persisted
///   file matters to capture-only callers.
/// - No active region, comparison requested: a full-size read starting at
///   the request's origin (normally `0,0`, which yields the source itself).
///
/// The far edge (`x + width`, `y + height`) is not clamped. A read that
/// would leave the source is reported as [`CaptureError::RegionOutOfBounds`].
pub fn extract(
    source: &PixelBuffer,
    region: Option<CaptureRegion>,
    comparison_requested: bool,
) -> CaptureResult<PixelBuffer> {
    let (source_width, source_height) = source.dimensions();
    let requested = region.unwrap_or_default();

    if requested.is_active_for(source_width, source_height) {
        let x = requested.x.max(0);
        let y = requested.y.max(0);
        return copy_rect(
            source,
            x,
            y,
            requested.width as u32,
            requested.height as u32,
        );
    }

    if !comparison_requested {
        return Ok(PixelBuffer::empty());
    }

    // The full-size read keeps the caller's origin as given. Any non-zero
    // origin pushes the read past the source edge.
    if requested.x == 0 && requested.y == 0 {
        return Ok(source.clone());
    }
    copy_rect(
        source,
        requested.x,
        requested.y,
        source_width,
        source_height,
    )
}

fn copy_rect(
    source: &PixelBuffer,
    x: i32,
    y: i32,
    width: u32,
    height: u32,
) -> CaptureResult<PixelBuffer> {
    let (src_w, src_h) = source.dimensions();
    let out_of_bounds = || CaptureError::RegionOutOfBounds {
        x,
        y,
        width,
        height,
        source_width: src_w,
        source_height: src_h,
    };

    if x < 0 || y < 0 {
        return Err(out_of_bounds());
    }
    let src_x = x as usize;
    let src_y = y as usize;
    let copy_w = width as usize;
    let copy_h = height as usize;

    let right = src_x.checked_add(copy_w).ok_or(CaptureError::BufferOverflow)?;
    let bottom = src_y.checked_add(copy_h).ok_or(CaptureError::BufferOverflow)?;
    if right > src_w as usize || bottom > src_h as usize {
        return Err(out_of_bounds());
    }

    let stride = src_w as usize;
    let src = source.samples();
    let len = copy_w
        .checked_mul(copy_h)
        .ok_or(CaptureError::BufferOverflow)?;
    let mut samples = Vec::with_capacity(len);
    for row in src_y..bottom {
        let start = row * stride + src_x;
        samples.extend_from_slice(&src[start..start + copy_w]);
    }

    PixelBuffer::from_argb(width, height, samples)
}
