//! Tolerance-based pixel comparison.
//!
//! Two equally sized buffers are compared channel by channel. A pixel
//! counts as differing when any one of its alpha, red, green or blue deltas
//! exceeds the color threshold. The pixel tolerance is applied once, to the
//! final count: if the differing fraction is within it, the comparison
//! reports zero.

mod parallel;

use rayon::prelude::*;

use crate::diff::{ChannelDelta, DiffMode};
use crate::error::{CaptureError, CaptureResult};
use crate::frame::PixelBuffer;
use crate::pixel::Pixel;
use parallel::{parallel_chunk_pixels, should_parallelize};

const COMPARE_PARALLEL_MIN_PIXELS: usize = 262_144;
const COMPARE_PARALLEL_MIN_CHUNK_PIXELS: usize = 65_536;
const COMPARE_PARALLEL_MAX_WORKERS: usize = 8;

/// Color and pixel tolerances, each a fraction in `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Tolerances {
    color: f64,
    pixel: f64,
}

impl Tolerances {
    /// Exact match on every channel of every pixel.
    pub const EXACT: Self = Self {
        color: 0.0,
        pixel: 0.0,
    };

    /// Values outside `[0, 1]` are clamped; non-finite values become 0.
    pub fn new(color: f64, pixel: f64) -> Self {
        Self {
            color: clamp_unit(color),
            pixel: clamp_unit(pixel),
        }
    }

    pub fn color(&self) -> f64 {
        self.color
    }

    pub fn pixel(&self) -> f64 {
        self.pixel
    }

    /// Largest per-channel delta that still matches: `round(255 * color)`.
    pub fn color_threshold(&self) -> u8 {
        (255.0_f32 * self.color as f32).round() as u8
    }

    /// Apply the pixel-tolerance floor to a raw differing count.
    pub fn reduce(&self, differing: u32, total: usize) -> u32 {
        if total == 0 {
            return 0;
        }
        if f64::from(differing) / total as f64 <= self.pixel {
            0
        } else {
            differing
        }
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

/// Outcome of one comparison.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Comparison {
    /// Differing pixels after the pixel-tolerance floor.
    pub differing_pixels: u32,
    /// Differing pixels before the floor was applied.
    pub raw_differing_pixels: u32,
    /// Diff image with the baseline's dimensions, when one was requested.
    pub diff: Option<PixelBuffer>,
}

/// Compare `actual` against `baseline`.
///
/// Both buffers must hold the same number of samples; otherwise
/// [`CaptureError::SizeMismatch`] is returned. When `diff` is set, a diff
/// image is rendered for every position regardless of the final verdict.
pub fn compare(
    actual: &PixelBuffer,
    baseline: &PixelBuffer,
    tolerances: Tolerances,
    diff: Option<DiffMode>,
) -> CaptureResult<Comparison> {
    let pixel_count = actual.len();
    let chunk = if should_parallelize(
        pixel_count,
        COMPARE_PARALLEL_MIN_PIXELS,
        COMPARE_PARALLEL_MIN_CHUNK_PIXELS,
        COMPARE_PARALLEL_MAX_WORKERS,
    ) {
        parallel_chunk_pixels(
            pixel_count,
            COMPARE_PARALLEL_MIN_CHUNK_PIXELS,
            COMPARE_PARALLEL_MAX_WORKERS,
        )
    } else {
        None
    };
    compare_chunked(actual, baseline, tolerances, diff, chunk)
}

fn compare_chunked(
    actual: &PixelBuffer,
    baseline: &PixelBuffer,
    tolerances: Tolerances,
    diff: Option<DiffMode>,
    chunk: Option<usize>,
) -> CaptureResult<Comparison> {
    if actual.len() != baseline.len() {
        return Err(CaptureError::SizeMismatch {
            actual: actual.dimensions(),
            baseline: baseline.dimensions(),
        });
    }

    let threshold = tolerances.color_threshold();
    let a = actual.samples();
    let b = baseline.samples();

    let (raw, diff) = match diff {
        Some(mode) => {
            let mut out = vec![0u32; a.len()];
            let raw: u64 = match chunk {
                Some(chunk) => out
                    .par_chunks_mut(chunk)
                    .zip(a.par_chunks(chunk))
                    .zip(b.par_chunks(chunk))
                    .map(|((dst, a), b)| render_span(a, b, threshold, mode, dst))
                    .sum(),
                None => render_span(a, b, threshold, mode, &mut out),
            };
            let (width, height) = baseline.dimensions();
            (raw, Some(PixelBuffer::from_argb(width, height, out)?))
        }
        None => {
            let raw: u64 = match chunk {
                Some(chunk) => a
                    .par_chunks(chunk)
                    .zip(b.par_chunks(chunk))
                    .map(|(a, b)| count_span(a, b, threshold))
                    .sum(),
                None => count_span(a, b, threshold),
            };
            (raw, None)
        }
    };

    let raw = u32::try_from(raw).map_err(|_| CaptureError::BufferOverflow)?;
    Ok(Comparison {
        differing_pixels: tolerances.reduce(raw, a.len()),
        raw_differing_pixels: raw,
        diff,
    })
}

#[inline(always)]
fn pixel_delta(a: u32, b: u32) -> ChannelDelta {
    ChannelDelta::between(Pixel::from_argb(a), Pixel::from_argb(b))
}

fn count_span(actual: &[u32], baseline: &[u32], threshold: u8) -> u64 {
    actual
        .iter()
        .zip(baseline)
        .filter(|&(&a, &b)| pixel_delta(a, b).exceeds(threshold))
        .count() as u64
}

fn render_span(
    actual: &[u32],
    baseline: &[u32],
    threshold: u8,
    mode: DiffMode,
    out: &mut [u32],
) -> u64 {
    let mut differing = 0u64;
    for ((dst, &a), &b) in out.iter_mut().zip(actual).zip(baseline) {
        let delta = pixel_delta(a, b);
        let off = delta.exceeds(threshold);
        differing += u64::from(off);
        *dst = mode.render(delta, off).to_argb();
    }
    differing
}
