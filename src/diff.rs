//! Visual encoding of per-pixel differences.

use crate::pixel::Pixel;

/// How a differing pixel is drawn in the diff image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DiffMode {
    /// Solid marker: every channel saturated.
    Binary,
    /// Opaque pixel whose color channels carry the raw channel deltas, so
    /// the magnitude of the disagreement stays visible.
    #[default]
    Graded,
}

impl DiffMode {
    pub fn from_binary_flag(binary: bool) -> Self {
        if binary { Self::Binary } else { Self::Graded }
    }

    /// Diff-image pixel for one position. Matching positions are always
    /// opaque black.
    #[inline(always)]
    pub fn render(self, delta: ChannelDelta, differing: bool) -> Pixel {
        if !differing {
            return Pixel::OPAQUE_BLACK;
        }
        match self {
            Self::Binary => Pixel::SATURATED,
            Self::Graded => Pixel::new(0xFF, delta.r, delta.g, delta.b),
        }
    }
}

/// Absolute per-channel difference between two pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelDelta {
    pub a: u8,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl ChannelDelta {
    #[inline(always)]
    pub fn between(lhs: Pixel, rhs: Pixel) -> Self {
        Self {
            a: lhs.a.abs_diff(rhs.a),
            r: lhs.r.abs_diff(rhs.r),
            g: lhs.g.abs_diff(rhs.g),
            b: lhs.b.abs_diff(rhs.b),
        }
    }

    /// True when any single channel is further apart than `threshold`.
    #[inline(always)]
    pub fn exceeds(self, threshold: u8) -> bool {
        self.a > threshold || self.r > threshold || self.g > threshold || self.b > threshold
    }
}
