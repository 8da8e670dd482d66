//! Structured pixel values.
//!
//! Snapshot providers and codecs exchange packed 32-bit ARGB samples
//! (`a << 24 | r << 16 | g << 8 | b`). Everything inside the comparison and
//! diff code works on [`Pixel`] instead, converting only at the edges.

/// Packed value of an opaque black pixel.
pub const OPAQUE_BLACK: u32 = 0xFF00_0000;

/// Packed value with every channel saturated, used as the binary diff marker.
pub const SATURATED: u32 = 0xFFFF_FFFF;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Pixel {
    pub a: u8,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Pixel {
    pub const OPAQUE_BLACK: Self = Self::from_argb(OPAQUE_BLACK);
    pub const SATURATED: Self = Self::from_argb(SATURATED);

    pub const fn new(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self { a, r, g, b }
    }

    #[inline(always)]
    pub const fn from_argb(packed: u32) -> Self {
        Self {
            a: (packed >> 24) as u8,
            r: (packed >> 16) as u8,
            g: (packed >> 8) as u8,
            b: packed as u8,
        }
    }

    #[inline(always)]
    pub const fn to_argb(self) -> u32 {
        ((self.a as u32) << 24) | ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }

    #[inline(always)]
    pub const fn from_rgba(bytes: [u8; 4]) -> Self {
        Self {
            r: bytes[0],
            g: bytes[1],
            b: bytes[2],
            a: bytes[3],
        }
    }

    #[inline(always)]
    pub const fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl From<u32> for Pixel {
    fn from(packed: u32) -> Self {
        Self::from_argb(packed)
    }
}

impl From<Pixel> for u32 {
    fn from(pixel: Pixel) -> Self {
        pixel.to_argb()
    }
}
