use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder};

use crate::error::{CaptureError, CaptureResult};
use crate::frame::PixelBuffer;

/// Default PNG quality, on the 0..=100 scale.
pub const DEFAULT_PNG_QUALITY: u8 = 80;

/// Image file format boundary: bytes in, pixels out, and back.
pub trait ImageCodec: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> CaptureResult<PixelBuffer>;
    fn encode(&self, buffer: &PixelBuffer) -> CaptureResult<Vec<u8>>;

    /// File extension (without the dot) for encoded artifacts.
    fn extension(&self) -> &'static str;
}

/// PNG codec backed by the `image` crate.
#[derive(Clone, Copy, Debug)]
pub struct PngCodec {
    quality: u8,
}

impl PngCodec {
    /// `quality` uses the 0..=100 scale; values above 100 are treated as 100.
    /// PNG is lossless, so quality only selects the compression effort.
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.min(100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    fn compression(&self) -> CompressionType {
        match self.quality {
            0..=33 => CompressionType::Fast,
            34..=66 => CompressionType::Default,
            _ => CompressionType::Best,
        }
    }
}

impl Default for PngCodec {
    fn default() -> Self {
        Self::new(DEFAULT_PNG_QUALITY)
    }
}

impl ImageCodec for PngCodec {
    fn decode(&self, bytes: &[u8]) -> CaptureResult<PixelBuffer> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| CaptureError::io("failed to decode image", e))?
            .to_rgba8();
        let (width, height) = image.dimensions();
        PixelBuffer::from_rgba8(width, height, image.as_raw())
    }

    fn encode(&self, buffer: &PixelBuffer) -> CaptureResult<Vec<u8>> {
        let (width, height) = buffer.dimensions();
        let rgba = buffer.to_rgba8();
        let mut bytes = Vec::new();
        PngEncoder::new_with_quality(&mut bytes, self.compression(), FilterType::Adaptive)
            .write_image(&rgba, width, height, ExtendedColorType::Rgba8)
            .map_err(|e| CaptureError::io(format!("failed to encode {width}x{height} PNG"), e))?;
        Ok(bytes)
    }

    fn extension(&self) -> &'static str {
        "png"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_preserves_alpha_and_color() -> CaptureResult<()> {
        let codec = PngCodec::default();
        let source = PixelBuffer::from_argb(2, 2, vec![0xFF00_0000, 0x80FF_0000, 0x0000_FF00, 0xFFFF_FFFF])?;
        let decoded = codec.decode(&codec.encode(&source)?)?;
        assert_eq!(decoded, source);
        Ok(())
    }

    #[test]
    fn garbage_bytes_are_an_io_error() {
        let err = PngCodec::default().decode(b"definitely not a png").unwrap_err();
        assert!(matches!(err, CaptureError::Io(_)));
    }

    #[test]
    fn quality_selects_compression_effort() {
        assert!(matches!(PngCodec::new(10).compression(), CompressionType::Fast));
        assert!(matches!(PngCodec::new(50).compression(), CompressionType::Default));
        assert!(matches!(PngCodec::new(80).compression(), CompressionType::Best));
        assert_eq!(PngCodec::new(250).quality(), 100);
    }
}
