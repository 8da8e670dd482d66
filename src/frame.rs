use crate::error::{CaptureError, CaptureResult};
use crate::pixel::Pixel;

/// A `width` x `height` grid of packed ARGB samples in row-major order.
///
/// This is the common currency between the snapshot provider, the
/// sub-rect extractor, the comparator and the codec. A buffer is filled
/// once when it is created and only read afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    samples: Vec<u32>,
    width: u32,
    height: u32,
}

impl PixelBuffer {
    pub fn empty() -> Self {
        Self {
            samples: Vec::new(),
            width: 0,
            height: 0,
        }
    }

    pub fn from_argb(width: u32, height: u32, samples: Vec<u32>) -> CaptureResult<Self> {
        let expected = pixel_len(width, height)?;
        if samples.len() != expected {
            return Err(CaptureError::InvalidConfig(format!(
                "ARGB sample count mismatch: got {}, expected {} for {}x{}",
                samples.len(),
                expected,
                width,
                height
            )));
        }

        Ok(Self {
            samples,
            width,
            height,
        })
    }

    /// A buffer with every sample set to `packed`.
    pub fn filled(width: u32, height: u32, packed: u32) -> CaptureResult<Self> {
        let len = pixel_len(width, height)?;
        Ok(Self {
            samples: vec![packed; len],
            width,
            height,
        })
    }

    /// Build a buffer from tightly packed RGBA8 bytes, the layout codecs
    /// produce.
    pub fn from_rgba8(width: u32, height: u32, data: &[u8]) -> CaptureResult<Self> {
        let expected = pixel_len(width, height)?
            .checked_mul(4)
            .ok_or(CaptureError::BufferOverflow)?;
        if data.len() != expected {
            return Err(CaptureError::InvalidConfig(format!(
                "RGBA frame data length mismatch: got {}, expected {} for {}x{}",
                data.len(),
                expected,
                width,
                height
            )));
        }

        let samples = data
            .chunks_exact(4)
            .map(|px| Pixel::from_rgba([px[0], px[1], px[2], px[3]]).to_argb())
            .collect();
        Ok(Self {
            samples,
            width,
            height,
        })
    }

    pub fn to_rgba8(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.samples.len() * 4);
        for &packed in &self.samples {
            out.extend_from_slice(&Pixel::from_argb(packed).to_rgba());
        }
        out
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[u32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<u32> {
        self.samples
    }

    /// Sample at column `x`, row `y`, or `None` outside the buffer.
    pub fn get(&self, x: u32, y: u32) -> Option<Pixel> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = y as usize * self.width as usize + x as usize;
        self.samples.get(idx).copied().map(Pixel::from_argb)
    }
}

pub(crate) fn pixel_len(width: u32, height: u32) -> CaptureResult<usize> {
    let w = usize::try_from(width).map_err(|_| CaptureError::BufferOverflow)?;
    let h = usize::try_from(height).map_err(|_| CaptureError::BufferOverflow)?;
    w.checked_mul(h).ok_or(CaptureError::BufferOverflow)
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("samples_len", &self.samples.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_sample_count_that_does_not_match_dimensions() {
        let err = PixelBuffer::from_argb(4, 4, vec![0; 15]).unwrap_err();
        assert!(matches!(err, CaptureError::InvalidConfig(_)));
    }

    #[test]
    fn rgba8_bytes_map_onto_argb_samples() -> CaptureResult<()> {
        let buffer = PixelBuffer::from_rgba8(2, 1, &[1, 2, 3, 4, 10, 20, 30, 255])?;
        assert_eq!(buffer.samples(), &[0x04_01_02_03, 0xFF_0A_14_1E]);
        assert_eq!(buffer.to_rgba8(), vec![1, 2, 3, 4, 10, 20, 30, 255]);
        Ok(())
    }

    #[test]
    fn get_indexes_row_major() -> CaptureResult<()> {
        let buffer = PixelBuffer::from_argb(3, 2, (0..6).collect())?;
        assert_eq!(buffer.get(2, 1), Some(Pixel::from_argb(5)));
        assert_eq!(buffer.get(3, 0), None);
        Ok(())
    }
}
