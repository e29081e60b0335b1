//! Decoded RGB output.

use crate::error::BlurhashError;

/// Bytes per pixel in a [`PixelBuffer`].
pub const CHANNELS: usize = 3;

/// A `width x height` RGB image, row-major with the origin at the top-left.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Allocate a zeroed buffer, reporting allocation failure as an error
    /// instead of aborting.
    pub(crate) fn try_zeroed(width: u32, height: u32) -> Result<Self, BlurhashError> {
        let bytes = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(CHANNELS))
            .ok_or(BlurhashError::OutOfMemory { bytes: usize::MAX })?;
        let mut data = Vec::new();
        data.try_reserve_exact(bytes)
            .map_err(|_| BlurhashError::OutOfMemory { bytes })?;
        data.resize(bytes, 0);
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw `RGBRGB...` bytes, `width * height * 3` long.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// The RGB triple at `(x, y)`, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * CHANNELS;
        Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    }

    /// Iterate over pixels in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = [u8; 3]> + '_ {
        self.data.chunks_exact(CHANNELS).map(|c| [c[0], c[1], c[2]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeroed_layout() {
        let buf = PixelBuffer::try_zeroed(4, 2).unwrap();
        assert_eq!(buf.as_bytes().len(), 4 * 2 * 3);
        assert_eq!(buf.pixels().count(), 8);
        assert_eq!(buf.pixel(3, 1), Some([0, 0, 0]));
        assert_eq!(buf.pixel(4, 0), None);
        assert_eq!(buf.pixel(0, 2), None);
    }

    #[test]
    fn test_pixel_indexing_is_row_major() {
        let mut buf = PixelBuffer::try_zeroed(3, 2).unwrap();
        // (x = 2, y = 1) -> index (1 * 3 + 2) * 3 = 15
        buf.as_bytes_mut()[15..18].copy_from_slice(&[1, 2, 3]);
        assert_eq!(buf.pixel(2, 1), Some([1, 2, 3]));
        assert_eq!(buf.pixels().last(), Some([1, 2, 3]));
    }
}
