//! Owned RGBA pixel memory.
//!
//! A [`RasterBuffer`] is the unit of work handed from stage to stage. It is
//! never shared: every stage takes it by value and returns a new (or the same)
//! buffer, so two candidates can never observe each other's pixels.

use crate::error::StageError;

/// Tightly packed, row-major, straight-alpha RGBA pixels.
///
/// Invariant: `pixels.len() == width * height * 4` and both dimensions are at
/// least 1. The fields are private so the invariant only has to be checked in
/// the constructors.
#[derive(Clone, PartialEq, Eq)]
pub struct RasterBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RasterBuffer {
    /// Wrap existing pixel memory, checking the length invariant.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, StageError> {
        if width == 0 || height == 0 {
            return Err(StageError::InvalidDimensions { width, height });
        }
        let expected = byte_len(width, height);
        if pixels.len() != expected {
            return Err(StageError::Internal(format!(
                "pixel buffer holds {} bytes, {}x{} RGBA needs {}",
                pixels.len(),
                width,
                height,
                expected
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// A fully transparent `(0,0,0,0)` buffer.
    pub fn transparent(width: u32, height: u32) -> Result<Self, StageError> {
        Self::filled(width, height, [0, 0, 0, 0])
    }

    /// A buffer with every pixel set to `rgba`.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self, StageError> {
        if width == 0 || height == 0 {
            return Err(StageError::InvalidDimensions { width, height });
        }
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(byte_len(width, height))
            .collect();
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Byte length of one row.
    pub fn stride(&self) -> usize {
        self.width as usize * 4
    }

    /// Pixel at `(x, y)`. Panics when out of bounds, like slice indexing.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = self.offset(x, y);
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        let i = self.offset(x, y);
        self.pixels[i..i + 4].copy_from_slice(&rgba);
    }

    /// One row of pixels.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride();
        &self.pixels[start..start + self.stride()]
    }

    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let stride = self.stride();
        let start = y as usize * stride;
        &mut self.pixels[start..start + stride]
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        assert!(
            x < self.width && y < self.height,
            "pixel ({x},{y}) outside {}x{}",
            self.width,
            self.height
        );
        (y as usize * self.width as usize + x as usize) * 4
    }
}

impl std::fmt::Debug for RasterBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

fn byte_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}
