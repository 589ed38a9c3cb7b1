//! Transparent margin padding.
//!
//! Generated subjects often touch the image edge. A margin proportional to
//! the shorter edge keeps them off the trim line once the padded image is
//! fitted into the trim box. No resampling happens here.

use crate::error::StageError;
use crate::pipeline::composite::composite;
use crate::raster::RasterBuffer;

/// Margin in pixels: `max(1, floor(min(w, h) * fraction))`.
pub fn margin_px(width: u32, height: u32, fraction: f64) -> u32 {
    let base = width.min(height) as f64;
    ((base * fraction).floor() as u32).max(1)
}

/// Surround `src` with a fully transparent border of [`margin_px`] pixels.
///
/// The output is `(w + 2·pad) × (h + 2·pad)` and the source pixels sit
/// verbatim at `(pad, pad)`.
pub fn pad(src: RasterBuffer, fraction: f64) -> Result<RasterBuffer, StageError> {
    let pad = margin_px(src.width(), src.height(), fraction);
    let width = src
        .width()
        .checked_add(2 * pad)
        .ok_or(StageError::InvalidDimensions {
            width: src.width(),
            height: src.height(),
        })?;
    let height = src
        .height()
        .checked_add(2 * pad)
        .ok_or(StageError::InvalidDimensions {
            width: src.width(),
            height: src.height(),
        })?;
    let canvas = RasterBuffer::transparent(width, height)?;
    composite(canvas, &src, pad, pad)
}
