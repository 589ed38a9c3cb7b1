//! Canvas compositing: overwrite-copy a foreground into a larger canvas.
//!
//! This is a straight row copy, not an alpha blend. Callers only ever place a
//! foreground onto a region of a fresh transparent canvas that nothing else
//! has painted, so blending would give the same result at a higher cost.

use crate::config::DerivedDimensions;
use crate::error::StageError;
use crate::raster::RasterBuffer;

/// Copy `foreground` into `background` with its top-left corner at
/// `(offset_x, offset_y)`.
///
/// Fails with [`StageError::InvalidDimensions`] if the foreground does not fit.
pub fn composite(
    mut background: RasterBuffer,
    foreground: &RasterBuffer,
    offset_x: u32,
    offset_y: u32,
) -> Result<RasterBuffer, StageError> {
    let fits_x = offset_x as u64 + foreground.width() as u64 <= background.width() as u64;
    let fits_y = offset_y as u64 + foreground.height() as u64 <= background.height() as u64;
    if !fits_x || !fits_y {
        return Err(StageError::InvalidDimensions {
            width: foreground.width(),
            height: foreground.height(),
        });
    }

    let start = offset_x as usize * 4;
    let len = foreground.stride();
    for y in 0..foreground.height() {
        let dst = background.row_mut(offset_y + y);
        dst[start..start + len].copy_from_slice(foreground.row(y));
    }
    Ok(background)
}

/// Place `foreground` centred on a new transparent `width × height` canvas.
pub fn center_on_canvas(
    foreground: &RasterBuffer,
    width: u32,
    height: u32,
) -> Result<RasterBuffer, StageError> {
    if foreground.width() > width || foreground.height() > height {
        return Err(StageError::InvalidDimensions {
            width: foreground.width(),
            height: foreground.height(),
        });
    }
    let canvas = RasterBuffer::transparent(width, height)?;
    composite(
        canvas,
        foreground,
        (width - foreground.width()) / 2,
        (height - foreground.height()) / 2,
    )
}

/// Assemble the bleed canvas: the trim-sized image centred inside a
/// transparent `final_width × final_height` canvas.
pub fn bleed_canvas(
    trim: &RasterBuffer,
    dims: &DerivedDimensions,
) -> Result<RasterBuffer, StageError> {
    if trim.width() != dims.trim_width || trim.height() != dims.trim_height {
        return Err(StageError::Internal(format!(
            "trim raster is {}x{}, expected {}x{}",
            trim.width(),
            trim.height(),
            dims.trim_width,
            dims.trim_height
        )));
    }
    let (ox, oy) = dims.trim_offset();
    let canvas = RasterBuffer::transparent(dims.final_width, dims.final_height)?;
    composite(canvas, trim, ox, oy)
}
