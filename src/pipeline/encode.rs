//! PNG encoding: [`RasterBuffer`] → PNG bytes, optionally DPI-tagged.
//!
//! Every byte that leaves the core is PNG: lossless, alpha-capable, and the
//! format enrichment providers and print shops both accept. When a DPI is
//! given the encoder writes a `pHYs` chunk so layout tools open the file at
//! its physical size instead of assuming 72 DPI.

use crate::raster::RasterBuffer;
use tracing::debug;

const METRES_PER_INCH: f64 = 0.0254;

/// Encode as 8-bit RGBA PNG. `dpi` adds a `pHYs` chunk.
pub fn encode_png(
    raster: &RasterBuffer,
    dpi: Option<u32>,
) -> Result<Vec<u8>, png::EncodingError> {
    let mut buf = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut buf, raster.width(), raster.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        if let Some(dpi) = dpi {
            let ppm = dots_per_metre(dpi);
            encoder.set_pixel_dims(Some(png::PixelDimensions {
                xppu: ppm,
                yppu: ppm,
                unit: png::Unit::Meter,
            }));
        }
        let mut writer = encoder.write_header()?;
        writer.write_image_data(raster.pixels())?;
    }
    debug!(
        "Encoded {}x{} → {} bytes PNG",
        raster.width(),
        raster.height(),
        buf.len()
    );
    Ok(buf)
}

/// Pixels per metre for a DPI, rounded as PNG readers expect.
pub fn dots_per_metre(dpi: u32) -> u32 {
    (dpi as f64 / METRES_PER_INCH).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::normalize::{Decoder, PngDecoder};
    use std::io::Cursor;

    #[test]
    fn encode_small_raster() {
        let raster = RasterBuffer::filled(10, 10, [255, 0, 0, 255]).unwrap();
        let bytes = encode_png(&raster, None).expect("encode should succeed");
        assert!(crate::pipeline::normalize::is_png(&bytes));
        let back = PngDecoder.decode(&bytes).unwrap();
        assert_eq!(back, raster);
    }

    #[test]
    fn dpi_is_written_to_phys() {
        let raster = RasterBuffer::transparent(3, 3).unwrap();
        let bytes = encode_png(&raster, Some(300)).unwrap();
        let reader = png::Decoder::new(Cursor::new(bytes)).read_info().unwrap();
        let dims = reader.info().pixel_dims.expect("pHYs present");
        assert_eq!(dims.xppu, 11811);
        assert_eq!(dims.unit, png::Unit::Meter);
    }

    #[test]
    fn ppm_for_common_dpis() {
        assert_eq!(dots_per_metre(72), 2835);
        assert_eq!(dots_per_metre(300), 11811);
    }
}
