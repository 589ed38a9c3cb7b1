//! Format normalisation: arbitrary bytes → canonical RGBA [`RasterBuffer`].
//!
//! Generators and enrichment providers hand back whatever they like: PNG,
//! JPEG, WebP, sometimes base64 text. PNG input (detected by its 8-byte
//! signature) goes straight to the `png` crate. Everything else walks an
//! ordered chain of [`Decoder`]s and the first one that succeeds wins.
//!
//! When nothing can parse the bytes the normaliser does not fail. It returns
//! [`Normalized::Unverified`] with the original bytes, and any later stage
//! that needs pixels must reject them explicitly.

use crate::raster::RasterBuffer;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::io::Cursor;
use tracing::{debug, warn};

/// PNG file signature.
pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Check the PNG signature.
pub fn is_png(bytes: &[u8]) -> bool {
    bytes.starts_with(&PNG_SIGNATURE)
}

/// One way of turning bytes into pixels.
///
/// A decoder returns `Err` for anything it cannot fully parse; it never
/// guesses.
pub trait Decoder: Send + Sync {
    /// Short name used in logs and stage messages.
    fn name(&self) -> &'static str;

    fn decode(&self, bytes: &[u8]) -> Result<RasterBuffer, String>;
}

/// Result of normalisation.
#[derive(Debug)]
pub enum Normalized {
    Decoded {
        raster: RasterBuffer,
        decoder: &'static str,
    },
    /// No decoder accepted the bytes; they are passed through untouched.
    Unverified(Vec<u8>),
}

/// Decoder chain with a PNG fast path.
pub struct FormatNormalizer {
    png: PngDecoder,
    chain: Vec<Box<dyn Decoder>>,
}

impl Default for FormatNormalizer {
    fn default() -> Self {
        Self::with_chain(vec![Box::new(ImageCrateDecoder), Box::new(EmbeddedBase64Decoder)])
    }
}

impl FormatNormalizer {
    /// Use a custom fallback chain, tried in order after the PNG fast path.
    pub fn with_chain(chain: Vec<Box<dyn Decoder>>) -> Self {
        Self {
            png: PngDecoder,
            chain,
        }
    }

    pub fn normalize(&self, bytes: Vec<u8>) -> Normalized {
        if is_png(&bytes) {
            match self.png.decode(&bytes) {
                Ok(raster) => {
                    debug!(
                        "Decoded {}x{} via {}",
                        raster.width(),
                        raster.height(),
                        self.png.name()
                    );
                    return Normalized::Decoded {
                        raster,
                        decoder: self.png.name(),
                    };
                }
                Err(e) => warn!("PNG signature present but direct decode failed: {}", e),
            }
        }

        for decoder in &self.chain {
            match decoder.decode(&bytes) {
                Ok(raster) => {
                    debug!(
                        "Decoded {}x{} via {}",
                        raster.width(),
                        raster.height(),
                        decoder.name()
                    );
                    return Normalized::Decoded {
                        raster,
                        decoder: decoder.name(),
                    };
                }
                Err(e) => debug!("Decoder {} rejected input: {}", decoder.name(), e),
            }
        }

        warn!(
            "No decoder accepted {} bytes; passing them through unverified",
            bytes.len()
        );
        Normalized::Unverified(bytes)
    }
}

/// Direct PNG decode with the `png` crate. Expands palettes, strips 16-bit
/// samples and widens grey/RGB to RGBA.
pub struct PngDecoder;

impl Decoder for PngDecoder {
    fn name(&self) -> &'static str {
        "png"
    }

    fn decode(&self, bytes: &[u8]) -> Result<RasterBuffer, String> {
        let mut decoder = png::Decoder::new(Cursor::new(bytes));
        decoder.set_transformations(png::Transformations::normalize_to_color8());
        let mut reader = decoder.read_info().map_err(|e| e.to_string())?;
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf).map_err(|e| e.to_string())?;
        buf.truncate(info.buffer_size());

        let rgba = match info.color_type {
            png::ColorType::Rgba => buf,
            png::ColorType::Rgb => buf
                .chunks_exact(3)
                .flat_map(|p| [p[0], p[1], p[2], 255])
                .collect(),
            png::ColorType::Grayscale => buf.iter().flat_map(|&g| [g, g, g, 255]).collect(),
            png::ColorType::GrayscaleAlpha => buf
                .chunks_exact(2)
                .flat_map(|p| [p[0], p[0], p[0], p[1]])
                .collect(),
            png::ColorType::Indexed => {
                return Err("palette was not expanded".to_string());
            }
        };

        RasterBuffer::from_rgba(info.width, info.height, rgba).map_err(|e| e.to_string())
    }
}

/// General decode through the `image` crate (format sniffed from content).
pub struct ImageCrateDecoder;

impl Decoder for ImageCrateDecoder {
    fn name(&self) -> &'static str {
        "image"
    }

    fn decode(&self, bytes: &[u8]) -> Result<RasterBuffer, String> {
        let img = image::load_from_memory(bytes).map_err(|e| e.to_string())?;
        let rgba = img.into_rgba8();
        let (w, h) = rgba.dimensions();
        RasterBuffer::from_rgba(w, h, rgba.into_raw()).map_err(|e| e.to_string())
    }
}

/// Base64 text (optionally a `data:` URI) wrapping an image file.
pub struct EmbeddedBase64Decoder;

impl Decoder for EmbeddedBase64Decoder {
    fn name(&self) -> &'static str {
        "base64"
    }

    fn decode(&self, bytes: &[u8]) -> Result<RasterBuffer, String> {
        let text = std::str::from_utf8(bytes).map_err(|_| "not text".to_string())?;
        let payload = match text.trim().split_once(";base64,") {
            Some((prefix, data)) if prefix.starts_with("data:") => data,
            _ => text.trim(),
        };
        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        let raw = STANDARD.decode(compact).map_err(|e| e.to_string())?;
        if is_png(&raw) {
            PngDecoder.decode(&raw)
        } else {
            ImageCrateDecoder.decode(&raw)
        }
    }
}
