//! Bilinear resampling with contain and cover fits.
//!
//! Sampling uses half-pixel centres: destination pixel `d` reads source
//! coordinate `(d + 0.5) / scale - 0.5`, clamped to `[0, size - 1]` so both
//! taps of the interpolation window stay inside the image. The scale is the
//! effective per-axis ratio `scaled / source` after rounding the scaled size
//! to whole pixels, which keeps the first and last destination pixels aligned
//! with the source edges.
//!
//! All four channels are interpolated with the same weights on straight
//! (non-premultiplied) alpha. Semi-transparent edges can pick up a little
//! colour fringing from fully transparent neighbours; that is accepted for
//! print output and keeps results identical to earlier renders.

use crate::config::FitMode;
use crate::error::StageError;
use crate::pipeline::composite::center_on_canvas;
use crate::raster::RasterBuffer;

/// Geometry of a fit, computed before any pixel is touched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitPlan {
    pub mode: FitMode,
    /// Uniform scale factor chosen for the fit.
    pub scale: f64,
    /// Size of the scaled image before centring (contain) or cropping (cover).
    pub scaled_width: u32,
    pub scaled_height: u32,
    pub target_width: u32,
    pub target_height: u32,
}

impl FitPlan {
    pub fn compute(
        src_width: u32,
        src_height: u32,
        target_width: u32,
        target_height: u32,
        mode: FitMode,
    ) -> Result<Self, StageError> {
        if src_width == 0 || src_height == 0 {
            return Err(StageError::InvalidDimensions {
                width: src_width,
                height: src_height,
            });
        }
        if target_width == 0 || target_height == 0 {
            return Err(StageError::InvalidDimensions {
                width: target_width,
                height: target_height,
            });
        }

        let sx = target_width as f64 / src_width as f64;
        let sy = target_height as f64 / src_height as f64;
        let scale = match mode {
            FitMode::Contain => sx.min(sy),
            FitMode::Cover => sx.max(sy),
        };
        let w = (src_width as f64 * scale).round() as u32;
        let h = (src_height as f64 * scale).round() as u32;
        let (scaled_width, scaled_height) = match mode {
            FitMode::Contain => (w.clamp(1, target_width), h.clamp(1, target_height)),
            FitMode::Cover => (w.max(target_width), h.max(target_height)),
        };

        Ok(Self {
            mode,
            scale,
            scaled_width,
            scaled_height,
            target_width,
            target_height,
        })
    }

    /// Top-left of the visible window inside the scaled image (cover only).
    pub fn crop_origin(&self) -> (u32, u32) {
        (
            self.scaled_width.saturating_sub(self.target_width) / 2,
            self.scaled_height.saturating_sub(self.target_height) / 2,
        )
    }
}

/// Fit `src` into exactly `target_width × target_height`.
pub fn fit(
    src: &RasterBuffer,
    target_width: u32,
    target_height: u32,
    mode: FitMode,
) -> Result<RasterBuffer, StageError> {
    let plan = FitPlan::compute(src.width(), src.height(), target_width, target_height, mode)?;
    match mode {
        FitMode::Contain => {
            let scaled = sample_window(
                src,
                plan.scaled_width,
                plan.scaled_height,
                (0, 0),
                (plan.scaled_width, plan.scaled_height),
            )?;
            center_on_canvas(&scaled, target_width, target_height)
        }
        FitMode::Cover => sample_window(
            src,
            plan.scaled_width,
            plan.scaled_height,
            plan.crop_origin(),
            (target_width, target_height),
        ),
    }
}

/// Plain bilinear resize to `width × height` (aspect not preserved).
#[cfg(test)]
fn resize(src: &RasterBuffer, width: u32, height: u32) -> Result<RasterBuffer, StageError> {
    sample_window(src, width, height, (0, 0), (width, height))
}

/// Interpolation taps for one destination coordinate.
#[derive(Clone, Copy)]
struct Tap {
    lo: usize,
    hi: usize,
    frac: f32,
}

fn taps(src_size: u32, scaled_size: u32, origin: u32, count: u32) -> Vec<Tap> {
    let scale = scaled_size as f64 / src_size as f64;
    let max = (src_size - 1) as f64;
    (origin..origin + count)
        .map(|d| {
            let s = ((d as f64 + 0.5) / scale - 0.5).clamp(0.0, max);
            let lo = s.floor() as u32;
            let hi = (lo + 1).min(src_size - 1);
            Tap {
                lo: lo as usize,
                hi: hi as usize,
                frac: (s - lo as f64) as f32,
            }
        })
        .collect()
}

/// Render the `size` window at `origin` of `src` scaled to
/// `scaled_width × scaled_height`.
fn sample_window(
    src: &RasterBuffer,
    scaled_width: u32,
    scaled_height: u32,
    origin: (u32, u32),
    size: (u32, u32),
) -> Result<RasterBuffer, StageError> {
    if scaled_width == 0 || scaled_height == 0 {
        return Err(StageError::InvalidDimensions {
            width: scaled_width,
            height: scaled_height,
        });
    }
    let xs = taps(src.width(), scaled_width, origin.0, size.0);
    let ys = taps(src.height(), scaled_height, origin.1, size.1);

    let stride = src.stride();
    let px = src.pixels();
    let mut out = Vec::with_capacity(size.0 as usize * size.1 as usize * 4);

    for ty in &ys {
        let top = &px[ty.lo * stride..(ty.lo + 1) * stride];
        let bottom = &px[ty.hi * stride..(ty.hi + 1) * stride];
        for tx in &xs {
            let (a, b) = (tx.lo * 4, tx.hi * 4);
            for c in 0..4 {
                let upper = lerp(top[a + c], top[b + c], tx.frac);
                let lower = lerp(bottom[a + c], bottom[b + c], tx.frac);
                let v = upper + (lower - upper) * ty.frac;
                out.push(v.round().clamp(0.0, 255.0) as u8);
            }
        }
    }

    RasterBuffer::from_rgba(size.0, size.1, out)
}

#[inline]
fn lerp(a: u8, b: u8, t: f32) -> f32 {
    a as f32 + (b as f32 - a as f32) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn red_square_contain_has_no_padding() {
        let src = RasterBuffer::filled(100, 100, [255, 0, 0, 255]).unwrap();
        let out = fit(&src, 50, 50, FitMode::Contain).unwrap();
        assert_eq!((out.width(), out.height()), (50, 50));
        assert!(out.pixels().chunks_exact(4).all(|p| p == [255, 0, 0, 255]));
    }

    #[test]
    fn contain_never_crops() {
        for &(sw, sh, tw, th) in &[
            (200, 100, 50, 50),
            (100, 300, 64, 80),
            (7, 3, 1000, 999),
            (1, 1, 3, 9),
            (1023, 1536, 2400, 3000),
        ] {
            let plan = FitPlan::compute(sw, sh, tw, th, FitMode::Contain).unwrap();
            assert!(plan.scaled_width <= tw && plan.scaled_height <= th, "{plan:?}");
            assert!(
                plan.scaled_width == tw || plan.scaled_height == th,
                "one axis should touch the box: {plan:?}"
            );
        }
    }

    #[test]
    fn cover_always_fills() {
        for &(sw, sh, tw, th) in &[
            (200, 100, 50, 50),
            (100, 300, 64, 80),
            (7, 3, 1000, 999),
            (1536, 1024, 2550, 3300),
        ] {
            let plan = FitPlan::compute(sw, sh, tw, th, FitMode::Cover).unwrap();
            assert!(plan.scaled_width >= tw && plan.scaled_height >= th, "{plan:?}");
        }
    }

    #[test]
    fn contain_letterboxes_wide_source() {
        let src = RasterBuffer::filled(200, 100, [0, 255, 0, 255]).unwrap();
        let out = fit(&src, 50, 50, FitMode::Contain).unwrap();
        assert_eq!((out.width(), out.height()), (50, 50));
        // scaled to 50x25, centred at y = 12
        assert_eq!(out.pixel(25, 11), [0, 0, 0, 0]);
        assert_eq!(out.pixel(25, 12), [0, 255, 0, 255]);
        assert_eq!(out.pixel(25, 36), [0, 255, 0, 255]);
        assert_eq!(out.pixel(25, 37), [0, 0, 0, 0]);
    }

    #[test]
    fn cover_crops_centre() {
        // left quarter red, middle half white, right quarter blue
        let mut src = RasterBuffer::filled(200, 100, [255, 255, 255, 255]).unwrap();
        for y in 0..100 {
            for x in 0..50 {
                src.set_pixel(x, y, [255, 0, 0, 255]);
                src.set_pixel(199 - x, y, [0, 0, 255, 255]);
            }
        }
        let out = fit(&src, 50, 50, FitMode::Cover).unwrap();
        assert_eq!((out.width(), out.height()), (50, 50));
        // scaled 100x50, window x = 25..75 covers only the white middle
        assert!(out.pixels().chunks_exact(4).all(|p| p == [255, 255, 255, 255]));
    }

    #[test]
    fn half_pixel_centres_on_upscale() {
        let mut src = RasterBuffer::transparent(2, 1).unwrap();
        src.set_pixel(0, 0, [0, 0, 0, 255]);
        src.set_pixel(1, 0, [255, 255, 255, 255]);
        let out = resize(&src, 4, 1).unwrap();
        let reds: Vec<u8> = (0..4).map(|x| out.pixel(x, 0)[0]).collect();
        assert_eq!(reds, vec![0, 64, 191, 255]);
    }

    #[test]
    fn alpha_is_interpolated_like_colour() {
        let mut src = RasterBuffer::transparent(2, 1).unwrap();
        src.set_pixel(1, 0, [200, 100, 0, 255]);
        let out = resize(&src, 4, 1).unwrap();
        // straight alpha: colour and alpha get identical weights
        assert_eq!(out.pixel(1, 0), [50, 25, 0, 64]);
    }

    #[test]
    fn identity_resize_is_lossless() {
        let mut src = RasterBuffer::transparent(3, 3).unwrap();
        src.set_pixel(1, 1, [10, 20, 30, 40]);
        src.set_pixel(2, 0, [1, 2, 3, 4]);
        let out = resize(&src, 3, 3).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn zero_source_dimension_is_rejected() {
        assert!(matches!(
            FitPlan::compute(0, 10, 5, 5, FitMode::Contain),
            Err(StageError::InvalidDimensions { width: 0, height: 10 })
        ));
        assert!(FitPlan::compute(10, 10, 0, 5, FitMode::Cover).is_err());
    }

    #[test]
    fn rounded_axis_samples_with_its_own_scale() {
        // 3x2 contain into 4x4: uniform scale 4/3 gives a 4x3 image. Rows
        // are sampled at 3/2 (the rounded ratio), not 4/3, so the middle
        // row lands exactly between the two source rows.
        let mut src = RasterBuffer::transparent(3, 2).unwrap();
        for x in 0..3 {
            src.set_pixel(x, 0, [0, 0, 0, 255]);
            src.set_pixel(x, 1, [240, 240, 240, 255]);
        }
        let plan = FitPlan::compute(3, 2, 4, 4, FitMode::Contain).unwrap();
        assert_eq!((plan.scaled_width, plan.scaled_height), (4, 3));

        let out = fit(&src, 4, 4, FitMode::Contain).unwrap();
        let column: Vec<[u8; 4]> = (0..4).map(|y| out.pixel(1, y)).collect();
        assert_eq!(
            column,
            vec![
                [0, 0, 0, 255],
                [120, 120, 120, 255],
                [240, 240, 240, 255],
                [0, 0, 0, 0],
            ]
        );
    }
}
