//! Proof overlay: trim and safe-area guides drawn on a copy of a final raster.
//!
//! Each guide is four independent 2-pixel rectangles alpha-blended over the
//! image, red at the trim line and green at the safe line. Corners are not
//! joined; where rectangles overlap the one drawn last wins.
//!
//! The trim guide follows the box [`bleed_canvas`](super::composite::bleed_canvas)
//! actually placed the trim raster in. With an odd `final - trim` difference
//! that box sits one pixel closer to the top/left than `round(bleed * dpi)`.

use crate::config::DerivedDimensions;
use crate::raster::RasterBuffer;

/// Width of every guide line in pixels.
pub const LINE_WIDTH: u32 = 2;

/// Trim guide colour.
pub const TRIM_COLOR: [u8; 3] = [255, 0, 0];

/// Safe-area guide colour.
pub const SAFE_COLOR: [u8; 3] = [0, 200, 0];

/// A pixel rectangle on the final canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuideBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl GuideBox {
    /// The trim box as laid out on the bleed canvas.
    pub fn trim_of(dims: &DerivedDimensions) -> Self {
        let (x, y) = dims.trim_offset();
        Self {
            x,
            y,
            width: dims.trim_width,
            height: dims.trim_height,
        }
    }

    /// A box inset `inset` from every edge of a `width × height` raster.
    pub fn inset(width: u32, height: u32, inset: u32) -> Self {
        let twice = inset.saturating_mul(2);
        Self {
            x: inset,
            y: inset,
            width: width.saturating_sub(twice),
            height: height.saturating_sub(twice),
        }
    }

    /// Shrink by `by` on every side, `None` when nothing is left.
    pub fn shrink(self, by: u32) -> Option<Self> {
        let twice = by.checked_mul(2)?;
        if twice >= self.width || twice >= self.height {
            return None;
        }
        Some(Self {
            x: self.x.checked_add(by)?,
            y: self.y.checked_add(by)?,
            width: self.width - twice,
            height: self.height - twice,
        })
    }

    fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Render guides onto a copy of `raster`.
///
/// The red guide runs just inside `trim`; the green one `safety_px` further
/// in. `alpha` is the guide opacity in `[0, 1]`.
pub fn render_proof(
    raster: &RasterBuffer,
    trim: GuideBox,
    safety_px: u32,
    alpha: f32,
) -> RasterBuffer {
    let mut out = raster.clone();
    draw_box(&mut out, trim, TRIM_COLOR, alpha);
    if let Some(safe) = trim.shrink(safety_px) {
        draw_box(&mut out, safe, SAFE_COLOR, alpha);
    }
    out
}

/// Four line rectangles along the inside of `b`.
fn draw_box(raster: &mut RasterBuffer, b: GuideBox, color: [u8; 3], alpha: f32) {
    if b.is_empty() {
        return;
    }
    let far_x = b.x.saturating_add(b.width).saturating_sub(LINE_WIDTH).max(b.x);
    let far_y = b.y.saturating_add(b.height).saturating_sub(LINE_WIDTH).max(b.y);

    fill_rect(raster, b.x, b.y, b.width, LINE_WIDTH, color, alpha); // top
    fill_rect(raster, b.x, far_y, b.width, LINE_WIDTH, color, alpha); // bottom
    fill_rect(raster, b.x, b.y, LINE_WIDTH, b.height, color, alpha); // left
    fill_rect(raster, far_x, b.y, LINE_WIDTH, b.height, color, alpha); // right
}

/// Blend a solid rectangle over the raster, clipped to its bounds.
pub fn fill_rect(
    raster: &mut RasterBuffer,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    color: [u8; 3],
    alpha: f32,
) {
    let x_end = x.saturating_add(width).min(raster.width());
    let y_end = y.saturating_add(height).min(raster.height());
    for py in y.min(y_end)..y_end {
        let row = raster.row_mut(py);
        for px in x.min(x_end)..x_end {
            let i = px as usize * 4;
            let blended = blend_over([row[i], row[i + 1], row[i + 2], row[i + 3]], color, alpha);
            row[i..i + 4].copy_from_slice(&blended);
        }
    }
}

/// Straight-alpha "over" of a solid colour onto one pixel.
fn blend_over(dst: [u8; 4], color: [u8; 3], alpha: f32) -> [u8; 4] {
    let a = alpha.clamp(0.0, 1.0);
    let da = dst[3] as f32 / 255.0;
    let out_a = a + da * (1.0 - a);
    if out_a <= 0.0 {
        return [0, 0, 0, 0];
    }
    let mut out = [0u8; 4];
    for c in 0..3 {
        let v = (color[c] as f32 * a + dst[c] as f32 * da * (1.0 - a)) / out_a;
        out[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge_distance(x: u32, y: u32, w: u32, h: u32) -> u32 {
        x.min(w - 1 - x).min(y).min(h - 1 - y)
    }

    #[test]
    fn only_guide_bands_change() {
        let (w, h, b, s) = (100, 80, 5, 10);
        let src = RasterBuffer::filled(w, h, [40, 40, 40, 255]).unwrap();
        let out = render_proof(&src, GuideBox::inset(w, h, b), s, 0.7);
        let allowed = [b, b + 1, b + s, b + s + 1];
        let mut changed = 0;
        for y in 0..h {
            for x in 0..w {
                if out.pixel(x, y) != src.pixel(x, y) {
                    changed += 1;
                    let d = edge_distance(x, y, w, h);
                    assert!(allowed.contains(&d), "pixel ({x},{y}) at distance {d} changed");
                }
            }
        }
        assert!(changed > 0);
    }

    #[test]
    fn input_is_not_mutated() {
        let src = RasterBuffer::filled(20, 20, [1, 2, 3, 255]).unwrap();
        let before = src.clone();
        let _ = render_proof(&src, GuideBox::inset(20, 20, 2), 3, 0.7);
        assert_eq!(src, before);
    }

    #[test]
    fn trim_line_is_red_over_opaque() {
        let src = RasterBuffer::filled(30, 30, [0, 0, 0, 255]).unwrap();
        let out = render_proof(&src, GuideBox::inset(30, 30, 3), 6, 0.7);
        // top trim line, away from the left/right lines
        let p = out.pixel(15, 3);
        assert!((178..=179).contains(&p[0]), "got {p:?}");
        assert_eq!((p[1], p[2], p[3]), (0, 0, 255));
        // safe line is green
        let g = out.pixel(15, 9);
        assert!((139..=140).contains(&g[1]), "got {g:?}");
        assert_eq!((g[0], g[2], g[3]), (0, 0, 255));
        // centre untouched
        assert_eq!(out.pixel(15, 15), [0, 0, 0, 255]);
    }

    #[test]
    fn guides_on_transparent_get_partial_alpha() {
        let src = RasterBuffer::transparent(10, 10).unwrap();
        let out = render_proof(&src, GuideBox::inset(10, 10, 1), 2, 0.7);
        let p = out.pixel(5, 1);
        assert_eq!(&p[..3], &[255, 0, 0]);
        assert!((178..=179).contains(&p[3]), "got {p:?}");
    }

    #[test]
    fn oversized_inset_draws_nothing() {
        let src = RasterBuffer::filled(6, 6, [9, 9, 9, 255]).unwrap();
        let out = render_proof(&src, GuideBox::inset(6, 6, 3), 5, 0.7);
        assert_eq!(out, src);
    }

    #[test]
    fn trim_guide_hugs_the_placed_trim_raster() {
        use crate::config::PhysicalSpec;
        use crate::pipeline::composite::bleed_canvas;

        // 300 DPI × 0.125 in = 37.5 px of bleed: the canvas gets 75 px of
        // slack, so the trim raster lands at 37 while round(bleed) is 38.
        let dims = PhysicalSpec::default().derive();
        let (ox, oy) = dims.trim_offset();
        assert_ne!(ox, dims.bleed_px);

        let trim = RasterBuffer::filled(dims.trim_width, dims.trim_height, [0, 0, 0, 255]).unwrap();
        let canvas = bleed_canvas(&trim, &dims).unwrap();
        let out = render_proof(&canvas, GuideBox::trim_of(&dims), dims.safety_px, 0.7);

        let is_red = |p: [u8; 4]| p[0] > 150 && p[1] == 0 && p[3] == 255;
        let y = oy + dims.trim_height / 2;
        let red: Vec<u32> = (0..out.width()).filter(|&x| is_red(out.pixel(x, y))).collect();
        let right = ox + dims.trim_width - 1;
        assert_eq!(red, vec![ox, ox + 1, right - 1, right]);

        let x = ox + dims.trim_width / 2;
        let red: Vec<u32> = (0..out.height()).filter(|&y| is_red(out.pixel(x, y))).collect();
        let bottom = oy + dims.trim_height - 1;
        assert_eq!(red, vec![oy, oy + 1, bottom - 1, bottom]);

        // left gap to the trim edge equals the right gap
        assert_eq!(red[0] - oy, bottom - red[3]);
    }

    #[test]
    fn shrink_collapses_to_none() {
        let b = GuideBox::inset(10, 8, 1);
        assert_eq!(b.shrink(2), Some(GuideBox { x: 3, y: 3, width: 4, height: 2 }));
        assert_eq!(b.shrink(3), None);
    }
}
