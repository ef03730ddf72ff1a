// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage, Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut,
};
use imageproc::rect::Rect;

use super::{Canvas, Stroke, TextStyle};
use crate::error::Result;
use crate::frame::{Frame, Resolution};
use crate::results::BoundingBox;
use crate::visualizer::Color;

/// Default label font.
pub const DEFAULT_FONT: &str = "Arial.ttf";

/// Widest stroke drawn, in pixels.
const MAX_STROKE: f32 = 64.0;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

const fn rgba(color: Color) -> Rgba<u8> {
    let [r, g, b] = color.to_array();
    Rgba([r, g, b, 255])
}

/// Clamp `v` to the band `[-margin, limit + margin]` around one canvas axis.
#[allow(clippy::cast_precision_loss)]
fn clamp_axis(v: f32, limit: u32, margin: f32) -> f32 {
    v.clamp(-margin, limit as f32 + margin)
}

/// Clip the segment `from -> to` to the box `[lo, hi]` (Liang-Barsky).
fn clip_segment(
    from: (f32, f32),
    to: (f32, f32),
    lo: (f32, f32),
    hi: (f32, f32),
) -> Option<((f32, f32), (f32, f32))> {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let (mut t0, mut t1) = (0.0_f32, 1.0_f32);
    for (p, q) in [
        (-dx, from.0 - lo.0),
        (dx, hi.0 - from.0),
        (-dy, from.1 - lo.1),
        (dy, hi.1 - from.1),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }
    Some((
        (from.0 + t0 * dx, from.1 + t0 * dy),
        (from.0 + t1 * dx, from.1 + t1 * dy),
    ))
}

/// A canvas backed by an RGBA pixel buffer.
///
/// Clearing makes every pixel transparent, so a canvas that never blits a frame is an overlay
/// layer: [`ImageCanvas::compose`] flattens it onto the picture it is meant to cover. Pixels
/// are stored with premultiplied alpha.
pub struct ImageCanvas {
    image: RgbaImage,
    font: Option<FontArc>,
}

impl ImageCanvas {
    /// Create a transparent canvas. Text is skipped until a font is set.
    #[must_use]
    pub fn new(resolution: Resolution) -> Self {
        Self {
            image: RgbaImage::new(resolution.width, resolution.height),
            font: None,
        }
    }

    /// Create a canvas and fetch the default label font.
    #[must_use]
    pub fn with_default_font(resolution: Resolution) -> Self {
        Self::new(resolution).with_font(super::load_font(DEFAULT_FONT))
    }

    /// Use `font` for labels.
    #[must_use]
    pub fn with_font(mut self, font: Option<FontArc>) -> Self {
        self.font = font;
        self
    }

    /// Current pixels, including the overlay's alpha.
    #[must_use]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Flatten the canvas onto `backdrop`, scaled to the canvas size, or onto black.
    ///
    /// Pixels the canvas has drawn over cover the backdrop; transparent pixels show it.
    #[must_use]
    pub fn compose(&self, backdrop: Option<&Frame>) -> RgbImage {
        let (width, height) = self.image.dimensions();
        let mut out = match backdrop {
            Some(frame) => frame
                .fit_to(Resolution::new(width, height))
                .image()
                .clone(),
            None => RgbImage::new(width, height),
        };
        for (dst, src) in out.pixels_mut().zip(self.image.pixels()) {
            let Rgba([r, g, b, a]) = *src;
            let keep = u16::from(255 - a);
            let blend = |over: u8, under: u8| {
                let under = (u16::from(under) * keep + 127) / 255;
                u8::try_from(u16::from(over) + under).unwrap_or(u8::MAX)
            };
            let Rgb([dr, dg, db]) = *dst;
            *dst = Rgb([blend(r, dr), blend(g, dg), blend(b, db)]);
        }
        out
    }

    /// Write the canvas flattened onto black to `path`; the format follows the extension.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.compose(None).save(path)?;
        Ok(())
    }

    fn width_i32(&self) -> i32 {
        i32::try_from(self.image.width()).unwrap_or(i32::MAX)
    }

    fn height_i32(&self) -> i32 {
        i32::try_from(self.image.height()).unwrap_or(i32::MAX)
    }
}

// Geometry comes from inference results, so every primitive skips non-finite input and
// clamps to a band around the canvas before converting to pixels.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
impl Canvas for ImageCanvas {
    fn resolution(&self) -> Resolution {
        Resolution::new(self.image.width(), self.image.height())
    }

    fn resize(&mut self, resolution: Resolution) {
        self.image = RgbaImage::new(resolution.width, resolution.height);
    }

    fn clear(&mut self) {
        self.image.pixels_mut().for_each(|p| *p = TRANSPARENT);
    }

    fn draw_frame(&mut self, frame: &Frame) {
        let fitted = frame.fit_to(self.resolution());
        for (dst, src) in self.image.pixels_mut().zip(fitted.image().pixels()) {
            let Rgb([r, g, b]) = *src;
            *dst = Rgba([r, g, b, 255]);
        }
    }

    fn stroke_rect(&mut self, rect: BoundingBox, stroke: Stroke) {
        let values = [rect.x, rect.y, rect.width, rect.height, stroke.width];
        if !values.iter().all(|v| v.is_finite()) {
            return;
        }
        // Outline straddles the rectangle edge, one pixel ring per unit of width.
        let thickness = stroke.width.round().clamp(1.0, MAX_STROKE) as i32;
        let margin = thickness as f32;
        let (cw, ch) = self.image.dimensions();
        let x0 = clamp_axis(rect.x, cw, margin);
        let y0 = clamp_axis(rect.y, ch, margin);
        let x1 = clamp_axis(rect.x + rect.width, cw, margin);
        let y1 = clamp_axis(rect.y + rect.height, ch, margin);
        let (x, y) = (x0.round() as i32, y0.round() as i32);
        let (w, h) = ((x1 - x0).round() as i32, (y1 - y0).round() as i32);
        for t in 0..thickness {
            let off = t - thickness / 2;
            let (rw, rh) = (w.saturating_sub(2 * off), h.saturating_sub(2 * off));
            if rw > 0 && rh > 0 {
                let r = Rect::at(x.saturating_add(off), y.saturating_add(off))
                    .of_size(rw.unsigned_abs(), rh.unsigned_abs());
                draw_hollow_rect_mut(&mut self.image, r, rgba(stroke.color));
            }
        }
    }

    fn fill_circle(&mut self, x: f32, y: f32, radius: f32, color: Color) {
        if !(x.is_finite() && y.is_finite() && radius.is_finite()) {
            return;
        }
        let (cw, ch) = self.image.dimensions();
        let radius = radius.clamp(0.0, (cw + ch) as f32);
        draw_filled_circle_mut(
            &mut self.image,
            (
                clamp_axis(x, cw, radius).round() as i32,
                clamp_axis(y, ch, radius).round() as i32,
            ),
            radius.round() as i32,
            rgba(color),
        );
    }

    fn line(&mut self, from: (f32, f32), to: (f32, f32), stroke: Stroke) {
        let values = [from.0, from.1, to.0, to.1, stroke.width];
        if !values.iter().all(|v| v.is_finite()) {
            return;
        }
        let thickness = stroke.width.round().clamp(1.0, MAX_STROKE) as i32;
        let margin = thickness as f32;
        let (cw, ch) = self.image.dimensions();
        let Some((from, to)) = clip_segment(
            from,
            to,
            (-margin, -margin),
            (cw as f32 + margin, ch as f32 + margin),
        ) else {
            return;
        };

        let (dx, dy) = (to.0 - from.0, to.1 - from.1);
        let len = dx.hypot(dy);
        let (nx, ny) = if len > 0.0 {
            (-dy / len, dx / len)
        } else {
            (0.0, 0.0)
        };
        for t in 0..thickness {
            let off = t as f32 - (thickness - 1) as f32 / 2.0;
            draw_line_segment_mut(
                &mut self.image,
                (from.0 + nx * off, from.1 + ny * off),
                (to.0 + nx * off, to.1 + ny * off),
                rgba(stroke.color),
            );
        }
    }

    fn text(&mut self, text: &str, x: f32, y: f32, style: TextStyle) {
        let Some(font) = &self.font else {
            return;
        };
        if !(x.is_finite() && y.is_finite() && style.size.is_finite()) || style.size <= 0.0 {
            return;
        }
        // Glyphs are at most about one em wide, so this bounds the run's extent.
        let extent = style.size * text.chars().count() as f32;
        if x < -extent || y < 0.0 {
            return;
        }
        // imageproc anchors text at its top edge.
        let top = (y - style.size).round() as i32;
        let left = x.round() as i32;
        if left >= self.width_i32() || top >= self.height_i32() {
            return;
        }
        draw_text_mut(
            &mut self.image,
            rgba(style.color),
            left,
            top,
            PxScale::from(style.size),
            font,
            text,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIME: Rgba<u8> = Rgba([0, 255, 0, 255]);

    #[test]
    fn test_stroke_rect_draws_outline_only() {
        let mut canvas = ImageCanvas::new(Resolution::new(20, 20));
        canvas.stroke_rect(
            BoundingBox::new(5.0, 5.0, 10.0, 10.0),
            Stroke::new(Color::LIME, 1.0),
        );
        assert_eq!(canvas.image().get_pixel(5, 5), &LIME);
        assert_eq!(canvas.image().get_pixel(10, 10), &TRANSPARENT);
    }

    #[test]
    fn test_unbounded_geometry_is_clamped() {
        let mut canvas = ImageCanvas::new(Resolution::new(20, 20));
        let stroke = Stroke::new(Color::LIME, 3.0);
        canvas.stroke_rect(BoundingBox::new(0.0, 0.0, f32::INFINITY, 10.0), stroke);
        canvas.stroke_rect(BoundingBox::new(f32::NAN, 0.0, 5.0, 5.0), stroke);
        canvas.stroke_rect(BoundingBox::new(-1e30, -1e30, 2e30, 2e30), stroke);
        canvas.fill_circle(f32::MAX, 1e20, 1e30, Color::RED);
        canvas.fill_circle(f32::NAN, 5.0, 2.0, Color::RED);
        canvas.line((-1e30, 0.0), (1e30, 0.0), stroke);
        canvas.line((0.0, 0.0), (f32::INFINITY, 0.0), stroke);
        canvas.line((-1e6, 10.0), (1e6, 10.0), stroke);
        canvas.text("x", f32::NEG_INFINITY, 10.0, TextStyle::new(Color::LIME, 10.0));

        // The infinite-width box keeps its visible left and top edges.
        assert_eq!(canvas.image().get_pixel(0, 0), &LIME);
        // The clipped line crosses the whole canvas.
        assert_eq!(canvas.image().get_pixel(19, 10), &LIME);
    }

    #[test]
    fn test_fill_circle_and_clear() {
        let mut canvas = ImageCanvas::new(Resolution::new(20, 20));
        canvas.fill_circle(10.0, 10.0, 5.0, Color::RED);
        assert_eq!(canvas.image().get_pixel(10, 10), &Rgba([255, 0, 0, 255]));
        canvas.clear();
        assert_eq!(canvas.image().get_pixel(10, 10), &TRANSPARENT);
    }

    #[test]
    fn test_draw_frame_scales_to_canvas() {
        let mut canvas = ImageCanvas::new(Resolution::new(8, 8));
        let frame = Frame::new(RgbImage::from_pixel(16, 16, Rgb([9, 9, 9])), 0);
        canvas.draw_frame(&frame);
        assert_eq!(canvas.image().get_pixel(7, 7), &Rgba([9, 9, 9, 255]));
    }

    #[test]
    fn test_compose_shows_backdrop_under_overlay() {
        let mut canvas = ImageCanvas::new(Resolution::new(8, 8));
        canvas.clear();
        canvas.fill_circle(0.0, 0.0, 1.0, Color::RED);
        let backdrop = Frame::new(RgbImage::from_pixel(16, 16, Rgb([40, 80, 120])), 3);

        let composed = canvas.compose(Some(&backdrop));
        assert_eq!(composed.dimensions(), (8, 8));
        assert_eq!(composed.get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(composed.get_pixel(6, 6), &Rgb([40, 80, 120]));

        let flat = canvas.compose(None);
        assert_eq!(flat.get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(flat.get_pixel(6, 6), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_blitted_frame_hides_backdrop() {
        let mut canvas = ImageCanvas::new(Resolution::new(4, 4));
        canvas.draw_frame(&Frame::new(RgbImage::from_pixel(4, 4, Rgb([9, 9, 9])), 0));
        let backdrop = Frame::new(RgbImage::from_pixel(4, 4, Rgb([200, 200, 200])), 1);
        assert!(
            canvas
                .compose(Some(&backdrop))
                .pixels()
                .all(|p| p.0 == [9, 9, 9])
        );
    }

    #[test]
    fn test_text_without_font_is_skipped() {
        let mut canvas = ImageCanvas::new(Resolution::new(8, 8));
        canvas.text("person", 0.0, 8.0, TextStyle::new(Color::LIME, 10.0));
        assert!(canvas.image().pixels().all(|p| *p == TRANSPARENT));
    }

    #[test]
    fn test_thick_line() {
        let mut canvas = ImageCanvas::new(Resolution::new(20, 20));
        canvas.line((2.0, 10.0), (18.0, 10.0), Stroke::new(Color::LIME, 3.0));
        assert_eq!(canvas.image().get_pixel(10, 9), &LIME);
        assert_eq!(canvas.image().get_pixel(10, 11), &LIME);
    }

    #[test]
    fn test_clip_segment() {
        let clipped = clip_segment((-10.0, 5.0), (30.0, 5.0), (0.0, 0.0), (20.0, 20.0));
        assert_eq!(clipped, Some(((0.0, 5.0), (20.0, 5.0))));
        assert!(clip_segment((-10.0, -5.0), (30.0, -5.0), (0.0, 0.0), (20.0, 20.0)).is_none());
    }
}
