//! Pixel effects used by image strokes.
//!
//! Every function here is pure: it takes an RGBA buffer (straight alpha) and
//! returns a new one. The image stroke composes them in a fixed order.

use egui::{Color32, Vec2};
use image::{imageops, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

/// Per-pixel colour filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    #[default]
    None,
    Grayscale,
    Sepia,
    Invert,
}

/// Shadow blur quality. Higher quality spreads the blur further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShadowQuality {
    Low,
    #[default]
    Medium,
    High,
}

impl ShadowQuality {
    pub fn blur_factor(self) -> f32 {
        match self {
            ShadowQuality::Low => 0.5,
            ShadowQuality::Medium => 1.2,
            ShadowQuality::High => 2.0,
        }
    }
}

/// Shadow geometry and look, shared by the outer and inner variants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowParams {
    pub color: Color32,
    pub blur: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub size: f32,
    pub quality: ShadowQuality,
    pub opacity: f32,
}

impl ShadowParams {
    /// Offset actually used for drawing. A shadow sitting exactly under a sharp
    /// image would be invisible, so it is nudged down by 2px.
    pub fn effective_offset(&self) -> Vec2 {
        if self.offset_x == 0.0 && self.offset_y == 0.0 && self.blur <= 1.0 {
            Vec2::new(0.0, 2.0)
        } else {
            Vec2::new(self.offset_x, self.offset_y)
        }
    }

    pub fn blur_radius(&self) -> f32 {
        self.quality.blur_factor() * self.blur
    }
}

/// A rendered outer shadow and where to draw it, relative to the image's top-left.
#[derive(Debug, Clone)]
pub struct OuterShadow {
    pub image: RgbaImage,
    pub offset: Vec2,
}

fn premultiply(img: &RgbaImage) -> RgbaImage {
    let mut out = img.clone();
    for px in out.pixels_mut() {
        let a = px[3] as u32;
        for c in 0..3 {
            px[c] = ((px[c] as u32 * a + 127) / 255) as u8;
        }
    }
    out
}

fn unpremultiply(img: &mut RgbaImage) {
    for px in img.pixels_mut() {
        let a = px[3] as u32;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        for c in 0..3 {
            px[c] = ((px[c] as u32 * 255 + a / 2) / a).min(255) as u8;
        }
    }
}

/// Gaussian-like blur. Colour is blurred premultiplied so transparent
/// neighbours do not darken edges. `radius <= 0` returns an unchanged copy.
pub fn blur(img: &RgbaImage, radius: f32) -> RgbaImage {
    if radius <= 0.0 || img.width() == 0 || img.height() == 0 {
        return img.clone();
    }
    let sigma = (radius / 2.0).max(0.5);
    let mut out = imageops::blur(&premultiply(img), sigma);
    unpremultiply(&mut out);
    out
}

/// Apply `kind` blended with the original by `intensity` (clamped to [0, 1]). Alpha is kept.
pub fn apply_filter(img: &RgbaImage, kind: FilterKind, intensity: f32) -> RgbaImage {
    let t = intensity.clamp(0.0, 1.0);
    if kind == FilterKind::None || t == 0.0 {
        return img.clone();
    }
    let mut out = img.clone();
    for px in out.pixels_mut() {
        let (r, g, b) = (px[0] as f32, px[1] as f32, px[2] as f32);
        let filtered = match kind {
            FilterKind::None => [r, g, b],
            FilterKind::Grayscale => {
                let l = 0.299 * r + 0.587 * g + 0.114 * b;
                [l, l, l]
            }
            FilterKind::Sepia => [
                0.393 * r + 0.769 * g + 0.189 * b,
                0.349 * r + 0.686 * g + 0.168 * b,
                0.272 * r + 0.534 * g + 0.131 * b,
            ],
            FilterKind::Invert => [255.0 - r, 255.0 - g, 255.0 - b],
        };
        for c in 0..3 {
            let orig = px[c] as f32;
            let mixed = orig + (filtered[c].min(255.0) - orig) * t;
            px[c] = mixed.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Coverage in [0, 1] of the pixel at (x, y) by a rounded rect filling `w`×`h`.
fn rounded_coverage(x: u32, y: u32, w: u32, h: u32, radius: f32) -> f32 {
    let (cx, cy) = (x as f32 + 0.5, y as f32 + 0.5);
    let (w, h) = (w as f32, h as f32);
    let nearest_x = cx.clamp(radius, w - radius);
    let nearest_y = cy.clamp(radius, h - radius);
    let (dx, dy) = (cx - nearest_x, cy - nearest_y);
    if dx == 0.0 || dy == 0.0 {
        return 1.0;
    }
    let dist = (dx * dx + dy * dy).sqrt();
    (radius - dist + 0.5).clamp(0.0, 1.0)
}

/// Clip to a rounded rectangle with uniform corner `radius`.
pub fn round_corners(img: &RgbaImage, radius: f32) -> RgbaImage {
    let (w, h) = img.dimensions();
    let radius = radius.min(w.min(h) as f32 / 2.0);
    if radius <= 0.0 {
        return img.clone();
    }
    let mut out = img.clone();
    for (x, y, px) in out.enumerate_pixels_mut() {
        let coverage = rounded_coverage(x, y, w, h, radius);
        if coverage < 1.0 {
            px[3] = (px[3] as f32 * coverage).round() as u8;
        }
    }
    out
}

/// Pad with `margin` transparent pixels on every side.
pub fn expand(img: &RgbaImage, margin: u32) -> RgbaImage {
    if margin == 0 {
        return img.clone();
    }
    let mut out = RgbaImage::new(img.width() + 2 * margin, img.height() + 2 * margin);
    imageops::replace(&mut out, img, margin as i64, margin as i64);
    out
}

/// Keep alpha (scaled by `opacity`), replace RGB with `color`.
pub fn tint(img: &RgbaImage, color: Color32, opacity: f32) -> RgbaImage {
    let [r, g, b, a] = color.to_srgba_unmultiplied();
    let scale = opacity.clamp(0.0, 1.0) * (a as f32 / 255.0);
    let mut out = img.clone();
    for px in out.pixels_mut() {
        let alpha = (px[3] as f32 * scale).round() as u8;
        *px = Rgba([r, g, b, alpha]);
    }
    out
}

/// Blur → filter → rounded corners, in that order.
pub fn effect_chain(
    img: &RgbaImage,
    blur_radius: f32,
    filter: FilterKind,
    filter_intensity: f32,
    corner_radius: f32,
) -> RgbaImage {
    let blurred = blur(img, blur_radius);
    let filtered = apply_filter(&blurred, filter, filter_intensity);
    round_corners(&filtered, corner_radius)
}

/// Drop shadow drawn below the image.
pub fn outer_shadow(source: &RgbaImage, params: &ShadowParams, corner_radius: f32) -> OuterShadow {
    let silhouette = round_corners(source, corner_radius);
    let grow = if params.size > 0.0 {
        (2.0 * params.size).ceil() as u32
    } else {
        0
    };
    let expanded = expand(&silhouette, grow);
    let blurred = blur(&expanded, params.blur_radius());
    let image = tint(&blurred, params.color, params.opacity);
    let offset = params.effective_offset() - Vec2::splat(grow as f32);
    OuterShadow { image, offset }
}

/// Margin used around the source while building an inner shadow.
pub fn inner_shadow_margin(params: &ShadowParams) -> u32 {
    let min_margin: f32 = if params.offset_x == 0.0 && params.offset_y == 0.0 {
        25.0
    } else {
        15.0
    };
    min_margin
        .max(5.0 * params.blur)
        .max(2.0 * params.size + 20.0)
        .ceil() as u32
}

/// Separable min filter on an alpha plane.
fn erode(alpha: &[u8], w: usize, h: usize, radius: usize) -> Vec<u8> {
    if radius == 0 {
        return alpha.to_vec();
    }
    let mut horizontal = vec![0u8; alpha.len()];
    for y in 0..h {
        for x in 0..w {
            let lo = x.saturating_sub(radius);
            let hi = (x + radius).min(w - 1);
            horizontal[y * w + x] = (lo..=hi).map(|i| alpha[y * w + i]).min().unwrap_or(0);
        }
    }
    let mut out = vec![0u8; alpha.len()];
    for y in 0..h {
        for x in 0..w {
            let lo = y.saturating_sub(radius);
            let hi = (y + radius).min(h - 1);
            out[y * w + x] = (lo..=hi).map(|j| horizontal[j * w + x]).min().unwrap_or(0);
        }
    }
    out
}

/// Inner shadow: a blurred "wall" around the silhouette, visible only inside it.
///
/// The result has the source's dimensions and zero alpha wherever the
/// (rounded) source is fully transparent.
pub fn inner_shadow(source: &RgbaImage, params: &ShadowParams, corner_radius: f32) -> RgbaImage {
    let silhouette = round_corners(source, corner_radius);
    let (w, h) = silhouette.dimensions();
    let margin = inner_shadow_margin(params);
    let (cw, ch) = (w + 2 * margin, h + 2 * margin);

    let alpha: Vec<u8> = silhouette.pixels().map(|p| p[3]).collect();
    let hole = erode(&alpha, w as usize, h as usize, params.size.max(0.0).round() as usize);

    let mut wall = RgbaImage::from_pixel(cw, ch, Rgba([0, 0, 0, 255]));
    let offset = params.effective_offset();
    let (ox, oy) = (offset.x.round() as i64, offset.y.round() as i64);
    for y in 0..h {
        for x in 0..w {
            let tx = margin as i64 + x as i64 + ox;
            let ty = margin as i64 + y as i64 + oy;
            if tx < 0 || ty < 0 || tx >= cw as i64 || ty >= ch as i64 {
                continue;
            }
            let keep = 255 - hole[(y * w + x) as usize] as u32;
            let px = wall.get_pixel_mut(tx as u32, ty as u32);
            px[3] = ((px[3] as u32 * keep) / 255) as u8;
        }
    }

    let blurred = blur(&wall, params.blur_radius());
    let [r, g, b, a] = params.color.to_srgba_unmultiplied();
    let strength = params.opacity.clamp(0.0, 1.0) * (a as f32 / 255.0);

    let mut out = RgbaImage::new(w, h);
    for (x, y, px) in out.enumerate_pixels_mut() {
        let wall_alpha = blurred.get_pixel(x + margin, y + margin)[3] as f32;
        let inside = silhouette.get_pixel(x, y)[3] as f32 / 255.0;
        let alpha = (wall_alpha * inside * strength).round() as u8;
        *px = Rgba([r, g, b, alpha]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, rgba: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(rgba))
    }

    fn shadow(offset_x: f32, offset_y: f32, blur: f32) -> ShadowParams {
        ShadowParams {
            color: Color32::BLACK,
            blur,
            offset_x,
            offset_y,
            size: 0.0,
            quality: ShadowQuality::Medium,
            opacity: 1.0,
        }
    }

    #[test]
    fn test_grayscale_uses_rec601() {
        let out = apply_filter(&solid(1, 1, [255, 0, 0, 200]), FilterKind::Grayscale, 1.0);
        let px = out.get_pixel(0, 0);
        assert_eq!(px[0], 76);
        assert_eq!(px[0], px[1]);
        assert_eq!(px[3], 200);
    }

    #[test]
    fn test_invert_half_intensity_blends() {
        let out = apply_filter(&solid(1, 1, [0, 0, 0, 255]), FilterKind::Invert, 0.5);
        assert_eq!(out.get_pixel(0, 0)[0], 128);
    }

    #[test]
    fn test_sepia_clamps() {
        let out = apply_filter(&solid(1, 1, [255, 255, 255, 255]), FilterKind::Sepia, 1.0);
        assert_eq!(out.get_pixel(0, 0)[0], 255);
        assert_eq!(out.get_pixel(0, 0)[2], 239);
    }

    #[test]
    fn test_round_corners_clears_corner_keeps_centre() {
        let out = round_corners(&solid(40, 40, [10, 20, 30, 255]), 10.0);
        assert_eq!(out.get_pixel(0, 0)[3], 0);
        assert_eq!(out.get_pixel(20, 20)[3], 255);
        assert_eq!(out.get_pixel(20, 0)[3], 255);
    }

    #[test]
    fn test_blur_zero_is_identity() {
        let img = solid(5, 5, [1, 2, 3, 4]);
        assert_eq!(blur(&img, 0.0), img);
    }

    #[test]
    fn test_degenerate_shadow_is_nudged_down() {
        assert_eq!(shadow(0.0, 0.0, 0.0).effective_offset(), Vec2::new(0.0, 2.0));
        assert_eq!(shadow(0.0, 0.0, 4.0).effective_offset(), Vec2::ZERO);
        assert_eq!(shadow(3.0, 0.0, 0.0).effective_offset(), Vec2::new(3.0, 0.0));
    }

    #[test]
    fn test_outer_shadow_expands_by_twice_size() {
        let mut params = shadow(4.0, 5.0, 2.0);
        params.size = 3.0;
        let out = outer_shadow(&solid(10, 10, [255, 255, 255, 255]), &params, 0.0);
        assert_eq!(out.image.dimensions(), (22, 22));
        assert_eq!(out.offset, Vec2::new(-2.0, -1.0));
        let centre = out.image.get_pixel(11, 11);
        assert_eq!(&centre.0[..3], &[0, 0, 0]);
    }

    #[test]
    fn test_inner_shadow_margin_rules() {
        assert_eq!(inner_shadow_margin(&shadow(0.0, 0.0, 1.0)), 25);
        assert_eq!(inner_shadow_margin(&shadow(1.0, 0.0, 1.0)), 20);
        assert_eq!(inner_shadow_margin(&shadow(1.0, 0.0, 10.0)), 50);
    }

    #[test]
    fn test_inner_shadow_stays_inside_silhouette() {
        let mut src = RgbaImage::new(30, 30);
        for y in 5..25 {
            for x in 5..25 {
                src.put_pixel(x, y, Rgba([200, 10, 10, 255]));
            }
        }
        let out = inner_shadow(&src, &shadow(3.0, 3.0, 4.0), 0.0);
        for (x, y, px) in out.enumerate_pixels() {
            if src.get_pixel(x, y)[3] == 0 {
                assert_eq!(px[3], 0, "leak at {x},{y}");
            }
        }
        // The wall shows up along the edge facing the offset.
        assert!(out.get_pixel(6, 15)[3] > 0);
    }
}
