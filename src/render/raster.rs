use egui::{Color32, Pos2, Rect, Vec2};
use image::{Rgba, RgbaImage};
use tiny_skia::{
    ColorU8, FillRule, FilterQuality, LineCap, LineJoin, Mask, Paint, PathBuilder, PixmapPaint,
    StrokeDash, Transform,
};

use super::{FontSpec, Painter, Path, Pen};
use crate::pixmap::Pixmap;

#[derive(Clone)]
struct PaintState {
    transform: Transform,
    opacity: f32,
    clip: Option<Mask>,
}

impl Default for PaintState {
    fn default() -> Self {
        Self {
            transform: Transform::identity(),
            opacity: 1.0,
            clip: None,
        }
    }
}

/// Software painter backed by tiny-skia. Anti-aliased, premultiplied internally.
pub struct RasterPainter {
    target: tiny_skia::Pixmap,
    state: PaintState,
    stack: Vec<PaintState>,
}

impl std::fmt::Debug for RasterPainter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterPainter")
            .field("width", &self.target.width())
            .field("height", &self.target.height())
            .field("depth", &self.stack.len())
            .finish()
    }
}

fn to_sk_path(path: &Path) -> Option<tiny_skia::Path> {
    let mut pb = PathBuilder::new();
    for sub in path.subpaths() {
        let mut points = sub.points.iter();
        let Some(first) = points.next() else {
            continue;
        };
        pb.move_to(first.x, first.y);
        for p in points {
            pb.line_to(p.x, p.y);
        }
        if sub.closed {
            pb.close();
        }
    }
    pb.finish()
}

fn to_sk_pixmap(img: &RgbaImage) -> Option<tiny_skia::Pixmap> {
    let mut pm = tiny_skia::Pixmap::new(img.width(), img.height())?;
    for (dst, src) in pm.pixels_mut().iter_mut().zip(img.pixels()) {
        *dst = ColorU8::from_rgba(src[0], src[1], src[2], src[3]).premultiply();
    }
    Some(pm)
}

fn solid_paint(color: Color32, opacity: f32) -> Paint<'static> {
    let [r, g, b, a] = color.to_srgba_unmultiplied();
    let mut paint = Paint::default();
    paint.set_color_rgba8(r, g, b, (a as f32 * opacity.clamp(0.0, 1.0)).round() as u8);
    paint.anti_alias = true;
    paint
}

fn sk_stroke(pen: &Pen) -> tiny_skia::Stroke {
    tiny_skia::Stroke {
        width: pen.width.max(0.0),
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        dash: pen
            .style
            .dash_pattern(pen.width)
            .and_then(|pattern| StrokeDash::new(pattern, 0.0)),
        ..Default::default()
    }
}

impl RasterPainter {
    /// Transparent canvas of the given size. `None` for a zero-sized canvas.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        Some(Self {
            target: tiny_skia::Pixmap::new(width, height)?,
            state: PaintState::default(),
            stack: Vec::new(),
        })
    }

    pub fn width(&self) -> u32 {
        self.target.width()
    }

    pub fn height(&self) -> u32 {
        self.target.height()
    }

    pub fn fill(&mut self, color: Color32) {
        let [r, g, b, a] = color.to_srgba_unmultiplied();
        self.target.fill(tiny_skia::Color::from_rgba8(r, g, b, a));
    }

    /// Straight-alpha RGBA at (x, y); transparent outside the canvas.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.target
            .pixel(x, y)
            .map(|p| {
                let c = p.demultiply();
                [c.red(), c.green(), c.blue(), c.alpha()]
            })
            .unwrap_or([0, 0, 0, 0])
    }

    pub fn to_rgba_image(&self) -> RgbaImage {
        RgbaImage::from_fn(self.width(), self.height(), |x, y| Rgba(self.pixel(x, y)))
    }

    pub fn to_pixmap(&self) -> Pixmap {
        Pixmap::new(self.to_rgba_image())
    }

    /// Copy of the pixels under `rect` (device coordinates, clamped to the canvas).
    pub fn grab(&self, rect: Rect) -> Option<Pixmap> {
        let canvas = Rect::from_min_size(Pos2::ZERO, Vec2::new(self.width() as f32, self.height() as f32));
        let area = rect.intersect(canvas);
        if !area.is_positive() {
            return None;
        }
        let x0 = area.min.x.floor() as u32;
        let y0 = area.min.y.floor() as u32;
        let x1 = (area.max.x.ceil() as u32).min(self.width());
        let y1 = (area.max.y.ceil() as u32).min(self.height());
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        let img = RgbaImage::from_fn(x1 - x0, y1 - y0, |x, y| Rgba(self.pixel(x0 + x, y0 + y)));
        Some(Pixmap::new(img))
    }

    fn fill_sk_path(&mut self, path: &tiny_skia::Path, color: Color32) {
        let paint = solid_paint(color, self.state.opacity);
        self.target.fill_path(
            path,
            &paint,
            FillRule::Winding,
            self.state.transform,
            self.state.clip.as_ref(),
        );
    }

    fn stroke_sk_path(&mut self, path: &tiny_skia::Path, pen: &Pen) {
        if pen.width <= 0.0 {
            return;
        }
        let paint = solid_paint(pen.color, self.state.opacity);
        self.target.stroke_path(
            path,
            &paint,
            &sk_stroke(pen),
            self.state.transform,
            self.state.clip.as_ref(),
        );
    }
}

impl Painter for RasterPainter {
    fn save(&mut self) {
        self.stack.push(self.state.clone());
    }

    fn restore(&mut self) {
        if let Some(state) = self.stack.pop() {
            self.state = state;
        } else {
            log::warn!("RasterPainter::restore without matching save");
        }
    }

    fn opacity(&self) -> f32 {
        self.state.opacity
    }

    fn set_opacity(&mut self, opacity: f32) {
        self.state.opacity = opacity.clamp(0.0, 1.0);
    }

    fn translate(&mut self, offset: Vec2) {
        self.state.transform = self.state.transform.pre_translate(offset.x, offset.y);
    }

    fn rotate(&mut self, degrees: f32) {
        self.state.transform = self.state.transform.pre_rotate(degrees);
    }

    fn scale(&mut self, sx: f32, sy: f32) {
        self.state.transform = self.state.transform.pre_scale(sx, sy);
    }

    fn set_clip_path(&mut self, path: &Path) {
        let Some(sk_path) = to_sk_path(path) else {
            return;
        };
        let transform = self.state.transform;
        match &mut self.state.clip {
            Some(mask) => mask.intersect_path(&sk_path, FillRule::Winding, true, transform),
            None => {
                if let Some(mut mask) = Mask::new(self.target.width(), self.target.height()) {
                    mask.fill_path(&sk_path, FillRule::Winding, true, transform);
                    self.state.clip = Some(mask);
                }
            }
        }
    }

    fn draw_pixmap(&mut self, target: Rect, pixmap: &Pixmap) {
        if !target.is_positive() {
            return;
        }
        let Some(source) = to_sk_pixmap(pixmap.image()) else {
            return;
        };
        let sx = target.width() / source.width() as f32;
        let sy = target.height() / source.height() as f32;
        let quality = if sx == 1.0 && sy == 1.0 {
            FilterQuality::Nearest
        } else {
            FilterQuality::Bilinear
        };
        let paint = PixmapPaint {
            opacity: self.state.opacity,
            quality,
            ..Default::default()
        };
        let transform = self
            .state
            .transform
            .pre_translate(target.min.x, target.min.y)
            .pre_scale(sx, sy);
        self.target
            .draw_pixmap(0, 0, source.as_ref(), &paint, transform, self.state.clip.as_ref());
    }

    fn draw_rect(&mut self, rect: Rect, pen: Option<&Pen>, fill: Option<Color32>) {
        self.draw_path(&Path::rect(rect), pen, fill);
    }

    fn draw_path(&mut self, path: &Path, pen: Option<&Pen>, fill: Option<Color32>) {
        let Some(sk_path) = to_sk_path(path) else {
            return;
        };
        if let Some(color) = fill {
            self.fill_sk_path(&sk_path, color);
        }
        if let Some(pen) = pen {
            self.stroke_sk_path(&sk_path, pen);
        }
    }

    fn draw_text(&mut self, anchor: Pos2, text: &str, font: &FontSpec, color: Color32) {
        // Block glyphs: one filled box per visible character.
        let advance = font.advance();
        let glyph = Vec2::new(advance * 0.8, font.size * 0.7);
        for (row, line) in text.lines().enumerate() {
            let top = anchor.y + row as f32 * font.line_height() + font.size * 0.2;
            for (col, ch) in line.chars().enumerate() {
                if ch.is_whitespace() {
                    continue;
                }
                let min = Pos2::new(anchor.x + col as f32 * advance + advance * 0.1, top);
                self.draw_rect(Rect::from_min_size(min, glyph), None, Some(color));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_rect_and_read_back() {
        let mut painter = RasterPainter::new(20, 20).unwrap();
        painter.draw_rect(
            Rect::from_min_size(Pos2::new(5.0, 5.0), Vec2::splat(10.0)),
            None,
            Some(Color32::from_rgb(255, 0, 0)),
        );
        assert_eq!(painter.pixel(10, 10), [255, 0, 0, 255]);
        assert_eq!(painter.pixel(1, 1)[3], 0);
    }

    #[test]
    fn test_opacity_applies_to_fills() {
        let mut painter = RasterPainter::new(10, 10).unwrap();
        painter.set_opacity(0.5);
        painter.draw_rect(Rect::from_min_size(Pos2::ZERO, Vec2::splat(10.0)), None, Some(Color32::BLUE));
        let alpha = painter.pixel(5, 5)[3];
        assert!((126..=129).contains(&alpha), "alpha {alpha}");
    }

    #[test]
    fn test_save_restore_transform() {
        let mut painter = RasterPainter::new(30, 30).unwrap();
        painter.save();
        painter.translate(Vec2::new(20.0, 20.0));
        painter.restore();
        painter.draw_rect(Rect::from_min_size(Pos2::ZERO, Vec2::splat(5.0)), None, Some(Color32::WHITE));
        assert_eq!(painter.pixel(2, 2)[3], 255);
        assert_eq!(painter.pixel(22, 22)[3], 0);
    }

    #[test]
    fn test_unscaled_pixmap_copies_exactly() {
        let mut img = RgbaImage::new(4, 4);
        img.put_pixel(1, 2, Rgba([9, 99, 199, 255]));
        let mut painter = RasterPainter::new(10, 10).unwrap();
        painter.draw_pixmap(Rect::from_min_size(Pos2::new(3.0, 3.0), Vec2::splat(4.0)), &Pixmap::new(img));
        assert_eq!(painter.pixel(4, 5), [9, 99, 199, 255]);
    }

    #[test]
    fn test_grab_clamps_to_canvas() {
        let painter = RasterPainter::new(10, 10).unwrap();
        let grabbed = painter
            .grab(Rect::from_min_max(Pos2::new(5.0, 5.0), Pos2::new(50.0, 50.0)))
            .unwrap();
        assert_eq!((grabbed.width(), grabbed.height()), (5, 5));
    }
}
