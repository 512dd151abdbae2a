use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use egui::{Rect, Vec2};
use image::{imageops, RgbaImage};

use crate::document::Document;
use crate::geometry;
use crate::pixmap::Pixmap;
use crate::render::{Painter, RasterPainter};
use crate::stroke::{Stroke, StrokeShape};

/// What thumbnail capture needs from a live canvas.
pub trait CanvasSource {
    /// The visible part of the document, in document coordinates.
    fn viewport(&self) -> Rect;

    fn stroke(&self, index: usize) -> Option<&Stroke>;

    fn stroke_bounds(&self, index: usize) -> Option<Rect> {
        self.stroke(index).map(StrokeShape::bounds)
    }

    /// Pixels currently shown under `rect` (document coordinates).
    fn grab(&self, rect: Rect) -> Option<Pixmap>;
}

/// A document rendered once at its viewport, with the strokes it was
/// rendered from. Stroke indices are bottom-to-top over the visible layers.
pub struct CanvasSnapshot {
    viewport: Rect,
    strokes: Vec<Stroke>,
    raster: RasterPainter,
}

impl CanvasSnapshot {
    /// Render `document` as the canvas shows it, background included.
    pub fn capture(document: &Document, viewport: Rect) -> Option<Self> {
        let mut raster = Self::raster_for(viewport)?;
        raster.translate(-viewport.min.to_vec2());
        document.render(&mut raster, viewport);
        let strokes = document
            .layers()
            .iter_layers()
            .filter(|layer| layer.visible)
            .flat_map(|layer| layer.strokes().iter().map(Stroke::copy))
            .collect();
        Some(Self {
            viewport,
            strokes,
            raster,
        })
    }

    /// Bare strokes on a transparent canvas.
    pub fn from_strokes(strokes: Vec<Stroke>, viewport: Rect) -> Option<Self> {
        let mut raster = Self::raster_for(viewport)?;
        raster.translate(-viewport.min.to_vec2());
        for stroke in &strokes {
            stroke.render(&mut raster);
        }
        Some(Self {
            viewport,
            strokes,
            raster,
        })
    }

    fn raster_for(viewport: Rect) -> Option<RasterPainter> {
        let size = viewport.size();
        RasterPainter::new(size.x.ceil().max(0.0) as u32, size.y.ceil().max(0.0) as u32)
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }
}

impl CanvasSource for CanvasSnapshot {
    fn viewport(&self) -> Rect {
        self.viewport
    }

    fn stroke(&self, index: usize) -> Option<&Stroke> {
        self.strokes.get(index)
    }

    fn grab(&self, rect: Rect) -> Option<Pixmap> {
        self.raster.grab(rect.translate(-self.viewport.min.to_vec2()))
    }
}

/// Base64 PNG of the selected strokes, fitted and centred on a transparent
/// `size`×`size` square. `None` if any step fails; the caller saves the shape
/// without a thumbnail.
pub fn capture_thumbnail(canvas: &dyn CanvasSource, selection: &[usize], size: u32) -> Option<String> {
    let bounds = geometry::union_all(selection.iter().filter_map(|&i| canvas.stroke_bounds(i)));
    let area = bounds.intersect(canvas.viewport());
    if !area.is_positive() {
        log::warn!("Thumbnail skipped: selection is empty or outside the viewport");
        return None;
    }
    let Some(grabbed) = canvas.grab(area) else {
        log::warn!("Thumbnail skipped: could not grab {area:?}");
        return None;
    };
    let square = fit_on_square(&grabbed, size.max(1));
    match Pixmap::new(square).to_png_bytes() {
        Ok(png) => Some(STANDARD.encode(png)),
        Err(err) => {
            log::warn!("Thumbnail skipped: PNG encoding failed: {err}");
            None
        }
    }
}

fn fit_on_square(pixmap: &Pixmap, size: u32) -> RgbaImage {
    let src = pixmap.size();
    let scale = (size as f32 / src.x).min(size as f32 / src.y);
    let fitted = Vec2::new(src.x * scale, src.y * scale);
    let (w, h) = (
        (fitted.x.round() as u32).clamp(1, size),
        (fitted.y.round() as u32).clamp(1, size),
    );
    let scaled = pixmap.scaled(w, h);
    let mut square = RgbaImage::new(size, size);
    imageops::overlay(
        &mut square,
        &scaled,
        i64::from((size - w) / 2),
        i64::from((size - h) / 2),
    );
    square
}

/// Decode a stored thumbnail for display.
pub fn decode_thumbnail(encoded: &str) -> Option<Pixmap> {
    let bytes = STANDARD.decode(encoded).ok()?;
    let image = image::load_from_memory(&bytes).ok()?;
    Some(Pixmap::from_dynamic(image))
}
