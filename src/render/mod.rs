//! Renderer sink used by strokes and documents.
//!
//! The document model never talks to a GUI toolkit directly. It paints through
//! the [`Painter`] trait; [`RasterPainter`] is the software backend used for
//! thumbnails, the app canvas and tests.

mod path;
mod pen;
mod raster;
mod recording;
mod transform;

pub use path::{Path, SubPath};
pub use pen::{FontSpec, LineStyle, Pen};
pub use raster::RasterPainter;
pub use recording::{DrawOp, RecordingPainter};
pub use transform::Transform;

use egui::{Color32, Pos2, Rect, Vec2};

use crate::pixmap::Pixmap;

/// Drawing primitives a stroke may use. `save`/`restore` bracket changes to
/// the transform, the opacity and the clip.
pub trait Painter {
    fn save(&mut self);
    fn restore(&mut self);

    /// Current global alpha in [0, 1].
    fn opacity(&self) -> f32;
    fn set_opacity(&mut self, opacity: f32);

    fn translate(&mut self, offset: Vec2);
    /// Rotate the coordinate system clockwise by `degrees` around the current origin.
    fn rotate(&mut self, degrees: f32);
    fn scale(&mut self, sx: f32, sy: f32);

    /// Intersect the current clip with `path`.
    fn set_clip_path(&mut self, path: &Path);

    /// Draw `pixmap` stretched to `target`.
    fn draw_pixmap(&mut self, target: Rect, pixmap: &Pixmap);
    fn draw_rect(&mut self, rect: Rect, pen: Option<&Pen>, fill: Option<Color32>);
    fn draw_path(&mut self, path: &Path, pen: Option<&Pen>, fill: Option<Color32>);
    /// `anchor` is the top-left corner of the text box.
    fn draw_text(&mut self, anchor: Pos2, text: &str, font: &FontSpec, color: Color32);
}
