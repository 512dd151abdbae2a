use egui::{Color32, Pos2, Rect, Vec2};

use super::{FontSpec, Painter, Path, Pen};
use crate::pixmap::Pixmap;

/// One call made against a [`RecordingPainter`].
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Save,
    Restore,
    SetOpacity(f32),
    Translate(Vec2),
    Rotate(f32),
    Scale(f32, f32),
    Clip(Rect),
    Pixmap { target: Rect, size: Vec2, opacity: f32 },
    Rect { rect: Rect, pen: Option<Pen>, fill: Option<Color32> },
    Path { bounds: Rect, pen: Option<Pen>, fill: Option<Color32> },
    Text { anchor: Pos2, text: String },
}

/// Painter that records calls instead of producing pixels. Used to inspect
/// draw order (e.g. that a shadow is emitted before its image).
#[derive(Debug)]
pub struct RecordingPainter {
    ops: Vec<DrawOp>,
    opacity: f32,
    saved: Vec<f32>,
}

impl Default for RecordingPainter {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingPainter {
    pub fn new() -> Self {
        Self {
            ops: Vec::new(),
            opacity: 1.0,
            saved: Vec::new(),
        }
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    /// Only the calls that put something on the canvas.
    pub fn draws(&self) -> Vec<&DrawOp> {
        self.ops
            .iter()
            .filter(|op| {
                matches!(
                    op,
                    DrawOp::Pixmap { .. } | DrawOp::Rect { .. } | DrawOp::Path { .. } | DrawOp::Text { .. }
                )
            })
            .collect()
    }
}

impl Painter for RecordingPainter {
    fn save(&mut self) {
        self.saved.push(self.opacity);
        self.ops.push(DrawOp::Save);
    }

    fn restore(&mut self) {
        if let Some(opacity) = self.saved.pop() {
            self.opacity = opacity;
        }
        self.ops.push(DrawOp::Restore);
    }

    fn opacity(&self) -> f32 {
        self.opacity
    }

    fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity.clamp(0.0, 1.0);
        self.ops.push(DrawOp::SetOpacity(self.opacity));
    }

    fn translate(&mut self, offset: Vec2) {
        self.ops.push(DrawOp::Translate(offset));
    }

    fn rotate(&mut self, degrees: f32) {
        self.ops.push(DrawOp::Rotate(degrees));
    }

    fn scale(&mut self, sx: f32, sy: f32) {
        self.ops.push(DrawOp::Scale(sx, sy));
    }

    fn set_clip_path(&mut self, path: &Path) {
        self.ops.push(DrawOp::Clip(path.bounds()));
    }

    fn draw_pixmap(&mut self, target: Rect, pixmap: &Pixmap) {
        self.ops.push(DrawOp::Pixmap {
            target,
            size: pixmap.size(),
            opacity: self.opacity,
        });
    }

    fn draw_rect(&mut self, rect: Rect, pen: Option<&Pen>, fill: Option<Color32>) {
        self.ops.push(DrawOp::Rect {
            rect,
            pen: pen.copied(),
            fill,
        });
    }

    fn draw_path(&mut self, path: &Path, pen: Option<&Pen>, fill: Option<Color32>) {
        self.ops.push(DrawOp::Path {
            bounds: path.bounds(),
            pen: pen.copied(),
            fill,
        });
    }

    fn draw_text(&mut self, anchor: Pos2, text: &str, _font: &FontSpec, _color: Color32) {
        self.ops.push(DrawOp::Text {
            anchor,
            text: text.to_string(),
        });
    }
}
