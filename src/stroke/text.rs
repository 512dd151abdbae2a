use egui::{Pos2, Rect, Vec2};
use serde::{Deserialize, Serialize};

use super::{points, StrokeAttrs, StrokeKind, StrokeShape};
use crate::render::{FontSpec, Painter};

/// Text anchored at its top-left corner. Measured with the font's nominal
/// advance since glyph shaping isn't done here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStroke {
    #[serde(with = "points::pair")]
    pub anchor: Pos2,
    pub text: String,
    #[serde(default)]
    pub font: FontSpec,
    #[serde(flatten)]
    pub attrs: StrokeAttrs,
}

impl TextStroke {
    pub fn new(anchor: Pos2, text: impl Into<String>, font: FontSpec, attrs: StrokeAttrs) -> Self {
        Self {
            anchor,
            text: text.into(),
            font,
            attrs,
        }
    }

    pub fn text_size(&self) -> Vec2 {
        let columns = self.text.lines().map(|l| l.chars().count()).max().unwrap_or(0);
        let rows = self.text.lines().count().max(1);
        Vec2::new(
            columns as f32 * self.font.advance(),
            rows as f32 * self.font.line_height(),
        )
    }
}

impl StrokeShape for TextStroke {
    fn kind(&self) -> StrokeKind {
        StrokeKind::Text
    }

    fn attrs(&self) -> &StrokeAttrs {
        &self.attrs
    }

    fn attrs_mut(&mut self) -> &mut StrokeAttrs {
        &mut self.attrs
    }

    fn bounds(&self) -> Rect {
        Rect::from_min_size(self.anchor, self.text_size())
    }

    fn contains(&self, pos: Pos2) -> bool {
        self.bounds().contains(pos)
    }

    fn render(&self, painter: &mut dyn Painter) {
        painter.draw_text(self.anchor, &self.text, &self.font, self.attrs.color);
    }

    fn translate(&mut self, delta: Vec2) {
        self.anchor += delta;
    }
}
