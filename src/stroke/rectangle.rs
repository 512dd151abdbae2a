use egui::{Color32, Pos2, Rect, Vec2};
use serde::{Deserialize, Serialize};

use super::{points, StrokeAttrs, StrokeKind, StrokeShape};
use crate::geometry::HIT_TOLERANCE;
use crate::render::Painter;

/// Axis-aligned rectangle, optionally filled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RectangleStroke {
    #[serde(with = "points::pair")]
    pub top_left: Pos2,
    #[serde(with = "points::size")]
    pub size: Vec2,
    #[serde(with = "crate::util::color::option", default)]
    pub fill_color: Option<Color32>,
    #[serde(flatten)]
    pub attrs: StrokeAttrs,
}

impl RectangleStroke {
    pub fn new(top_left: Pos2, size: Vec2, attrs: StrokeAttrs) -> Self {
        Self {
            top_left,
            size,
            fill_color: None,
            attrs,
        }
    }

    pub fn with_fill(mut self, fill: Color32) -> Self {
        self.fill_color = Some(fill);
        self
    }

    /// The outline rectangle, normalised for negative sizes.
    pub fn rect(&self) -> Rect {
        Rect::from_two_pos(self.top_left, self.top_left + self.size)
    }
}

impl StrokeShape for RectangleStroke {
    fn kind(&self) -> StrokeKind {
        StrokeKind::Rectangle
    }

    fn attrs(&self) -> &StrokeAttrs {
        &self.attrs
    }

    fn attrs_mut(&mut self) -> &mut StrokeAttrs {
        &mut self.attrs
    }

    fn bounds(&self) -> Rect {
        self.rect().expand(self.attrs.width / 2.0)
    }

    fn contains(&self, pos: Pos2) -> bool {
        let rect = self.rect();
        if self.fill_color.is_some() {
            return self.bounds().contains(pos);
        }
        let reach = self.attrs.width / 2.0 + HIT_TOLERANCE;
        rect.expand(reach).contains(pos) && !rect.shrink(reach).contains(pos)
    }

    fn render(&self, painter: &mut dyn Painter) {
        painter.draw_rect(self.rect(), Some(&self.attrs.pen()), self.fill_color);
    }

    fn translate(&mut self, delta: Vec2) {
        self.top_left += delta;
    }
}
