use egui::{Color32, Pos2, Rect, Vec2};
use serde::{Deserialize, Serialize};

use super::{points, StrokeAttrs, StrokeKind, StrokeShape};
use crate::geometry::HIT_TOLERANCE;
use crate::render::{Painter, Path};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircleStroke {
    #[serde(with = "points::pair")]
    pub center: Pos2,
    pub radius: f32,
    #[serde(with = "crate::util::color::option", default)]
    pub fill_color: Option<Color32>,
    #[serde(flatten)]
    pub attrs: StrokeAttrs,
}

impl CircleStroke {
    pub fn new(center: Pos2, radius: f32, attrs: StrokeAttrs) -> Self {
        Self {
            center,
            radius: radius.abs(),
            fill_color: None,
            attrs,
        }
    }

    pub fn with_fill(mut self, fill: Color32) -> Self {
        self.fill_color = Some(fill);
        self
    }
}

impl StrokeShape for CircleStroke {
    fn kind(&self) -> StrokeKind {
        StrokeKind::Circle
    }

    fn attrs(&self) -> &StrokeAttrs {
        &self.attrs
    }

    fn attrs_mut(&mut self) -> &mut StrokeAttrs {
        &mut self.attrs
    }

    fn bounds(&self) -> Rect {
        Rect::from_center_size(self.center, Vec2::splat(2.0 * self.radius + self.attrs.width))
    }

    fn contains(&self, pos: Pos2) -> bool {
        let distance = self.center.distance(pos);
        let reach = self.attrs.width / 2.0 + HIT_TOLERANCE;
        if self.fill_color.is_some() {
            distance <= self.radius + reach
        } else {
            (distance - self.radius).abs() <= reach
        }
    }

    fn render(&self, painter: &mut dyn Painter) {
        let path = Path::ellipse(self.center, self.radius, self.radius);
        painter.draw_path(&path, Some(&self.attrs.pen()), self.fill_color);
    }

    fn translate(&mut self, delta: Vec2) {
        self.center += delta;
    }
}
