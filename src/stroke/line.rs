use egui::{Pos2, Rect, Vec2};
use serde::{Deserialize, Serialize};

use super::{points, StrokeAttrs, StrokeKind, StrokeShape};
use crate::geometry;
use crate::render::{Painter, Path};

/// Straight segment between two points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineStroke {
    #[serde(with = "points::pair")]
    pub start_point: Pos2,
    #[serde(with = "points::pair")]
    pub end_point: Pos2,
    #[serde(flatten)]
    pub attrs: StrokeAttrs,
}

impl LineStroke {
    pub fn new(start_point: Pos2, end_point: Pos2, attrs: StrokeAttrs) -> Self {
        Self {
            start_point,
            end_point,
            attrs,
        }
    }

    pub fn length(&self) -> f32 {
        self.start_point.distance(self.end_point)
    }
}

impl StrokeShape for LineStroke {
    fn kind(&self) -> StrokeKind {
        StrokeKind::Line
    }

    fn attrs(&self) -> &StrokeAttrs {
        &self.attrs
    }

    fn attrs_mut(&mut self) -> &mut StrokeAttrs {
        &mut self.attrs
    }

    fn bounds(&self) -> Rect {
        geometry::calculate_bounds(&[self.start_point, self.end_point], self.attrs.width / 2.0)
    }

    fn contains(&self, pos: Pos2) -> bool {
        geometry::is_point_near_polyline(pos, &[self.start_point, self.end_point], self.attrs.width / 2.0)
    }

    fn render(&self, painter: &mut dyn Painter) {
        let path = Path::polyline(&[self.start_point, self.end_point]);
        painter.draw_path(&path, Some(&self.attrs.pen()), None);
    }

    fn translate(&mut self, delta: Vec2) {
        self.start_point += delta;
        self.end_point += delta;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::Color32;

    #[test]
    fn test_hit_test_tolerance() {
        let line = LineStroke::new(Pos2::new(0.0, 0.0), Pos2::new(100.0, 0.0), StrokeAttrs::default());
        assert!(line.contains(Pos2::new(50.0, 2.0)));
        assert!(!line.contains(Pos2::new(50.0, 20.0)));
    }

    #[test]
    fn test_bounds_include_half_width() {
        let attrs = StrokeAttrs::new(Color32::RED, 4.0, Default::default());
        let line = LineStroke::new(Pos2::new(10.0, 10.0), Pos2::new(20.0, 10.0), attrs);
        let b = line.bounds();
        assert_eq!(b.min, Pos2::new(8.0, 8.0));
        assert_eq!(b.max, Pos2::new(22.0, 12.0));
    }
}
