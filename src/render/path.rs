use egui::{Pos2, Rect};

use crate::geometry;

const ELLIPSE_SEGMENTS: usize = 64;
const CORNER_SEGMENTS: usize = 8;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SubPath {
    pub points: Vec<Pos2>,
    pub closed: bool,
}

/// Polygonal path. Curves are flattened when the path is built.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Path {
    subpaths: Vec<SubPath>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_to(&mut self, p: Pos2) {
        self.subpaths.push(SubPath {
            points: vec![p],
            closed: false,
        });
    }

    pub fn line_to(&mut self, p: Pos2) {
        match self.subpaths.last_mut() {
            Some(sub) if !sub.closed => sub.points.push(p),
            _ => self.move_to(p),
        }
    }

    pub fn close(&mut self) {
        if let Some(sub) = self.subpaths.last_mut() {
            sub.closed = true;
        }
    }

    pub fn polyline(points: &[Pos2]) -> Self {
        let mut path = Self::new();
        for (i, p) in points.iter().enumerate() {
            if i == 0 {
                path.move_to(*p);
            } else {
                path.line_to(*p);
            }
        }
        path
    }

    pub fn polygon(points: &[Pos2]) -> Self {
        let mut path = Self::polyline(points);
        path.close();
        path
    }

    pub fn rect(rect: Rect) -> Self {
        Self::polygon(&[
            rect.left_top(),
            rect.right_top(),
            rect.right_bottom(),
            rect.left_bottom(),
        ])
    }

    pub fn rounded_rect(rect: Rect, radius: f32) -> Self {
        let r = radius.min(rect.width() / 2.0).min(rect.height() / 2.0);
        if r <= 0.0 {
            return Self::rect(rect);
        }
        let corners = [
            (Pos2::new(rect.max.x - r, rect.min.y + r), -90.0_f32),
            (Pos2::new(rect.max.x - r, rect.max.y - r), 0.0),
            (Pos2::new(rect.min.x + r, rect.max.y - r), 90.0),
            (Pos2::new(rect.min.x + r, rect.min.y + r), 180.0),
        ];
        let mut points = Vec::with_capacity(4 * (CORNER_SEGMENTS + 1));
        for (centre, start) in corners {
            for i in 0..=CORNER_SEGMENTS {
                let angle = (start + 90.0 * i as f32 / CORNER_SEGMENTS as f32).to_radians();
                points.push(Pos2::new(centre.x + r * angle.cos(), centre.y + r * angle.sin()));
            }
        }
        Self::polygon(&points)
    }

    pub fn ellipse(center: Pos2, rx: f32, ry: f32) -> Self {
        let points: Vec<Pos2> = (0..ELLIPSE_SEGMENTS)
            .map(|i| {
                let t = std::f32::consts::TAU * i as f32 / ELLIPSE_SEGMENTS as f32;
                Pos2::new(center.x + rx * t.cos(), center.y + ry * t.sin())
            })
            .collect();
        Self::polygon(&points)
    }

    pub fn subpaths(&self) -> &[SubPath] {
        &self.subpaths
    }

    pub fn is_empty(&self) -> bool {
        self.subpaths.iter().all(|s| s.points.is_empty())
    }

    pub fn bounds(&self) -> Rect {
        geometry::union_all(
            self.subpaths
                .iter()
                .map(|s| geometry::calculate_bounds(&s.points, 0.0)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_path_is_closed_quad() {
        let path = Path::rect(Rect::from_min_size(Pos2::ZERO, egui::vec2(10.0, 5.0)));
        assert_eq!(path.subpaths().len(), 1);
        assert!(path.subpaths()[0].closed);
        assert_eq!(path.subpaths()[0].points.len(), 4);
    }

    #[test]
    fn test_ellipse_bounds() {
        let bounds = Path::ellipse(Pos2::new(50.0, 50.0), 10.0, 5.0).bounds();
        assert!((bounds.width() - 20.0).abs() < 0.1);
        assert!((bounds.height() - 10.0).abs() < 0.1);
    }

    #[test]
    fn test_rounded_rect_stays_inside_rect() {
        let rect = Rect::from_min_size(Pos2::ZERO, egui::vec2(40.0, 20.0));
        let bounds = Path::rounded_rect(rect, 8.0).bounds();
        assert!(rect.expand(0.01).contains_rect(bounds));
    }
}
