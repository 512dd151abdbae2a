use egui::{Pos2, Rect, Vec2};
use serde::{Deserialize, Serialize};

use super::{points, StrokeAttrs, StrokeKind, StrokeShape};
use crate::geometry;
use crate::render::{Painter, Path};

const DEFAULT_SAMPLES: usize = 50;

/// Curve through a knot vector, sampled at `parameters`.
///
/// When the knot vector doesn't describe a valid spline for the control
/// points, the control polygon itself is drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BSplineStroke {
    #[serde(with = "points::object_seq")]
    pub control_points: Vec<Pos2>,
    #[serde(default)]
    pub knots: Vec<f32>,
    #[serde(default)]
    pub parameters: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    degree: Option<usize>,
    #[serde(flatten)]
    pub attrs: StrokeAttrs,
}

impl BSplineStroke {
    /// Clamped uniform spline of the given degree, sampled at 50 parameters.
    pub fn new(control_points: Vec<Pos2>, degree: usize, attrs: StrokeAttrs) -> Self {
        let degree = degree.clamp(1, control_points.len().saturating_sub(1).max(1));
        let knots = clamped_uniform_knots(control_points.len(), degree);
        let parameters = if knots.is_empty() {
            Vec::new()
        } else {
            let (lo, hi) = (knots[degree], knots[knots.len() - degree - 1]);
            (0..DEFAULT_SAMPLES)
                .map(|i| lo + (hi - lo) * i as f32 / (DEFAULT_SAMPLES - 1) as f32)
                .collect()
        };
        Self {
            control_points,
            knots,
            parameters,
            degree: Some(degree),
            attrs,
        }
    }

    /// Stored degree, or `len(knots) - len(controls) - 1` for records that
    /// predate the explicit field.
    pub fn degree(&self) -> usize {
        self.degree.unwrap_or_else(|| {
            self.knots
                .len()
                .saturating_sub(self.control_points.len() + 1)
                .max(1)
        })
    }

    fn is_valid(&self) -> bool {
        let p = self.degree();
        self.control_points.len() > p && self.knots.len() == self.control_points.len() + p + 1
    }

    /// Points actually drawn.
    pub fn curve_points(&self) -> Vec<Pos2> {
        if !self.is_valid() || self.parameters.is_empty() {
            return self.control_points.clone();
        }
        self.parameters
            .iter()
            .filter_map(|&t| self.evaluate(t))
            .collect()
    }

    /// De Boor evaluation at `t`. `None` outside the knot domain.
    pub fn evaluate(&self, t: f32) -> Option<Pos2> {
        let p = self.degree();
        let n = self.control_points.len();
        if !self.is_valid() {
            return None;
        }
        let (lo, hi) = (self.knots[p], self.knots[n]);
        if t < lo - f32::EPSILON || t > hi + f32::EPSILON {
            return None;
        }
        let t = t.clamp(lo, hi);
        // Span k with knots[k] <= t < knots[k + 1], last span for t == hi.
        let mut k = p;
        while k < n - 1 && t >= self.knots[k + 1] {
            k += 1;
        }
        let mut d: Vec<Vec2> = (0..=p)
            .map(|j| self.control_points[j + k - p].to_vec2())
            .collect();
        for r in 1..=p {
            for j in (r..=p).rev() {
                let i = j + k - p;
                let denom = self.knots[i + p + 1 - r] - self.knots[i];
                let alpha = if denom.abs() < f32::EPSILON {
                    0.0
                } else {
                    (t - self.knots[i]) / denom
                };
                d[j] = d[j - 1] * (1.0 - alpha) + d[j] * alpha;
            }
        }
        Some(d[p].to_pos2())
    }
}

fn clamped_uniform_knots(count: usize, degree: usize) -> Vec<f32> {
    if count <= degree {
        return Vec::new();
    }
    let interior = count - degree - 1;
    let mut knots = vec![0.0; degree + 1];
    for i in 1..=interior {
        knots.push(i as f32 / (interior + 1) as f32);
    }
    knots.extend(std::iter::repeat(1.0).take(degree + 1));
    knots
}

impl StrokeShape for BSplineStroke {
    fn kind(&self) -> StrokeKind {
        StrokeKind::BSpline
    }

    fn attrs(&self) -> &StrokeAttrs {
        &self.attrs
    }

    fn attrs_mut(&mut self) -> &mut StrokeAttrs {
        &mut self.attrs
    }

    fn bounds(&self) -> Rect {
        geometry::calculate_bounds(&self.curve_points(), self.attrs.width / 2.0)
    }

    fn contains(&self, pos: Pos2) -> bool {
        geometry::is_point_near_polyline(pos, &self.curve_points(), self.attrs.width / 2.0)
    }

    fn render(&self, painter: &mut dyn Painter) {
        let points = self.curve_points();
        if points.len() < 2 {
            return;
        }
        painter.draw_path(&Path::polyline(&points), Some(&self.attrs.pen()), None);
    }

    fn translate(&mut self, delta: Vec2) {
        for p in &mut self.control_points {
            *p += delta;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn controls() -> Vec<Pos2> {
        vec![
            Pos2::new(0.0, 0.0),
            Pos2::new(10.0, 20.0),
            Pos2::new(20.0, 20.0),
            Pos2::new(30.0, 0.0),
        ]
    }

    #[test]
    fn test_clamped_curve_hits_end_points() {
        let spline = BSplineStroke::new(controls(), 3, StrokeAttrs::default());
        assert_eq!(spline.knots.len(), 8);
        let pts = spline.curve_points();
        assert_eq!(pts.len(), DEFAULT_SAMPLES);
        assert!(pts[0].distance(Pos2::new(0.0, 0.0)) < 1e-3);
        assert!(pts[pts.len() - 1].distance(Pos2::new(30.0, 0.0)) < 1e-3);
    }

    #[test]
    fn test_degree_one_is_the_control_polygon() {
        let spline = BSplineStroke::new(controls(), 1, StrokeAttrs::default());
        let mid = spline.evaluate(1.0 / 3.0).unwrap();
        assert!(mid.distance(Pos2::new(10.0, 20.0)) < 1e-3);
    }

    #[test]
    fn test_degree_derived_when_missing() {
        let record = json!({
            "type": "bspline",
            "control_points": [{"x": 0, "y": 0}, {"x": 1, "y": 1}, {"x": 2, "y": 0}],
            "knots": [0, 0, 0, 1, 1, 1],
            "parameters": [0.0, 0.5, 1.0],
            "color": "#000000",
            "width": 1,
            "style": 1
        });
        let spline: BSplineStroke = serde_json::from_value(record).unwrap();
        assert_eq!(spline.degree(), 2);
        assert_eq!(spline.curve_points().len(), 3);
    }

    #[test]
    fn test_invalid_knots_fall_back_to_polygon() {
        let mut spline = BSplineStroke::new(controls(), 3, StrokeAttrs::default());
        spline.knots.pop();
        assert_eq!(spline.curve_points(), controls());
    }
}
