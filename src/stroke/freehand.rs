use egui::{Pos2, Rect, Vec2};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{points, StrokeAttrs, StrokeError, StrokeKind, StrokeResult, StrokeShape};
use crate::geometry;
use crate::render::{Painter, Path, Pen};

#[derive(Deserialize)]
struct FreehandRecord {
    #[serde(with = "points::object_seq")]
    points: Vec<Pos2>,
    #[serde(default)]
    pressures: Option<Vec<f32>>,
    #[serde(flatten)]
    attrs: StrokeAttrs,
}

/// Pressure-sensitive polyline. `pressures` always has one entry per point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FreehandStroke {
    #[serde(with = "points::object_seq")]
    points: Vec<Pos2>,
    pressures: Vec<f32>,
    #[serde(flatten)]
    pub attrs: StrokeAttrs,
}

impl FreehandStroke {
    pub fn new(points: Vec<Pos2>, pressures: Vec<f32>, attrs: StrokeAttrs) -> StrokeResult<Self> {
        if points.len() != pressures.len() {
            return Err(StrokeError::PressureMismatch {
                points: points.len(),
                pressures: pressures.len(),
            });
        }
        Ok(Self {
            points,
            pressures: pressures.into_iter().map(|p| p.clamp(0.0, 1.0)).collect(),
            attrs,
        })
    }

    /// Constant full pressure.
    pub fn uniform(points: Vec<Pos2>, attrs: StrokeAttrs) -> Self {
        let pressures = vec![1.0; points.len()];
        Self {
            points,
            pressures,
            attrs,
        }
    }

    /// Records without a pressure list get full pressure everywhere.
    pub(crate) fn from_dict(value: &Value) -> StrokeResult<Self> {
        let record: FreehandRecord =
            serde_json::from_value(value.clone()).map_err(|source| StrokeError::Invalid {
                kind: StrokeKind::Freehand.as_str(),
                source,
            })?;
        let pressures = record
            .pressures
            .unwrap_or_else(|| vec![1.0; record.points.len()]);
        Self::new(record.points, pressures, record.attrs)
    }

    pub fn points(&self) -> &[Pos2] {
        &self.points
    }

    pub fn pressures(&self) -> &[f32] {
        &self.pressures
    }

    pub fn push(&mut self, point: Pos2, pressure: f32) {
        self.points.push(point);
        self.pressures.push(pressure.clamp(0.0, 1.0));
    }

    /// Width of the segment starting at point `i`: base width scaled by the
    /// mean pressure of its two ends.
    pub fn segment_width(&self, i: usize) -> f32 {
        let a = self.pressures.get(i).copied().unwrap_or(1.0);
        let b = self.pressures.get(i + 1).copied().unwrap_or(a);
        self.attrs.width * (a + b) / 2.0
    }
}

impl StrokeShape for FreehandStroke {
    fn kind(&self) -> StrokeKind {
        StrokeKind::Freehand
    }

    fn attrs(&self) -> &StrokeAttrs {
        &self.attrs
    }

    fn attrs_mut(&mut self) -> &mut StrokeAttrs {
        &mut self.attrs
    }

    fn bounds(&self) -> Rect {
        geometry::calculate_bounds(&self.points, self.attrs.width / 2.0)
    }

    fn contains(&self, pos: Pos2) -> bool {
        geometry::is_point_near_polyline(pos, &self.points, self.attrs.width / 2.0)
    }

    fn render(&self, painter: &mut dyn Painter) {
        match self.points.len() {
            0 => {}
            1 => {
                let r = self.segment_width(0) / 2.0;
                painter.draw_path(&Path::ellipse(self.points[0], r, r), None, Some(self.attrs.color));
            }
            _ => {
                for (i, pair) in self.points.windows(2).enumerate() {
                    let pen = Pen::new(self.attrs.color, self.segment_width(i), self.attrs.style);
                    painter.draw_path(&Path::polyline(pair), Some(&pen), None);
                }
            }
        }
    }

    fn translate(&mut self, delta: Vec2) {
        for p in &mut self.points {
            *p += delta;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{DrawOp, RecordingPainter};
    use serde_json::json;

    fn three_points() -> Vec<Pos2> {
        vec![Pos2::new(0.0, 0.0), Pos2::new(10.0, 0.0), Pos2::new(20.0, 0.0)]
    }

    #[test]
    fn test_pressure_length_must_match() {
        let err = FreehandStroke::new(three_points(), vec![1.0], StrokeAttrs::default()).unwrap_err();
        assert!(matches!(err, StrokeError::PressureMismatch { points: 3, pressures: 1 }));
    }

    #[test]
    fn test_pressure_modulates_segment_width() {
        let attrs = StrokeAttrs {
            width: 4.0,
            ..Default::default()
        };
        let stroke = FreehandStroke::new(three_points(), vec![0.5, 1.0, 0.5], attrs).unwrap();
        let mut painter = RecordingPainter::new();
        stroke.render(&mut painter);
        let widths: Vec<f32> = painter
            .ops()
            .iter()
            .filter_map(|op| match op {
                DrawOp::Path { pen: Some(pen), .. } => Some(pen.width),
                _ => None,
            })
            .collect();
        assert_eq!(widths, vec![3.0, 3.0]);
    }

    #[test]
    fn test_mismatched_record_is_rejected() {
        let record = json!({
            "type": "freehand",
            "points": [{"x": 0, "y": 0}, {"x": 1, "y": 1}],
            "pressures": [1.0],
        });
        assert!(matches!(
            FreehandStroke::from_dict(&record),
            Err(StrokeError::PressureMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_pressures_default_to_full() {
        let record = json!({"type": "freehand", "points": [[0, 0], [1, 1]]});
        let stroke = FreehandStroke::from_dict(&record).unwrap();
        assert_eq!(stroke.pressures(), &[1.0, 1.0]);
    }
}
