use egui::Vec2;

use super::Painter;

/// Position / scale / rotation applied around a pivot, used to render a
/// stroke with an extra transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Position offset from the original position
    pub position: Vec2,
    /// Scale factor (1.0 = original size)
    pub scale: Vec2,
    /// Rotation in degrees, clockwise on screen
    pub rotation: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            scale: Vec2::new(1.0, 1.0),
            rotation: 0.0,
        }
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    /// Push this transform onto `painter`'s current coordinate system:
    /// offset, then rotate and scale about `pivot`.
    pub fn apply(&self, painter: &mut dyn Painter, pivot: Vec2) {
        painter.translate(self.position + pivot);
        if self.rotation != 0.0 {
            painter.rotate(self.rotation);
        }
        if self.scale != Vec2::new(1.0, 1.0) {
            painter.scale(self.scale.x, self.scale.y);
        }
        painter.translate(-pivot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{DrawOp, RecordingPainter};

    #[test]
    fn test_apply_pivots_rotation_and_scale() {
        let t = Transform {
            position: Vec2::new(10.0, 0.0),
            scale: Vec2::splat(2.0),
            rotation: 90.0,
        };
        let mut painter = RecordingPainter::new();
        t.apply(&mut painter, Vec2::new(5.0, 5.0));
        assert_eq!(
            painter.ops(),
            &[
                DrawOp::Translate(Vec2::new(15.0, 5.0)),
                DrawOp::Rotate(90.0),
                DrawOp::Scale(2.0, 2.0),
                DrawOp::Translate(Vec2::new(-5.0, -5.0)),
            ]
        );
    }

    #[test]
    fn test_identity_pushes_only_translations() {
        let mut painter = RecordingPainter::new();
        Transform::identity().apply(&mut painter, Vec2::new(3.0, 4.0));
        assert_eq!(painter.ops().len(), 2);
        assert!(Transform::identity().is_identity());
    }
}
