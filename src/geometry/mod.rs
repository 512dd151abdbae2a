mod hit_testing;

pub use hit_testing::{
    calculate_bounds, distance_to_line_segment, is_point_near_polyline, HIT_TOLERANCE,
};

use egui::{Pos2, Rect, Vec2};

/// Union of several rectangles. Returns `Rect::NOTHING` for an empty input.
pub fn union_all<I: IntoIterator<Item = Rect>>(rects: I) -> Rect {
    rects.into_iter().fold(Rect::NOTHING, |acc, r| acc.union(r))
}

/// Scale `size` down so it fits in a `max_extent` square, keeping the aspect ratio.
/// Sizes that already fit are returned unchanged.
pub fn fit_within(size: Vec2, max_extent: f32) -> Vec2 {
    if size.x <= 0.0 || size.y <= 0.0 {
        return size;
    }
    if size.x <= max_extent && size.y <= max_extent {
        return size;
    }
    let scale = (max_extent / size.x).min(max_extent / size.y);
    Vec2::new(size.x * scale, size.y * scale)
}

/// Rotate `point` around `pivot` by `degrees` (screen space, y down).
pub fn rotate_around(point: Pos2, pivot: Pos2, degrees: f32) -> Pos2 {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let d = point - pivot;
    Pos2::new(
        pivot.x + d.x * cos - d.y * sin,
        pivot.y + d.x * sin + d.y * cos,
    )
}
