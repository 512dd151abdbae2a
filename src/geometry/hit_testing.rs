use egui::{Pos2, Rect};

/// Extra slack, in document units, granted to 1-D primitives during hit tests.
pub const HIT_TOLERANCE: f32 = 3.0;

/// Calculate distance from a point to a line segment
pub fn distance_to_line_segment(point: Pos2, line_start: Pos2, line_end: Pos2) -> f32 {
    let line_vec = line_end - line_start;
    let point_vec = point - line_start;

    let line_len = line_vec.length();
    if line_len == 0.0 {
        return point_vec.length();
    }

    let t = ((point_vec.x * line_vec.x + point_vec.y * line_vec.y) / line_len).clamp(0.0, line_len);
    let projection = line_start + (line_vec * t / line_len);
    (point - projection).length()
}

/// Calculate the bounding box for a set of points
pub fn calculate_bounds(points: &[Pos2], padding: f32) -> Rect {
    if points.is_empty() {
        return Rect::NOTHING;
    }

    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut max_y = f32::NEG_INFINITY;

    for point in points {
        min_x = min_x.min(point.x);
        min_y = min_y.min(point.y);
        max_x = max_x.max(point.x);
        max_y = max_y.max(point.y);
    }

    Rect::from_min_max(
        Pos2::new(min_x - padding, min_y - padding),
        Pos2::new(max_x + padding, max_y + padding),
    )
}

/// True when `pos` lies within `half_width + HIT_TOLERANCE` of any segment of the polyline.
/// A single point polyline is treated as a dot.
pub fn is_point_near_polyline(pos: Pos2, points: &[Pos2], half_width: f32) -> bool {
    let reach = half_width + HIT_TOLERANCE;
    match points {
        [] => false,
        [only] => only.distance(pos) <= reach,
        _ => points
            .windows(2)
            .any(|w| distance_to_line_segment(pos, w[0], w[1]) <= reach),
    }
}
