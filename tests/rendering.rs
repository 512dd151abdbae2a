use egui::{Color32, Pos2, Rect, Vec2};
use image::{Rgba, RgbaImage};
use sketchdeck::render::{DrawOp, LineStyle, Painter, RasterPainter, RecordingPainter};
use sketchdeck::stroke::{
    FreehandStroke, ImageStroke, LineStroke, RectangleStroke, StrokeAttrs, StrokeShape,
};
use sketchdeck::{Document, LayerModel, Pixmap, Stroke};

fn viewport(size: f32) -> Rect {
    Rect::from_min_size(Pos2::ZERO, Vec2::splat(size))
}

fn filled(min: Pos2, size: Vec2, color: Color32) -> Stroke {
    RectangleStroke::new(min, size, StrokeAttrs::new(color, 0.0, LineStyle::Solid))
        .with_fill(color)
        .into()
}

#[test]
fn test_hidden_layer_contributes_no_pixels() {
    let red_line: Stroke = LineStroke::new(
        Pos2::new(10.0, 10.0),
        Pos2::new(100.0, 100.0),
        StrokeAttrs::new(Color32::RED, 2.0, LineStyle::Solid),
    )
    .into();
    let mut layers = LayerModel::from_strokes(vec![red_line]);
    let first = layers.order()[0].clone();
    let second = layers.add_layer(Some("Ink"));
    let freehand = FreehandStroke::new(
        vec![Pos2::new(20.0, 80.0), Pos2::new(60.0, 80.0), Pos2::new(100.0, 80.0)],
        vec![0.5, 1.0, 0.5],
        StrokeAttrs::new(Color32::BLUE, 6.0, LineStyle::Solid),
    )
    .unwrap();
    assert!(layers.add_stroke(&second, freehand.into()));
    assert!(layers.set_visibility(&first, false));
    let document = Document::with_layers(layers);

    let mut painter = RasterPainter::new(120, 120).unwrap();
    document.render(&mut painter, viewport(120.0));

    // On the hidden red line, away from the freehand stroke.
    assert_eq!(painter.pixel(40, 40), [255, 255, 255, 255]);
    let ink = painter.pixel(60, 80);
    assert!(ink[2] > 200 && ink[0] < 60, "expected blue, got {ink:?}");
    assert_eq!(document.layers().layer(&first).unwrap().strokes().len(), 1);
}

#[test]
fn test_later_stroke_paints_over_earlier() {
    let layers = LayerModel::from_strokes(vec![
        filled(Pos2::new(10.0, 10.0), Vec2::splat(40.0), Color32::RED),
        filled(Pos2::new(30.0, 30.0), Vec2::splat(40.0), Color32::BLUE),
    ]);
    let document = Document::with_layers(layers);
    let mut painter = RasterPainter::new(100, 100).unwrap();
    document.render(&mut painter, viewport(100.0));

    assert_eq!(painter.pixel(20, 20), [255, 0, 0, 255]);
    assert_eq!(painter.pixel(40, 40), [0, 0, 255, 255]);
    assert_eq!(painter.pixel(60, 60), [0, 0, 255, 255]);
}

#[test]
fn test_upper_layer_paints_over_lower() {
    let mut layers = LayerModel::from_strokes(vec![filled(Pos2::ZERO, Vec2::splat(50.0), Color32::BLUE)]);
    let bottom = layers.order()[0].clone();
    let top = layers.add_layer(None);
    layers.add_stroke(&top, filled(Pos2::ZERO, Vec2::splat(50.0), Color32::GREEN));

    let mut painter = RasterPainter::new(60, 60).unwrap();
    layers.render(&mut painter);
    assert_eq!(painter.pixel(25, 25), Color32::GREEN.to_array());

    assert!(layers.move_layer(&bottom, 1));
    let mut painter = RasterPainter::new(60, 60).unwrap();
    layers.render(&mut painter);
    assert_eq!(painter.pixel(25, 25), [0, 0, 255, 255]);
}

#[test]
fn test_degenerate_shadow_drawn_two_pixels_down() {
    let mut image = ImageStroke::from_pixmap(Pixmap::new(RgbaImage::from_pixel(10, 10, Rgba([0, 128, 0, 255]))), Pos2::new(30.0, 30.0));
    image.effects.has_shadow = true;
    image.effects.inner_shadow = false;
    image.effects.shadow_offset_x = 0.0;
    image.effects.shadow_offset_y = 0.0;
    image.effects.shadow_blur = 0.0;
    let document = Document::with_layers(LayerModel::from_strokes(vec![image.into()]));

    let mut painter = RecordingPainter::new();
    document.render(&mut painter, viewport(100.0));
    let targets: Vec<Rect> = painter
        .ops()
        .iter()
        .filter_map(|op| match op {
            DrawOp::Pixmap { target, .. } => Some(*target),
            _ => None,
        })
        .collect();
    assert_eq!(targets.len(), 2);
    assert_eq!(targets[0].min - targets[1].min, Vec2::new(0.0, 2.0));
}

#[test]
fn test_inner_shadow_stays_inside_rotated_silhouette() {
    // Opaque disc of radius 8 in a transparent 20x20 tile.
    let disc = RgbaImage::from_fn(20, 20, |x, y| {
        let d = Pos2::new(x as f32 + 0.5, y as f32 + 0.5).distance(Pos2::new(10.0, 10.0));
        if d <= 8.0 {
            Rgba([200, 40, 40, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    });
    let mut image = ImageStroke::from_pixmap(Pixmap::new(disc), Pos2::new(20.0, 20.0));
    image.effects.has_shadow = true;
    image.effects.inner_shadow = true;
    image.effects.shadow_size = 3.0;

    for rotation in [0.0, 30.0] {
        image.rotation = rotation;
        let mut painter = RasterPainter::new(60, 60).unwrap();
        image.render(&mut painter);
        let center = image.rect().center();
        for y in 0..60 {
            for x in 0..60 {
                let d = Pos2::new(x as f32 + 0.5, y as f32 + 0.5).distance(center);
                if d > 10.5 {
                    assert_eq!(painter.pixel(x, y)[3], 0, "pixel ({x},{y}) at rotation {rotation}");
                }
            }
        }
    }
}

#[test]
fn test_plain_image_matches_source_pixels() {
    let source = Pixmap::new(RgbaImage::from_fn(6, 6, |x, y| Rgba([x as u8 * 40, y as u8 * 40, 90, 255])));
    let mut image = ImageStroke::from_pixmap(source.clone(), Pos2::new(4.0, 4.0));
    image.size = Vec2::new(6.0, 6.0);
    let mut painter = RasterPainter::new(16, 16).unwrap();
    painter.set_opacity(1.0);
    image.render(&mut painter);
    for y in 0..6 {
        for x in 0..6 {
            assert_eq!(painter.pixel(x + 4, y + 4), source.image().get_pixel(x, y).0);
        }
    }
}
