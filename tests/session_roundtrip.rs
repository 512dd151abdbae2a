use egui::{Color32, Pos2, Vec2};
use serde_json::{json, Value};
use sketchdeck::document::{BackgroundSettings, GridSettings, PdfBackground};
use sketchdeck::render::{FontSpec, LineStyle};
use sketchdeck::session::{self, Session, Tab};
use sketchdeck::stroke::{
    BSplineStroke, CircleStroke, FreehandStroke, ImageStroke, LineStroke, RectangleStroke,
    StrokeAttrs, TextStroke,
};
use sketchdeck::{Document, LayerModel, Stroke};

fn red_line() -> Stroke {
    LineStroke::new(
        Pos2::new(10.0, 10.0),
        Pos2::new(100.0, 100.0),
        StrokeAttrs::new(Color32::RED, 2.0, LineStyle::Solid),
    )
    .into()
}

fn single_tab(document: Document) -> Session {
    Session::from_tabs(
        vec![Tab {
            name: "Sketch".to_string(),
            document,
        }],
        0,
    )
}

fn one_of_each() -> Vec<Stroke> {
    let blue = StrokeAttrs::new(Color32::from_rgb(0, 0, 255), 3.0, LineStyle::Dashed);
    let mut image = ImageStroke::new("missing.png", Pos2::new(5.0, 6.0), Vec2::new(40.0, 30.0));
    image.rotation = 15.0;
    image.opacity = 0.75;
    image.effects.has_shadow = true;
    image.effects.corner_radius = 4.0;
    vec![
        red_line(),
        RectangleStroke::new(Pos2::new(1.0, 2.0), Vec2::new(30.0, 20.0), blue.clone())
            .with_fill(Color32::YELLOW)
            .into(),
        CircleStroke::new(Pos2::new(50.0, 50.0), 12.0, blue.clone()).into(),
        BSplineStroke::new(
            vec![
                Pos2::new(0.0, 0.0),
                Pos2::new(10.0, 30.0),
                Pos2::new(20.0, -10.0),
                Pos2::new(30.0, 0.0),
            ],
            3,
            blue.clone(),
        )
        .into(),
        FreehandStroke::new(
            vec![Pos2::new(0.0, 0.0), Pos2::new(5.0, 5.0), Pos2::new(10.0, 0.0)],
            vec![0.5, 1.0, 0.5],
            StrokeAttrs::new(Color32::BLACK, 4.0, LineStyle::Dotted),
        )
        .unwrap()
        .into(),
        TextStroke::new(Pos2::new(3.0, 4.0), "hello", FontSpec::default(), blue).into(),
        image.into(),
    ]
}

#[test]
fn test_line_serialises_with_session_field_names() {
    let session = single_tab(Document::with_layers(LayerModel::from_strokes(vec![red_line()])));
    let value: Value = serde_json::from_str(&session::to_json(&session).unwrap()).unwrap();

    let stroke = &value["tabs"][0]["layers"]["layers"][0]["strokes"][0];
    assert_eq!(stroke["type"], "line");
    assert_eq!(stroke["color"], "#ff0000");
    assert_eq!(stroke["style"], 1);
    assert_eq!(stroke["width"].as_f64(), Some(2.0));
    assert_eq!(stroke["start_point"], json!([10.0, 10.0]));
    assert_eq!(stroke["end_point"], json!([100.0, 100.0]));
    assert_eq!(value["version"], session::SESSION_VERSION);
}

#[test]
fn test_every_stroke_kind_survives_round_trip() {
    let mut document = Document::with_layers(LayerModel::from_strokes(one_of_each()));
    document.background = BackgroundSettings {
        color: Color32::from_rgb(250, 250, 240),
        grid: Some(GridSettings::default()),
        ..BackgroundSettings::default()
    };
    let mut session = single_tab(document);
    session.set_setting("view", "zoom", "1.5");

    let restored = session::from_json(&session::to_json(&session).unwrap()).unwrap();
    assert_eq!(restored, session);
}

#[test]
fn test_layer_order_and_visibility_persist() {
    let mut layers = LayerModel::from_strokes(vec![red_line()]);
    let first = layers.order()[0].clone();
    let second = layers.add_layer(Some("Ink"));
    layers.set_visibility(&first, false);
    let session = single_tab(Document::with_layers(layers));

    let restored = session::from_json(&session::to_json(&session).unwrap()).unwrap();
    let layers = restored.active_document().layers();
    assert_eq!(layers.order(), &[first.clone(), second.clone()]);
    assert!(!layers.layer(&first).unwrap().visible);
    assert_eq!(layers.active_layer_id(), Some(second.as_str()));
}

#[test]
fn test_pdf_page_layers_round_trip() {
    let mut state = serde_json::Map::new();
    state.insert("path".into(), json!("deck.pdf"));
    let mut document = Document::new();
    document.restore_pdf(PdfBackground::new(state, 3));
    document.layers_mut().add_stroke_to_active(red_line());
    document.set_current_page(2);
    document.layers_mut().add_layer(Some("Notes"));

    let session = single_tab(document);
    let text = session::to_json(&session).unwrap();
    let value: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["tabs"][0]["pdf_background"]["current_page"], 2);
    assert!(value["tabs"][0]["pdf_page_layers"]["0"].is_object());

    let restored = session::from_json(&text).unwrap();
    assert_eq!(restored, session);
    assert_eq!(restored.active_document().current_page(), Some(2));
    assert_eq!(restored.active_document().layers().len(), 2);
}
