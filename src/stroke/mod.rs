//! Drawable primitives.
//!
//! [`Stroke`] is the tagged variant stored in layers. Each kind lives in its own
//! module and implements [`StrokeShape`]; the enum dispatches to them the same
//! way for every operation.

use egui::{Color32, Pos2, Rect, Vec2};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

pub mod bspline;
pub mod circle;
pub mod freehand;
pub mod image;
pub mod line;
pub mod points;
pub mod rectangle;
pub mod text;

pub use bspline::BSplineStroke;
pub use circle::CircleStroke;
pub use freehand::FreehandStroke;
pub use image::{ImageEffects, ImageStroke};
pub use line::LineStroke;
pub use rectangle::RectangleStroke;
pub use text::TextStroke;

use crate::render::{LineStyle, Painter, Pen, Transform};

/// Errors raised while building or decoding a stroke
#[derive(Debug, Error)]
pub enum StrokeError {
    #[error("stroke record is not a JSON object")]
    NotAnObject,

    #[error("stroke record has no 'type' field")]
    MissingKind,

    #[error("unknown stroke kind '{0}'")]
    UnknownKind(String),

    #[error("freehand stroke has {points} points but {pressures} pressures")]
    PressureMismatch { points: usize, pressures: usize },

    #[error("invalid {kind} stroke: {source}")]
    Invalid {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

pub type StrokeResult<T> = Result<T, StrokeError>;

fn default_color() -> Color32 {
    Color32::BLACK
}

fn default_width() -> f32 {
    2.0
}

/// Attributes shared by every stroke kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeAttrs {
    #[serde(with = "crate::util::color", default = "default_color")]
    pub color: Color32,
    #[serde(default = "default_width")]
    pub width: f32,
    #[serde(default)]
    pub style: LineStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Default for StrokeAttrs {
    fn default() -> Self {
        Self {
            color: default_color(),
            width: default_width(),
            style: LineStyle::Solid,
            group_id: None,
            name: None,
        }
    }
}

impl StrokeAttrs {
    pub fn new(color: Color32, width: f32, style: LineStyle) -> Self {
        Self {
            color,
            width,
            style,
            ..Self::default()
        }
    }

    pub fn pen(&self) -> Pen {
        Pen::new(self.color, self.width, self.style)
    }
}

/// Discriminator written as the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrokeKind {
    Line,
    Rectangle,
    Circle,
    BSpline,
    Freehand,
    Image,
    Text,
}

impl StrokeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StrokeKind::Line => "line",
            StrokeKind::Rectangle => "rectangle",
            StrokeKind::Circle => "circle",
            StrokeKind::BSpline => "bspline",
            StrokeKind::Freehand => "freehand",
            StrokeKind::Image => "image",
            StrokeKind::Text => "text",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        Some(match text {
            "line" => StrokeKind::Line,
            "rectangle" | "rect" => StrokeKind::Rectangle,
            "circle" => StrokeKind::Circle,
            "bspline" => StrokeKind::BSpline,
            "freehand" => StrokeKind::Freehand,
            "image" => StrokeKind::Image,
            "text" => StrokeKind::Text,
            _ => return None,
        })
    }
}

/// Behaviour every stroke kind provides
pub trait StrokeShape {
    fn kind(&self) -> StrokeKind;

    fn attrs(&self) -> &StrokeAttrs;

    fn attrs_mut(&mut self) -> &mut StrokeAttrs;

    /// Axis-aligned bounds in document coordinates, including the pen width.
    fn bounds(&self) -> Rect;

    /// Geometric hit test. 1-D primitives get a small tolerance.
    fn contains(&self, pos: Pos2) -> bool;

    /// Paint with the stroke's own pen, honouring the painter's opacity.
    fn render(&self, painter: &mut dyn Painter);

    fn translate(&mut self, delta: Vec2);
}

/// Any drawable primitive in a layer
#[derive(Debug, Clone, PartialEq)]
pub enum Stroke {
    Line(LineStroke),
    Rectangle(RectangleStroke),
    Circle(CircleStroke),
    BSpline(BSplineStroke),
    Freehand(FreehandStroke),
    Image(ImageStroke),
    Text(TextStroke),
}

macro_rules! dispatch {
    ($self:expr, $s:ident => $body:expr) => {
        match $self {
            Stroke::Line($s) => $body,
            Stroke::Rectangle($s) => $body,
            Stroke::Circle($s) => $body,
            Stroke::BSpline($s) => $body,
            Stroke::Freehand($s) => $body,
            Stroke::Image($s) => $body,
            Stroke::Text($s) => $body,
        }
    };
}

impl StrokeShape for Stroke {
    fn kind(&self) -> StrokeKind {
        dispatch!(self, s => s.kind())
    }

    fn attrs(&self) -> &StrokeAttrs {
        dispatch!(self, s => s.attrs())
    }

    fn attrs_mut(&mut self) -> &mut StrokeAttrs {
        dispatch!(self, s => s.attrs_mut())
    }

    fn bounds(&self) -> Rect {
        dispatch!(self, s => s.bounds())
    }

    fn contains(&self, pos: Pos2) -> bool {
        dispatch!(self, s => s.contains(pos))
    }

    fn render(&self, painter: &mut dyn Painter) {
        dispatch!(self, s => s.render(painter))
    }

    fn translate(&mut self, delta: Vec2) {
        dispatch!(self, s => s.translate(delta))
    }
}

fn decode<T: serde::de::DeserializeOwned>(kind: StrokeKind, value: &Value) -> StrokeResult<T> {
    serde_json::from_value(value.clone()).map_err(|source| StrokeError::Invalid {
        kind: kind.as_str(),
        source,
    })
}

impl Stroke {
    /// Value-semantic deep copy. Image strokes still waiting on the loader get
    /// their own subscription.
    pub fn copy(&self) -> Stroke {
        self.clone()
    }

    /// Render with an extra transform applied around the stroke's centre.
    pub fn render_with(&self, painter: &mut dyn Painter, transform: Option<&Transform>) {
        match transform {
            Some(t) if !t.is_identity() => {
                painter.save();
                t.apply(painter, self.bounds().center().to_vec2());
                self.render(painter);
                painter.restore();
            }
            _ => self.render(painter),
        }
    }

    pub fn group_id(&self) -> Option<&str> {
        self.attrs().group_id.as_deref()
    }

    pub fn as_image(&self) -> Option<&ImageStroke> {
        match self {
            Stroke::Image(image) => Some(image),
            _ => None,
        }
    }

    pub fn as_image_mut(&mut self) -> Option<&mut ImageStroke> {
        match self {
            Stroke::Image(image) => Some(image),
            _ => None,
        }
    }

    /// Serialise to the session/library JSON form.
    pub fn to_dict(&self) -> Value {
        let body = match self {
            Stroke::Line(s) => serde_json::to_value(s),
            Stroke::Rectangle(s) => serde_json::to_value(s),
            Stroke::Circle(s) => serde_json::to_value(s),
            Stroke::BSpline(s) => serde_json::to_value(s),
            Stroke::Freehand(s) => serde_json::to_value(s),
            Stroke::Image(s) => return s.to_dict(),
            Stroke::Text(s) => serde_json::to_value(s),
        };
        let mut body = match body {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                log::warn!("stroke serialised to a non-object: {other}");
                serde_json::Map::new()
            }
            Err(err) => {
                log::error!("failed to serialise {} stroke: {err}", self.kind().as_str());
                serde_json::Map::new()
            }
        };
        body.insert("type".to_string(), Value::from(self.kind().as_str()));
        Value::Object(body)
    }

    /// Inverse of [`Self::to_dict`]. Image records are recognised by
    /// `stroke_type == "image"` before the general `type` field is consulted.
    pub fn from_dict(value: &Value) -> StrokeResult<Stroke> {
        let object = value.as_object().ok_or(StrokeError::NotAnObject)?;
        if object.get("stroke_type").and_then(Value::as_str) == Some("image") {
            return ImageStroke::from_dict(value).map(Stroke::Image);
        }
        let tag = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or(StrokeError::MissingKind)?;
        let kind = StrokeKind::parse(tag).ok_or_else(|| StrokeError::UnknownKind(tag.to_string()))?;
        Ok(match kind {
            StrokeKind::Line => Stroke::Line(decode(kind, value)?),
            StrokeKind::Rectangle => Stroke::Rectangle(decode(kind, value)?),
            StrokeKind::Circle => Stroke::Circle(decode(kind, value)?),
            StrokeKind::BSpline => Stroke::BSpline(decode(kind, value)?),
            StrokeKind::Freehand => Stroke::Freehand(FreehandStroke::from_dict(value)?),
            StrokeKind::Image => Stroke::Image(ImageStroke::from_dict(value)?),
            StrokeKind::Text => Stroke::Text(decode(kind, value)?),
        })
    }
}

impl Serialize for Stroke {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_dict().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Stroke {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Stroke::from_dict(&value).map_err(serde::de::Error::custom)
    }
}

impl From<LineStroke> for Stroke {
    fn from(s: LineStroke) -> Self {
        Stroke::Line(s)
    }
}

impl From<RectangleStroke> for Stroke {
    fn from(s: RectangleStroke) -> Self {
        Stroke::Rectangle(s)
    }
}

impl From<CircleStroke> for Stroke {
    fn from(s: CircleStroke) -> Self {
        Stroke::Circle(s)
    }
}

impl From<BSplineStroke> for Stroke {
    fn from(s: BSplineStroke) -> Self {
        Stroke::BSpline(s)
    }
}

impl From<FreehandStroke> for Stroke {
    fn from(s: FreehandStroke) -> Self {
        Stroke::Freehand(s)
    }
}

impl From<ImageStroke> for Stroke {
    fn from(s: ImageStroke) -> Self {
        Stroke::Image(s)
    }
}

impl From<TextStroke> for Stroke {
    fn from(s: TextStroke) -> Self {
        Stroke::Text(s)
    }
}
