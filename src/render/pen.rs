use egui::Color32;
use serde::{Deserialize, Serialize};

/// Line dash pattern. Stored on disk as its integer value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum LineStyle {
    #[default]
    Solid = 1,
    Dashed = 2,
    Dotted = 3,
}

impl From<LineStyle> for u8 {
    fn from(style: LineStyle) -> Self {
        style as u8
    }
}

impl TryFrom<u8> for LineStyle {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(LineStyle::Solid),
            2 => Ok(LineStyle::Dashed),
            3 => Ok(LineStyle::Dotted),
            other => Err(format!("unknown line style {other}")),
        }
    }
}

impl LineStyle {
    /// Dash array in multiples of the pen width, `None` for solid lines.
    pub fn dash_pattern(self, width: f32) -> Option<Vec<f32>> {
        let unit = width.max(1.0);
        match self {
            LineStyle::Solid => None,
            LineStyle::Dashed => Some(vec![4.0 * unit, 2.0 * unit]),
            LineStyle::Dotted => Some(vec![unit, 2.0 * unit]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pen {
    pub color: Color32,
    pub width: f32,
    pub style: LineStyle,
}

impl Pen {
    pub fn new(color: Color32, width: f32, style: LineStyle) -> Self {
        Self { color, width, style }
    }

    pub fn solid(color: Color32, width: f32) -> Self {
        Self::new(color, width, LineStyle::Solid)
    }
}

/// Font attributes of a text stroke. Rasterisation is approximate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontSpec {
    pub family: String,
    pub size: f32,
    pub bold: bool,
    pub italic: bool,
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            family: "Sans Serif".to_string(),
            size: 14.0,
            bold: false,
            italic: false,
        }
    }
}

impl FontSpec {
    /// Horizontal advance per character.
    pub fn advance(&self) -> f32 {
        let base = 0.6 * self.size;
        if self.bold { base * 1.1 } else { base }
    }

    pub fn line_height(&self) -> f32 {
        1.2 * self.size
    }
}
