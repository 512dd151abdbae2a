//! `#RRGGBB` encoding for colours, plus serde adapters for the session and library formats.

use egui::Color32;
use serde::{Deserialize, Deserializer, Serializer};

/// Lower-case `#rrggbb`. Alpha is not part of the stored form.
pub fn to_hex(color: Color32) -> String {
    let [r, g, b, _] = color.to_srgba_unmultiplied();
    format!("#{r:02x}{g:02x}{b:02x}")
}

/// Accepts `#rgb`, `#rrggbb` and `#aarrggbb` (alpha first).
pub fn from_hex(text: &str) -> Option<Color32> {
    let hex = text.trim().strip_prefix('#')?;
    let byte = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        3 => {
            let mut chans = hex.chars().map(|c| c.to_digit(16).map(|d| (d * 17) as u8));
            let r = chans.next()??;
            let g = chans.next()??;
            let b = chans.next()??;
            Some(Color32::from_rgb(r, g, b))
        }
        6 => Some(Color32::from_rgb(byte(&hex[0..2])?, byte(&hex[2..4])?, byte(&hex[4..6])?)),
        8 => Some(Color32::from_rgba_unmultiplied(
            byte(&hex[2..4])?,
            byte(&hex[4..6])?,
            byte(&hex[6..8])?,
            byte(&hex[0..2])?,
        )),
        _ => None,
    }
}

pub fn serialize<S: Serializer>(color: &Color32, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&to_hex(*color))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Color32, D::Error> {
    let text = String::deserialize(deserializer)?;
    from_hex(&text).ok_or_else(|| serde::de::Error::custom(format!("invalid colour '{text}'")))
}

/// Same as the parent module, for `Option<Color32>` (`null` = no colour).
pub mod option {
    use super::*;

    pub fn serialize<S: Serializer>(color: &Option<Color32>, serializer: S) -> Result<S::Ok, S::Error> {
        match color {
            Some(c) => serializer.serialize_some(&to_hex(*c)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Color32>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(text) => from_hex(&text)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid colour '{text}'"))),
        }
    }
}
