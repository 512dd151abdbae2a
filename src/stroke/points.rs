//! Serde adapters for points and sizes inside stroke bodies.
//!
//! Single anchors (line ends, rectangle corner, circle centre, text anchor) are
//! written as `[x, y]`; point sequences and image positions as `{x, y}`
//! objects. Readers accept either form everywhere.

use egui::{Pos2, Vec2};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum PointRepr {
    Pair([f32; 2]),
    Object { x: f32, y: f32 },
}

impl From<PointRepr> for Pos2 {
    fn from(repr: PointRepr) -> Self {
        match repr {
            PointRepr::Pair([x, y]) => Pos2::new(x, y),
            PointRepr::Object { x, y } => Pos2::new(x, y),
        }
    }
}

#[derive(Serialize)]
struct PointObject {
    x: f32,
    y: f32,
}

/// `[x, y]`
pub mod pair {
    use super::*;

    pub fn serialize<S: Serializer>(p: &Pos2, serializer: S) -> Result<S::Ok, S::Error> {
        [p.x, p.y].serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Pos2, D::Error> {
        PointRepr::deserialize(deserializer).map(Pos2::from)
    }
}

/// `{x, y}`
pub mod object {
    use super::*;

    pub fn serialize<S: Serializer>(p: &Pos2, serializer: S) -> Result<S::Ok, S::Error> {
        PointObject { x: p.x, y: p.y }.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Pos2, D::Error> {
        PointRepr::deserialize(deserializer).map(Pos2::from)
    }
}

/// `[{x, y}, ...]`
pub mod object_seq {
    use super::*;

    pub fn serialize<S: Serializer>(points: &[Pos2], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(points.iter().map(|p| PointObject { x: p.x, y: p.y }))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Pos2>, D::Error> {
        let reprs = Vec::<PointRepr>::deserialize(deserializer)?;
        Ok(reprs.into_iter().map(Pos2::from).collect())
    }
}

/// `{width, height}`, also reading `[w, h]`.
pub mod size {
    use super::*;

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum SizeRepr {
        Object { width: f32, height: f32 },
        Pair([f32; 2]),
    }

    pub fn serialize<S: Serializer>(size: &Vec2, serializer: S) -> Result<S::Ok, S::Error> {
        SizeRepr::Object {
            width: size.x,
            height: size.y,
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec2, D::Error> {
        Ok(match SizeRepr::deserialize(deserializer)? {
            SizeRepr::Object { width, height } => Vec2::new(width, height),
            SizeRepr::Pair([w, h]) => Vec2::new(w, h),
        })
    }
}
