//! Reusable stroke groups, stored in one JSON file with base64 PNG previews.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use egui::{Pos2, Vec2};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::geometry;
use crate::session::write_atomic;
use crate::stroke::{Stroke, StrokeError, StrokeShape};
use crate::util::time;

mod thumbnail;

pub use thumbnail::{capture_thumbnail, decode_thumbnail, CanvasSnapshot, CanvasSource};

pub const LIBRARY_VERSION: &str = "1.0";

/// The category every library has. It can't be removed.
pub const GENERAL_CATEGORY: &str = "General";

/// Fields older libraries may lack, with the values they default to.
fn migrated_fields() -> [(&'static str, Value); 3] {
    [
        ("favorite", Value::Bool(false)),
        ("usage_count", Value::from(0u64)),
        ("thumbnail", Value::Null),
    ]
}

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("library I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("library file is not valid: {0}")]
    Json(#[from] serde_json::Error),

    #[error("shape contains an invalid stroke: {0}")]
    Stroke(#[from] StrokeError),

    #[error("no category named '{0}'")]
    UnknownCategory(String),

    #[error("category '{0}' already exists")]
    DuplicateCategory(String),

    #[error("category '{0}' is reserved")]
    ReservedCategory(String),

    #[error("no shape with id '{0}'")]
    UnknownShape(String),
}

pub type LibraryResult<T> = Result<T, LibraryError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeRecord {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Strokes in their session-file form.
    pub strokes: Vec<Value>,
    #[serde(default)]
    pub created: String,
    /// Base64 PNG
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub usage_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub shapes: BTreeMap<String, ShapeRecord>,
}

impl CategoryRecord {
    fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            shapes: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryFile {
    pub version: String,
    #[serde(default)]
    pub categories: BTreeMap<String, CategoryRecord>,
}

impl Default for LibraryFile {
    fn default() -> Self {
        let mut categories = BTreeMap::new();
        categories.insert(
            GENERAL_CATEGORY.to_string(),
            CategoryRecord::new(GENERAL_CATEGORY, "General shapes"),
        );
        Self {
            version: LIBRARY_VERSION.to_string(),
            categories,
        }
    }
}

/// A shape together with where it lives.
#[derive(Debug, Clone, Copy)]
pub struct ShapeEntry<'a> {
    pub category: &'a str,
    pub id: &'a str,
    pub record: &'a ShapeRecord,
}

/// Fill in fields that shape records written by older versions lack.
/// Returns true if anything was added.
fn migrate(raw: &mut Value) -> bool {
    let defaults = migrated_fields();
    let mut changed = false;
    let Some(categories) = raw.get_mut("categories").and_then(Value::as_object_mut) else {
        return false;
    };
    for category in categories.values_mut() {
        let Some(shapes) = category.get_mut("shapes").and_then(Value::as_object_mut) else {
            continue;
        };
        for shape in shapes.values_mut().filter_map(Value::as_object_mut) {
            for (field, default) in &defaults {
                if !shape.contains_key(*field) {
                    shape.insert(field.to_string(), default.clone());
                    changed = true;
                }
            }
        }
    }
    changed
}

/// Most used first, then by name.
fn by_usage(entries: &mut [ShapeEntry<'_>]) {
    entries.sort_by(|a, b| {
        b.record
            .usage_count
            .cmp(&a.record.usage_count)
            .then_with(|| a.record.name.cmp(&b.record.name))
    });
}

/// The shape library file and the operations on it. Every mutation is written
/// straight back to disk.
#[derive(Debug)]
pub struct ShapeLibrary {
    path: PathBuf,
    data: LibraryFile,
    thumbnail_size: u32,
}

impl ShapeLibrary {
    /// Open the library at `path`, creating it if missing. Records from older
    /// versions are upgraded and the file rewritten once.
    pub fn open(path: impl Into<PathBuf>, thumbnail_size: u32) -> LibraryResult<Self> {
        let path = path.into();
        let mut library = Self {
            path,
            data: LibraryFile::default(),
            thumbnail_size,
        };
        if !library.path.exists() {
            library.save()?;
            log::info!("Created shape library at {}", library.path.display());
            return Ok(library);
        }

        let text = fs::read_to_string(&library.path)?;
        let mut raw: Value = serde_json::from_str(&text)?;
        let migrated = migrate(&mut raw);
        library.data = serde_json::from_value(raw)?;
        library
            .data
            .categories
            .entry(GENERAL_CATEGORY.to_string())
            .or_insert_with(|| CategoryRecord::new(GENERAL_CATEGORY, "General shapes"));
        if migrated {
            library.save()?;
            log::info!("Upgraded shape library {}", library.path.display());
        }
        Ok(library)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn data(&self) -> &LibraryFile {
        &self.data
    }

    pub fn save(&self) -> LibraryResult<()> {
        let json = serde_json::to_string_pretty(&self.data)?;
        write_atomic(&self.path, json.as_bytes())?;
        Ok(())
    }

    pub fn categories(&self) -> Vec<&CategoryRecord> {
        self.data.categories.values().collect()
    }

    pub fn add_category(&mut self, name: &str, description: &str) -> LibraryResult<()> {
        if self.data.categories.contains_key(name) {
            return Err(LibraryError::DuplicateCategory(name.to_string()));
        }
        self.data
            .categories
            .insert(name.to_string(), CategoryRecord::new(name, description));
        self.save()
    }

    /// Removes the category and every shape in it.
    pub fn remove_category(&mut self, name: &str) -> LibraryResult<()> {
        if name == GENERAL_CATEGORY {
            return Err(LibraryError::ReservedCategory(name.to_string()));
        }
        if self.data.categories.remove(name).is_none() {
            return Err(LibraryError::UnknownCategory(name.to_string()));
        }
        self.save()
    }

    /// Store `strokes` under `category`. Returns the new shape id.
    pub fn add_shape(
        &mut self,
        category: &str,
        name: &str,
        description: &str,
        strokes: &[&Stroke],
        thumbnail: Option<String>,
    ) -> LibraryResult<String> {
        let shapes = &mut self
            .data
            .categories
            .get_mut(category)
            .ok_or_else(|| LibraryError::UnknownCategory(category.to_string()))?
            .shapes;

        let base_id = format!("{category}_{name}_{}", time::utc_stamp());
        let mut id = base_id.clone();
        let mut n = 1;
        while shapes.contains_key(&id) {
            n += 1;
            id = format!("{base_id}_{n}");
        }

        shapes.insert(
            id.clone(),
            ShapeRecord {
                name: name.to_string(),
                description: description.to_string(),
                strokes: strokes.iter().map(|s| s.to_dict()).collect(),
                created: time::iso_now(),
                thumbnail,
                favorite: false,
                usage_count: 0,
            },
        );
        self.save()?;
        log::info!("Added shape '{name}' to {category} as {id}");
        Ok(id)
    }

    /// Store the selected canvas strokes with a thumbnail of them. A thumbnail
    /// that can't be captured is left out; the shape is saved anyway.
    pub fn add_shape_from_canvas(
        &mut self,
        category: &str,
        name: &str,
        description: &str,
        canvas: &dyn CanvasSource,
        selection: &[usize],
    ) -> LibraryResult<String> {
        let strokes: Vec<&Stroke> = selection.iter().filter_map(|&i| canvas.stroke(i)).collect();
        let thumbnail = capture_thumbnail(canvas, selection, self.thumbnail_size);
        self.add_shape(category, name, description, &strokes, thumbnail)
    }

    fn find(&self, id: &str) -> Option<ShapeEntry<'_>> {
        self.data.categories.iter().find_map(|(category, record)| {
            record.shapes.get_key_value(id).map(|(id, record)| ShapeEntry {
                category,
                id,
                record,
            })
        })
    }

    fn find_mut(&mut self, id: &str) -> LibraryResult<&mut ShapeRecord> {
        self.data
            .categories
            .values_mut()
            .find_map(|category| category.shapes.get_mut(id))
            .ok_or_else(|| LibraryError::UnknownShape(id.to_string()))
    }

    pub fn shape(&self, id: &str) -> Option<ShapeEntry<'_>> {
        self.find(id)
    }

    pub fn remove_shape(&mut self, id: &str) -> LibraryResult<ShapeRecord> {
        let removed = self
            .data
            .categories
            .values_mut()
            .find_map(|category| category.shapes.remove(id))
            .ok_or_else(|| LibraryError::UnknownShape(id.to_string()))?;
        self.save()?;
        Ok(removed)
    }

    /// The shape's strokes, deserialised fresh on every call.
    pub fn get_shape(&self, id: &str) -> LibraryResult<Vec<Stroke>> {
        let entry = self
            .find(id)
            .ok_or_else(|| LibraryError::UnknownShape(id.to_string()))?;
        Ok(entry
            .record
            .strokes
            .iter()
            .map(Stroke::from_dict)
            .collect::<Result<Vec<_>, _>>()?)
    }

    pub fn shapes_in(&self, category: &str) -> LibraryResult<Vec<ShapeEntry<'_>>> {
        let (name, record) = self
            .data
            .categories
            .get_key_value(category)
            .ok_or_else(|| LibraryError::UnknownCategory(category.to_string()))?;
        let mut entries: Vec<_> = record
            .shapes
            .iter()
            .map(|(id, record)| ShapeEntry {
                category: name,
                id,
                record,
            })
            .collect();
        by_usage(&mut entries);
        Ok(entries)
    }

    fn all_shapes(&self) -> impl Iterator<Item = ShapeEntry<'_>> {
        self.data.categories.iter().flat_map(|(category, record)| {
            record.shapes.iter().map(move |(id, record)| ShapeEntry {
                category,
                id,
                record,
            })
        })
    }

    /// Case-insensitive substring match over name and description.
    pub fn search(&self, query: &str) -> Vec<ShapeEntry<'_>> {
        let needle = query.to_lowercase();
        let mut hits: Vec<_> = self
            .all_shapes()
            .filter(|entry| {
                entry.record.name.to_lowercase().contains(&needle)
                    || entry.record.description.to_lowercase().contains(&needle)
            })
            .collect();
        by_usage(&mut hits);
        hits
    }

    /// Returns the new favourite state.
    pub fn toggle_favorite(&mut self, id: &str) -> LibraryResult<bool> {
        let record = self.find_mut(id)?;
        record.favorite = !record.favorite;
        let favorite = record.favorite;
        self.save()?;
        Ok(favorite)
    }

    pub fn favorites(&self) -> Vec<ShapeEntry<'_>> {
        let mut favorites: Vec<_> = self.all_shapes().filter(|e| e.record.favorite).collect();
        by_usage(&mut favorites);
        favorites
    }

    /// Materialise a shape, counting the use.
    pub fn use_shape(&mut self, id: &str) -> LibraryResult<Vec<Stroke>> {
        let strokes = self.get_shape(id)?;
        self.find_mut(id)?.usage_count += 1;
        self.save()?;
        Ok(strokes)
    }

    /// Materialise a shape centred on `drop_point`.
    pub fn place_shape(&mut self, id: &str, drop_point: Pos2) -> LibraryResult<Vec<Stroke>> {
        let mut strokes = self.use_shape(id)?;
        let bounds = geometry::union_all(strokes.iter().map(StrokeShape::bounds));
        if bounds.is_positive() {
            let delta: Vec2 = drop_point - bounds.center();
            for stroke in &mut strokes {
                stroke.translate(delta);
            }
        }
        Ok(strokes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stroke::{LineStroke, StrokeAttrs};
    use serde_json::json;

    fn line() -> Stroke {
        LineStroke::new(Pos2::new(0.0, 0.0), Pos2::new(10.0, 0.0), StrokeAttrs::default()).into()
    }

    fn open(dir: &Path) -> ShapeLibrary {
        ShapeLibrary::open(dir.join("library.json"), 64).unwrap()
    }

    #[test]
    fn test_new_library_has_general() {
        let dir = tempfile::tempdir().unwrap();
        let lib = open(dir.path());
        assert!(lib.path().exists());
        assert_eq!(lib.categories().len(), 1);
        assert!(matches!(
            open(dir.path()).remove_category(GENERAL_CATEGORY),
            Err(LibraryError::ReservedCategory(_))
        ));
    }

    #[test]
    fn test_category_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut lib = open(dir.path());
        lib.add_category("Arrows", "").unwrap();
        assert!(matches!(lib.add_category("Arrows", ""), Err(LibraryError::DuplicateCategory(_))));
        assert!(matches!(lib.remove_category("Nope"), Err(LibraryError::UnknownCategory(_))));
        assert!(matches!(
            lib.add_shape("Nope", "x", "", &[], None),
            Err(LibraryError::UnknownCategory(_))
        ));
        lib.remove_category("Arrows").unwrap();
    }

    #[test]
    fn test_shape_id_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let mut lib = open(dir.path());
        let stroke = line();
        let id = lib.add_shape(GENERAL_CATEGORY, "Bar", "a flat bar", &[&stroke], None).unwrap();
        assert!(id.starts_with("General_Bar_"));
        assert_eq!(lib.get_shape(&id).unwrap(), vec![stroke]);
        assert_eq!(lib.search("FLAT").len(), 1);
        assert!(lib.search("round").is_empty());
        lib.remove_shape(&id).unwrap();
        assert!(matches!(lib.get_shape(&id), Err(LibraryError::UnknownShape(_))));
    }

    #[test]
    fn test_same_name_twice_gets_distinct_ids() {
        let dir = tempfile::tempdir().unwrap();
        let mut lib = open(dir.path());
        let a = lib.add_shape(GENERAL_CATEGORY, "Bar", "", &[], None).unwrap();
        let b = lib.add_shape(GENERAL_CATEGORY, "Bar", "", &[], None).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_favorites_sorted_by_usage() {
        let dir = tempfile::tempdir().unwrap();
        let mut lib = open(dir.path());
        let stroke = line();
        let a = lib.add_shape(GENERAL_CATEGORY, "A", "", &[&stroke], None).unwrap();
        let b = lib.add_shape(GENERAL_CATEGORY, "B", "", &[&stroke], None).unwrap();
        assert!(lib.toggle_favorite(&a).unwrap());
        assert!(lib.toggle_favorite(&b).unwrap());
        lib.use_shape(&b).unwrap();
        let favorites: Vec<_> = lib.favorites().iter().map(|e| e.id.to_string()).collect();
        assert_eq!(favorites, vec![b.clone(), a.clone()]);
        assert!(!lib.toggle_favorite(&a).unwrap());
        assert_eq!(lib.favorites().len(), 1);
    }

    #[test]
    fn test_place_shape_centres_on_drop_point() {
        let dir = tempfile::tempdir().unwrap();
        let mut lib = open(dir.path());
        let stroke = line();
        let id = lib.add_shape(GENERAL_CATEGORY, "L", "", &[&stroke], None).unwrap();
        let placed = lib.place_shape(&id, Pos2::new(100.0, 100.0)).unwrap();
        let center = placed[0].bounds().center();
        assert!((center.x - 100.0).abs() < 1e-3 && (center.y - 100.0).abs() < 1e-3);
        assert_eq!(lib.shape(&id).unwrap().record.usage_count, 1);
    }

    #[test]
    fn test_migrate_fills_missing_fields() {
        let mut raw = json!({
            "version": "1.0",
            "categories": {"General": {"name": "General", "description": "", "shapes": {
                "s": {"name": "s", "description": "", "strokes": [], "created": ""}
            }}}
        });
        assert!(migrate(&mut raw));
        assert_eq!(raw["categories"]["General"]["shapes"]["s"]["usage_count"], 0);
        assert!(!migrate(&mut raw));
    }
}
