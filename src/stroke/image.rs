use std::cell::RefCell;
use std::path::{Path as FsPath, PathBuf};

use egui::{Color32, Pos2, Rect, Vec2};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{points, StrokeAttrs, StrokeError, StrokeKind, StrokeResult, StrokeShape};
use crate::effects::{self, FilterKind, ShadowParams, ShadowQuality};
use crate::geometry;
use crate::image_cache::{self, ImageCache, ImageSlot, Subscription};
use crate::pixmap::Pixmap;
use crate::render::{FontSpec, LineStyle, Painter, Path, Pen};

/// Size used when the image's dimensions can't be read.
const FALLBACK_EXTENT: f32 = 100.0;
/// Longest side, in pixels, of the rasters built for rendering.
const MAX_RENDER_EXTENT: f32 = 4096.0;

/// Visual effects of an image stroke, stored flat in the stroke record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageEffects {
    pub has_border: bool,
    #[serde(with = "crate::util::color")]
    pub border_color: Color32,
    pub border_width: f32,
    pub border_style: LineStyle,

    pub has_shadow: bool,
    #[serde(with = "crate::util::color")]
    pub shadow_color: Color32,
    pub shadow_blur: f32,
    pub shadow_offset_x: f32,
    pub shadow_offset_y: f32,
    pub shadow_size: f32,
    pub inner_shadow: bool,
    pub shadow_quality: ShadowQuality,
    pub shadow_opacity: f32,

    pub filter_type: FilterKind,
    pub filter_intensity: f32,

    pub transparency: f32,
    pub blur_radius: f32,
    pub corner_radius: f32,
}

impl Default for ImageEffects {
    fn default() -> Self {
        Self {
            has_border: false,
            border_color: Color32::BLACK,
            border_width: 2.0,
            border_style: LineStyle::Solid,
            has_shadow: false,
            shadow_color: Color32::BLACK,
            shadow_blur: 5.0,
            shadow_offset_x: 5.0,
            shadow_offset_y: 5.0,
            shadow_size: 0.0,
            inner_shadow: false,
            shadow_quality: ShadowQuality::Medium,
            shadow_opacity: 0.5,
            filter_type: FilterKind::None,
            filter_intensity: 1.0,
            transparency: 1.0,
            blur_radius: 0.0,
            corner_radius: 0.0,
        }
    }
}

impl ImageEffects {
    pub fn shadow_params(&self) -> ShadowParams {
        ShadowParams {
            color: self.shadow_color,
            blur: self.shadow_blur,
            offset_x: self.shadow_offset_x,
            offset_y: self.shadow_offset_y,
            size: self.shadow_size,
            quality: self.shadow_quality,
            opacity: self.shadow_opacity,
        }
    }

    pub fn border_pen(&self) -> Pen {
        Pen::new(self.border_color, self.border_width, self.border_style)
    }

    fn has_outer_shadow(&self) -> bool {
        self.has_shadow && !self.inner_shadow
    }

    fn has_inner_shadow(&self) -> bool {
        self.has_shadow && self.inner_shadow
    }
}

/// Effected pixmaps for one (source, size, effects) combination.
#[derive(Clone)]
struct RenderLayers {
    source: Pixmap,
    size: (u32, u32),
    effects: ImageEffects,
    body: Pixmap,
    outer: Option<(Pixmap, Vec2)>,
    inner: Option<Pixmap>,
}

impl RenderLayers {
    fn build(source: &Pixmap, size: (u32, u32), fx: &ImageEffects) -> Self {
        let scaled = source.scaled(size.0, size.1);
        let body = effects::effect_chain(
            &scaled,
            fx.blur_radius,
            fx.filter_type,
            fx.filter_intensity,
            fx.corner_radius,
        );
        let params = fx.shadow_params();
        let outer = fx.has_outer_shadow().then(|| {
            let shadow = effects::outer_shadow(&scaled, &params, fx.corner_radius);
            (Pixmap::new(shadow.image), shadow.offset)
        });
        let inner = fx
            .has_inner_shadow()
            .then(|| Pixmap::new(effects::inner_shadow(&scaled, &params, fx.corner_radius)));
        Self {
            source: source.clone(),
            size,
            effects: fx.clone(),
            body: Pixmap::new(body),
            outer,
            inner,
        }
    }

    fn matches(&self, source: &Pixmap, size: (u32, u32), fx: &ImageEffects) -> bool {
        self.source.ptr_eq(source) && self.size == size && self.effects == *fx
    }
}

struct PendingLoad {
    slot: ImageSlot,
    subscription: Option<Subscription>,
}

/// Pixels and load state. Not part of the stroke's value.
#[derive(Default)]
struct ImageRuntime {
    original: Option<Pixmap>,
    load_error: Option<String>,
    pending: Option<PendingLoad>,
    render_cache: RefCell<Option<RenderLayers>>,
}

impl Clone for ImageRuntime {
    fn clone(&self) -> Self {
        let pending = self.pending.as_ref().map(|pending| {
            let slot = ImageSlot::default();
            if let Some(outcome) = pending.slot.lock().as_ref() {
                *slot.lock() = Some(outcome.clone());
            }
            let subscription = pending
                .subscription
                .as_ref()
                .and_then(|sub| sub.resubscribe(&slot));
            PendingLoad { slot, subscription }
        });
        Self {
            original: self.original.clone(),
            load_error: self.load_error.clone(),
            pending,
            render_cache: self.render_cache.clone(),
        }
    }
}

impl PartialEq for ImageRuntime {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl std::fmt::Debug for ImageRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageRuntime")
            .field("original", &self.original)
            .field("load_error", &self.load_error)
            .field("pending", &self.pending.is_some())
            .finish()
    }
}

/// A raster image placed on the canvas.
///
/// The decoded original is never modified; what gets drawn is a scaled and
/// effected copy that is rebuilt only when the size or effects change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageStroke {
    pub image_path: PathBuf,
    #[serde(default)]
    pub file_hash: Option<String>,
    #[serde(with = "points::object")]
    pub position: Pos2,
    #[serde(with = "points::size")]
    pub size: Vec2,
    #[serde(default)]
    pub rotation: f32,
    #[serde(default = "full_opacity")]
    pub opacity: f32,
    #[serde(flatten)]
    pub effects: ImageEffects,
    #[serde(flatten)]
    pub attrs: StrokeAttrs,
    #[serde(skip)]
    runtime: ImageRuntime,
}

fn full_opacity() -> f32 {
    1.0
}

fn missing_label(path: &FsPath) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    format!("Missing: {name}")
}

fn initial_size(path: &FsPath, max_extent: f32) -> Vec2 {
    match image::image_dimensions(path) {
        Ok((w, h)) => geometry::fit_within(Vec2::new(w as f32, h as f32), max_extent),
        Err(_) => Vec2::splat(FALLBACK_EXTENT.min(max_extent)),
    }
}

impl ImageStroke {
    /// A stroke with no pixels yet. Call [`Self::attach`] to load them.
    pub fn new(image_path: impl Into<PathBuf>, position: Pos2, size: Vec2) -> Self {
        Self {
            image_path: image_path.into(),
            file_hash: None,
            position,
            size,
            rotation: 0.0,
            opacity: 1.0,
            effects: ImageEffects::default(),
            attrs: StrokeAttrs::default(),
            runtime: ImageRuntime::default(),
        }
    }

    /// Already decoded pixels, drawn at their natural size.
    pub fn from_pixmap(pixmap: Pixmap, position: Pos2) -> Self {
        let mut stroke = Self::new(PathBuf::new(), position, pixmap.size());
        stroke.runtime.original = Some(pixmap);
        stroke
    }

    /// Decode `path` synchronously. Undecodable files give a labelled placeholder.
    pub fn load(path: impl Into<PathBuf>, position: Pos2, max_extent: f32) -> Self {
        let path = path.into();
        let mut stroke = Self::new(path, position, Vec2::ZERO);
        stroke.load_now();
        stroke.size = match &stroke.runtime.original {
            Some(pixmap) => geometry::fit_within(pixmap.size(), max_extent),
            None => Vec2::splat(FALLBACK_EXTENT.min(max_extent)),
        };
        stroke
    }

    /// Hand decoding to `cache`. A placeholder is drawn until the pixels arrive.
    pub fn with_cache(path: impl Into<PathBuf>, position: Pos2, cache: &ImageCache, max_extent: f32) -> Self {
        let path = path.into();
        let size = initial_size(&path, max_extent);
        let mut stroke = Self::new(path, position, size);
        stroke.attach(Some(cache));
        stroke
    }

    /// Start loading pixels for a stroke built from a record. Without a cache
    /// the file is decoded on the spot.
    pub fn attach(&mut self, cache: Option<&ImageCache>) {
        if self.runtime.original.is_some() || self.runtime.pending.is_some() {
            return;
        }
        let Some(cache) = cache else {
            self.load_now();
            return;
        };
        let queued = match self.file_hash.clone() {
            Some(hash) if !self.image_path.exists() => cache
                .cache_known(&hash, &self.image_path, None)
                .map(|_| hash),
            _ => cache.cache_image(&self.image_path, None),
        };
        match queued {
            Ok(hash) => {
                let slot = ImageSlot::default();
                let subscription = cache.subscribe(&hash, &slot);
                self.file_hash = Some(hash);
                self.runtime.load_error = None;
                self.runtime.pending = Some(PendingLoad { slot, subscription });
                self.refresh();
            }
            Err(err) => {
                log::warn!("Image {} unavailable: {err}", self.image_path.display());
                self.runtime.load_error = Some(missing_label(&self.image_path));
            }
        }
    }

    fn load_now(&mut self) {
        let path = self.image_path.clone();
        let loaded = image_cache::file_hash(&path)
            .and_then(|hash| image_cache::decode_image(&path).map(|pixmap| (hash, pixmap)));
        match loaded {
            Ok((hash, pixmap)) => {
                self.file_hash = Some(hash);
                self.runtime.original = Some(pixmap);
                self.runtime.load_error = None;
            }
            Err(err) => {
                log::warn!("Using placeholder for {}: {err}", path.display());
                self.runtime.load_error = Some(missing_label(&path));
            }
        }
    }

    /// Take a delivered load result, if any. Returns true when the stroke changed.
    pub fn refresh(&mut self) -> bool {
        let outcome = match &self.runtime.pending {
            Some(pending) => pending.slot.lock().take(),
            None => return false,
        };
        let Some(outcome) = outcome else {
            return false;
        };
        self.runtime.pending = None;
        match outcome {
            Ok(pixmap) => self.runtime.original = Some(pixmap),
            Err(message) => {
                log::warn!("Using placeholder for {}: {message}", self.image_path.display());
                self.runtime.load_error = Some(missing_label(&self.image_path));
            }
        }
        self.runtime.render_cache.take();
        true
    }

    /// Decoded pixels, including a delivered but not yet refreshed load.
    pub fn original(&self) -> Option<Pixmap> {
        if let Some(pixmap) = &self.runtime.original {
            return Some(pixmap.clone());
        }
        let pending = self.runtime.pending.as_ref()?;
        let slot = pending.slot.lock();
        slot.as_ref().and_then(|outcome| outcome.as_ref().ok().cloned())
    }

    pub fn is_loaded(&self) -> bool {
        self.original().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.runtime.pending.is_some()
    }

    pub fn load_error(&self) -> Option<&str> {
        self.runtime.load_error.as_deref()
    }

    pub fn rect(&self) -> Rect {
        Rect::from_min_size(self.position, self.size)
    }

    fn full_pixel_size(&self) -> Vec2 {
        Vec2::new(
            self.size.x.abs().round().max(1.0),
            self.size.y.abs().round().max(1.0),
        )
    }

    /// Raster size for rendering, shrunk to fit `MAX_RENDER_EXTENT`.
    fn pixel_size(&self) -> (u32, u32) {
        let full = self.full_pixel_size();
        let fit = (MAX_RENDER_EXTENT / full.max_elem()).min(1.0);
        (
            (full.x * fit).round().max(1.0) as u32,
            (full.y * fit).round().max(1.0) as u32,
        )
    }

    /// Map a rect in raster pixels onto the stroke's own coordinates.
    fn raster_to_target(&self, rect: Rect, pixels: (u32, u32)) -> Rect {
        let full = self.full_pixel_size();
        if full == Vec2::new(pixels.0 as f32, pixels.1 as f32) {
            return rect;
        }
        let ratio = Vec2::new(
            self.size.x.abs() / pixels.0 as f32,
            self.size.y.abs() / pixels.1 as f32,
        );
        Rect::from_min_size((rect.min.to_vec2() * ratio).to_pos2(), rect.size() * ratio)
    }

    fn border_padding(&self) -> f32 {
        if self.effects.has_border {
            self.effects.border_width / 2.0
        } else {
            0.0
        }
    }

    /// Outline of what is visible: the target rect, rounded when configured.
    fn visible_shape(&self, target: Rect) -> Path {
        if self.effects.corner_radius > 0.0 {
            Path::rounded_rect(target, self.effects.corner_radius)
        } else {
            Path::rect(target)
        }
    }

    fn render_layers(&self, source: &Pixmap) -> RenderLayers {
        let size = self.pixel_size();
        if let Some(cached) = self.runtime.render_cache.borrow().as_ref() {
            if cached.matches(source, size, &self.effects) {
                return cached.clone();
            }
        }
        let layers = RenderLayers::build(source, size, &self.effects);
        self.runtime.render_cache.replace(Some(layers.clone()));
        layers
    }

    pub fn to_dict(&self) -> Value {
        let mut map = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                log::error!("failed to serialise image stroke {}", self.image_path.display());
                serde_json::Map::new()
            }
        };
        map.insert("type".into(), Value::from(StrokeKind::Image.as_str()));
        map.insert("stroke_type".into(), Value::from("image"));
        Value::Object(map)
    }

    pub(crate) fn from_dict(value: &Value) -> StrokeResult<Self> {
        serde_json::from_value(value.clone()).map_err(|source| StrokeError::Invalid {
            kind: StrokeKind::Image.as_str(),
            source,
        })
    }
}

impl StrokeShape for ImageStroke {
    fn kind(&self) -> StrokeKind {
        StrokeKind::Image
    }

    fn attrs(&self) -> &StrokeAttrs {
        &self.attrs
    }

    fn attrs_mut(&mut self) -> &mut StrokeAttrs {
        &mut self.attrs
    }

    fn bounds(&self) -> Rect {
        let rect = self.rect();
        let pad = self.border_padding();
        if self.rotation == 0.0 {
            return rect.expand(pad);
        }
        let center = rect.center();
        let corners = [rect.left_top(), rect.right_top(), rect.right_bottom(), rect.left_bottom()]
            .map(|c| geometry::rotate_around(c, center, self.rotation));
        geometry::calculate_bounds(&corners, pad)
    }

    fn contains(&self, pos: Pos2) -> bool {
        let rect = self.rect();
        let local = geometry::rotate_around(pos, rect.center(), -self.rotation);
        rect.expand(self.border_padding()).contains(local)
    }

    fn render(&self, painter: &mut dyn Painter) {
        painter.save();
        painter.set_opacity(painter.opacity() * self.opacity * self.effects.transparency);
        painter.translate(self.position.to_vec2());
        if self.rotation != 0.0 {
            let center = self.size / 2.0;
            painter.translate(center);
            painter.rotate(self.rotation);
            painter.translate(-center);
        }
        let target = Rect::from_min_size(Pos2::ZERO, self.size);

        match self.original() {
            Some(source) => {
                let layers = self.render_layers(&source);
                if let Some((shadow, offset)) = &layers.outer {
                    let raster = Rect::from_min_size(offset.to_pos2(), shadow.size());
                    painter.draw_pixmap(self.raster_to_target(raster, layers.size), shadow);
                }
                painter.draw_pixmap(target, &layers.body);
                if let Some(inner) = &layers.inner {
                    painter.save();
                    painter.set_clip_path(&self.visible_shape(target));
                    painter.draw_pixmap(target, inner);
                    painter.restore();
                }
            }
            None => {
                let (w, h) = self.pixel_size();
                painter.draw_pixmap(target, &Pixmap::placeholder(w, h));
                let label = self.runtime.load_error.as_deref().unwrap_or("Loading...");
                let font = FontSpec {
                    size: 10.0,
                    ..FontSpec::default()
                };
                painter.draw_text(Pos2::new(4.0, 4.0), label, &font, Color32::DARK_GRAY);
            }
        }

        if self.effects.has_border {
            painter.draw_rect(target, Some(&self.effects.border_pen()), None);
        }
        painter.restore();
    }

    fn translate(&mut self, delta: Vec2) {
        self.position += delta;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{DrawOp, RasterPainter, RecordingPainter};
    use image::{Rgba, RgbaImage};

    fn gradient(w: u32, h: u32) -> Pixmap {
        Pixmap::new(RgbaImage::from_fn(w, h, |x, y| {
            Rgba([(x * 20) as u8, (y * 20) as u8, 128, 255])
        }))
    }

    fn pixmap_targets(painter: &RecordingPainter) -> Vec<Rect> {
        painter
            .ops()
            .iter()
            .filter_map(|op| match op {
                DrawOp::Pixmap { target, .. } => Some(*target),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_degenerate_shadow_is_nudged_down() {
        let mut stroke = ImageStroke::from_pixmap(gradient(10, 10), Pos2::new(5.0, 5.0));
        stroke.effects.has_shadow = true;
        stroke.effects.shadow_offset_x = 0.0;
        stroke.effects.shadow_offset_y = 0.0;
        stroke.effects.shadow_blur = 0.0;
        let mut painter = RecordingPainter::new();
        stroke.render(&mut painter);
        let targets = pixmap_targets(&painter);
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].min, Pos2::new(0.0, 2.0));
        assert_eq!(targets[1].min, Pos2::ZERO);
    }

    #[test]
    fn test_render_order_with_all_effects() {
        let mut stroke = ImageStroke::from_pixmap(gradient(10, 10), Pos2::ZERO);
        stroke.effects.has_shadow = true;
        stroke.effects.inner_shadow = true;
        stroke.effects.has_border = true;
        stroke.rotation = 30.0;
        let mut painter = RecordingPainter::new();
        stroke.render(&mut painter);
        let ops = painter.ops();
        assert_eq!(ops.first(), Some(&DrawOp::Save));
        assert!(matches!(ops[1], DrawOp::SetOpacity(_)));
        assert!(ops.iter().any(|op| matches!(op, DrawOp::Rotate(r) if *r == 30.0)));
        let clip = ops.iter().position(|op| matches!(op, DrawOp::Clip(_))).unwrap();
        let border = ops.iter().position(|op| matches!(op, DrawOp::Rect { .. })).unwrap();
        assert!(clip < border);
        assert_eq!(ops.last(), Some(&DrawOp::Restore));
    }

    #[test]
    fn test_no_effects_draws_scaled_source() {
        let source = gradient(8, 8);
        let mut stroke = ImageStroke::from_pixmap(source.clone(), Pos2::new(2.0, 3.0));
        stroke.size = Vec2::new(8.0, 8.0);
        let mut painter = RasterPainter::new(16, 16).unwrap();
        stroke.render(&mut painter);
        for y in 0..8 {
            for x in 0..8 {
                assert_eq!(painter.pixel(x + 2, y + 3), source.image().get_pixel(x, y).0);
            }
        }
    }

    #[test]
    fn test_opacity_and_transparency_multiply() {
        let mut stroke = ImageStroke::from_pixmap(gradient(4, 4), Pos2::ZERO);
        stroke.opacity = 0.5;
        stroke.effects.transparency = 0.5;
        let mut painter = RecordingPainter::new();
        painter.set_opacity(0.8);
        stroke.render(&mut painter);
        let drawn = painter.ops().iter().find_map(|op| match op {
            DrawOp::Pixmap { opacity, .. } => Some(*opacity),
            _ => None,
        });
        assert!((drawn.unwrap() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_huge_size_renders_from_bounded_raster() {
        let mut stroke = ImageStroke::from_pixmap(gradient(10, 10), Pos2::ZERO);
        stroke.size = Vec2::new(1.0e6, 1.0e3);
        let mut painter = RecordingPainter::new();
        stroke.render(&mut painter);
        let (target, size) = painter
            .ops()
            .iter()
            .find_map(|op| match op {
                DrawOp::Pixmap { target, size, .. } => Some((*target, *size)),
                _ => None,
            })
            .unwrap();
        assert_eq!(target.size(), Vec2::new(1.0e6, 1.0e3));
        assert_eq!(size, Vec2::new(4096.0, 4.0));

        stroke.size = Vec2::new(f32::INFINITY, 10.0);
        let mut painter = RecordingPainter::new();
        stroke.render(&mut painter);
        assert!(painter
            .ops()
            .iter()
            .all(|op| !matches!(op, DrawOp::Pixmap { size, .. } if size.max_elem() > 4096.0)));
    }

    #[test]
    fn test_missing_file_uses_labelled_placeholder() {
        let stroke = ImageStroke::load("/definitely/not/here.png", Pos2::ZERO, 250.0);
        assert!(!stroke.is_loaded());
        assert_eq!(stroke.load_error(), Some("Missing: here.png"));
        let mut painter = RecordingPainter::new();
        stroke.render(&mut painter);
        assert!(painter
            .ops()
            .iter()
            .any(|op| matches!(op, DrawOp::Text { text, .. } if text == "Missing: here.png")));
    }

    #[test]
    fn test_load_fits_within_max_extent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.png");
        RgbaImage::new(500, 100).save(&path).unwrap();
        let stroke = ImageStroke::load(&path, Pos2::ZERO, 250.0);
        assert_eq!(stroke.size, Vec2::new(250.0, 50.0));
        assert_eq!(stroke.original().unwrap().width(), 500);
        assert!(stroke.file_hash.is_some());
    }

    #[test]
    fn test_record_has_image_discriminator() {
        let mut stroke = ImageStroke::new("a.png", Pos2::new(1.0, 2.0), Vec2::new(3.0, 4.0));
        stroke.effects.filter_type = FilterKind::Sepia;
        let dict = stroke.to_dict();
        assert_eq!(dict["stroke_type"], "image");
        assert_eq!(dict["position"], serde_json::json!({"x": 1.0, "y": 2.0}));
        assert_eq!(dict["size"], serde_json::json!({"width": 3.0, "height": 4.0}));
        assert_eq!(dict["filter_type"], "sepia");
        assert_eq!(ImageStroke::from_dict(&dict).unwrap(), stroke);
    }

    #[test]
    fn test_rotated_bounds_grow() {
        let mut stroke = ImageStroke::new("a.png", Pos2::ZERO, Vec2::new(10.0, 10.0));
        stroke.rotation = 45.0;
        let b = stroke.bounds();
        assert!(b.width() > 14.0 && b.width() < 14.2);
        assert!(stroke.contains(Pos2::new(5.0, -1.5)));
    }
}
