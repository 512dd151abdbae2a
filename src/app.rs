use std::path::PathBuf;
use std::time::Duration;

use egui::{Color32, Pos2, Rect, TextureHandle, TextureOptions, Vec2};

use crate::config::AppConfig;
use crate::document::Document;
use crate::image_cache::ImageCache;
use crate::library::{CanvasSnapshot, ShapeLibrary, GENERAL_CATEGORY};
use crate::panels;
use crate::render::RasterPainter;
use crate::session::{Recovery, Session, SessionManager, WindowSize};
use crate::stroke::{
    CircleStroke, FreehandStroke, ImageStroke, LineStroke, RectangleStroke, Stroke, StrokeAttrs,
};

/// Drawing tools offered in the side panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Freehand,
    Line,
    Rectangle,
    Circle,
}

impl ToolKind {
    pub const ALL: [ToolKind; 4] = [
        ToolKind::Freehand,
        ToolKind::Line,
        ToolKind::Rectangle,
        ToolKind::Circle,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::Freehand => "Freehand",
            ToolKind::Line => "Line",
            ToolKind::Rectangle => "Rectangle",
            ToolKind::Circle => "Circle",
        }
    }
}

/// Stroke being dragged out on the canvas, in document coordinates.
#[derive(Debug, Default)]
pub(crate) struct Gesture {
    pub points: Vec<Pos2>,
}

/// The rendered canvas, re-uploaded only when the document changed or the
/// canvas was resized.
#[derive(Default)]
struct CanvasTexture {
    handle: Option<TextureHandle>,
    size: [usize; 2],
    dirty: bool,
}

pub struct SketchApp {
    config: AppConfig,
    session: Session,
    sessions: SessionManager,
    cache: Option<ImageCache>,
    library: Option<ShapeLibrary>,
    status: String,
    canvas: CanvasTexture,
    tool: ToolKind,
    pen: StrokeAttrs,
    pub(crate) gesture: Option<Gesture>,
    pub(crate) shape_name: String,
}

impl SketchApp {
    /// Called once before the first frame.
    pub fn new(_cc: &eframe::CreationContext<'_>, config: AppConfig) -> Self {
        let sessions = SessionManager::new(&config);
        let (session, status) = match sessions.recover_auto_save() {
            Recovery::Loaded(session) => (session, "Restored the last session".to_string()),
            Recovery::Corrupt { warning, .. } => (Session::new(), warning),
            Recovery::None => (Session::new(), String::new()),
        };

        let cache = ImageCache::new(&config.cache_dir)
            .map_err(|err| log::warn!("Image cache unavailable: {err}"))
            .ok();
        let library = ShapeLibrary::open(&config.library_path, config.thumbnail_size)
            .map_err(|err| log::warn!("Shape library unavailable: {err}"))
            .ok();

        let mut app = Self {
            config,
            session,
            sessions,
            cache,
            library,
            status,
            canvas: CanvasTexture {
                dirty: true,
                ..Default::default()
            },
            tool: ToolKind::Freehand,
            pen: StrokeAttrs::default(),
            gesture: None,
            shape_name: String::new(),
        };
        for index in 0..app.session.tabs().len() {
            if let Some(tab) = app.session.tab_mut(index) {
                tab.document.attach_images(app.cache.as_ref());
            }
        }
        app
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        self.canvas.dirty = true;
        &mut self.session
    }

    pub fn document(&self) -> &Document {
        self.session.active_document()
    }

    pub fn document_mut(&mut self) -> &mut Document {
        self.canvas.dirty = true;
        self.session.active_document_mut()
    }

    pub fn library(&self) -> Option<&ShapeLibrary> {
        self.library.as_ref()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    pub fn tool(&self) -> ToolKind {
        self.tool
    }

    pub fn set_tool(&mut self, tool: ToolKind) {
        log::debug!("Tool selected: {}", tool.name());
        self.tool = tool;
    }

    pub fn pen_mut(&mut self) -> &mut StrokeAttrs {
        &mut self.pen
    }

    /// Build a stroke from a finished drag and add it to the active layer.
    pub fn finish_gesture(&mut self) {
        let Some(gesture) = self.gesture.take() else {
            return;
        };
        let Some(stroke) = stroke_from_gesture(self.tool, &gesture.points, &self.pen) else {
            return;
        };
        if !self.document_mut().layers_mut().add_stroke_to_active(stroke) {
            self.set_status("The active layer is locked");
        }
    }

    /// Place dropped image files at `pos`.
    fn insert_images(&mut self, paths: Vec<PathBuf>, pos: Pos2) {
        let extent = self.config.max_image_extent;
        for (i, path) in paths.into_iter().enumerate() {
            let at = pos + Vec2::splat(20.0 * i as f32);
            let stroke = match &self.cache {
                Some(cache) => ImageStroke::with_cache(path, at, cache, extent),
                None => ImageStroke::load(path, at, extent),
            };
            if !self.document_mut().layers_mut().add_stroke_to_active(stroke.into()) {
                self.set_status("The active layer is locked");
            }
        }
    }

    /// Store the topmost visible stroke as a library shape.
    pub fn save_last_stroke_as_shape(&mut self, name: &str) {
        let viewport = self.viewport();
        let Some(library) = self.library.as_mut() else {
            return;
        };
        let document = self.session.active_document();
        let Some(snapshot) = CanvasSnapshot::capture(document, viewport) else {
            return;
        };
        let Some(last) = snapshot.strokes().len().checked_sub(1) else {
            self.status = "Nothing to save".to_string();
            return;
        };
        self.status = match library.add_shape_from_canvas(GENERAL_CATEGORY, name, "", &snapshot, &[last]) {
            Ok(_) => format!("Saved shape '{name}'"),
            Err(err) => format!("Could not save shape: {err}"),
        };
    }

    /// Drop a library shape in the middle of the canvas.
    pub fn place_shape(&mut self, id: &str) {
        if !self.document().layers().active_accepts_strokes() {
            self.set_status("The active layer is locked");
            return;
        }
        let center = self.viewport().center();
        let Some(library) = self.library.as_mut() else {
            return;
        };
        match library.place_shape(id, center) {
            Ok(strokes) => {
                let layers = self.document_mut().layers_mut();
                for stroke in strokes {
                    layers.add_stroke_to_active(stroke);
                }
            }
            Err(err) => self.set_status(format!("Could not place shape: {err}")),
        }
    }

    pub fn toggle_favorite(&mut self, id: &str) {
        if let Some(library) = self.library.as_mut() {
            if let Err(err) = library.toggle_favorite(id) {
                self.status = format!("Could not update shape: {err}");
            }
        }
    }

    pub fn save_session(&mut self) {
        let path = self.sessions.sessions_dir().join("session.sdm");
        self.status = match self.sessions.save(&self.session, &path) {
            Ok(()) => format!("Saved {}", path.display()),
            Err(err) => format!("Save failed: {err}"),
        };
    }

    fn viewport(&self) -> Rect {
        let [w, h] = self.canvas.size;
        Rect::from_min_size(Pos2::ZERO, Vec2::new(w.max(1) as f32, h.max(1) as f32))
    }

    /// Pick up finished image decodes for every open tab.
    fn poll_images(&mut self) -> bool {
        let Some(cache) = &self.cache else {
            return false;
        };
        if cache.poll() == 0 && cache.stats().in_flight == 0 {
            return false;
        }
        let mut changed = false;
        for index in 0..self.session.tabs().len() {
            if let Some(tab) = self.session.tab_mut(index) {
                changed |= tab.document.refresh_images();
            }
        }
        self.canvas.dirty |= changed;
        true
    }

    /// Rasterise the active document at `size` and upload it if anything changed.
    pub(crate) fn canvas_texture(&mut self, ctx: &egui::Context, size: [usize; 2]) -> Option<&TextureHandle> {
        if size != self.canvas.size {
            self.canvas.size = size;
            self.canvas.dirty = true;
        }
        if self.canvas.dirty || self.canvas.handle.is_none() {
            let mut raster = RasterPainter::new(size[0] as u32, size[1] as u32)?;
            let viewport = self.viewport();
            self.session.active_document().render(&mut raster, viewport);
            let rgba = raster.to_rgba_image();
            let image = egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_raw());
            if let Some(handle) = self.canvas.handle.as_mut() {
                handle.set(image, TextureOptions::LINEAR);
            } else {
                self.canvas.handle = Some(ctx.load_texture("canvas", image, TextureOptions::LINEAR));
            }
            self.canvas.dirty = false;
        }
        self.canvas.handle.as_ref()
    }

    pub(crate) fn handle_dropped_files(&mut self, ctx: &egui::Context, at: Pos2) {
        let paths: Vec<PathBuf> = ctx.input(|i| {
            i.raw
                .dropped_files
                .iter()
                .filter_map(|file| file.path.clone())
                .collect()
        });
        if !paths.is_empty() {
            self.insert_images(paths, at);
        }
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.canvas.dirty = true;
    }
}

/// Turn the dragged points into a stroke for `tool`. Drags too short to mean
/// anything give `None`.
pub fn stroke_from_gesture(tool: ToolKind, points: &[Pos2], pen: &StrokeAttrs) -> Option<Stroke> {
    let (&start, &end) = (points.first()?, points.last()?);
    let attrs = pen.clone();
    match tool {
        ToolKind::Freehand if points.len() >= 2 => {
            Some(FreehandStroke::uniform(points.to_vec(), attrs).into())
        }
        ToolKind::Freehand => None,
        _ if start.distance(end) < 1.0 => None,
        ToolKind::Line => Some(LineStroke::new(start, end, attrs).into()),
        ToolKind::Rectangle => {
            let rect = Rect::from_two_pos(start, end);
            Some(RectangleStroke::new(rect.min, rect.size(), attrs).into())
        }
        ToolKind::Circle => Some(CircleStroke::new(start, start.distance(end), attrs).into()),
    }
}

impl eframe::App for SketchApp {
    /// Called by the framework periodically and before shutdown.
    fn save(&mut self, _storage: &mut dyn eframe::Storage) {
        if let Err(err) = self.sessions.auto_save(&self.session) {
            log::error!("Auto-save failed: {err}");
        }
    }

    fn auto_save_interval(&self) -> Duration {
        self.config.auto_save_interval()
    }

    /// Called each time the UI needs repainting, which may be many times per second.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.poll_images() {
            ctx.request_repaint_after(Duration::from_millis(50));
        }
        let screen = ctx.screen_rect().size();
        self.session.window_size = WindowSize {
            width: screen.x.round() as u32,
            height: screen.y.round() as u32,
        };

        panels::tabs_bar(self, ctx);
        panels::status_bar(self, ctx);
        panels::tools_panel(self, ctx);
        panels::layers_panel(self, ctx);
        panels::central_panel(self, ctx);
    }
}

/// Background colour behind the canvas texture while it is being created.
pub(crate) const CANVAS_FALLBACK: Color32 = Color32::from_gray(230);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stroke::StrokeKind;
    use crate::stroke::StrokeShape;

    #[test]
    fn test_short_drag_makes_no_shape() {
        let pen = StrokeAttrs::default();
        let pts = [Pos2::new(5.0, 5.0), Pos2::new(5.2, 5.0)];
        assert!(stroke_from_gesture(ToolKind::Line, &pts, &pen).is_none());
        assert!(stroke_from_gesture(ToolKind::Freehand, &pts[..1], &pen).is_none());
    }

    #[test]
    fn test_rectangle_from_reverse_drag() {
        let pen = StrokeAttrs::default();
        let pts = [Pos2::new(50.0, 40.0), Pos2::new(10.0, 10.0)];
        let stroke = stroke_from_gesture(ToolKind::Rectangle, &pts, &pen).unwrap();
        assert_eq!(stroke.kind(), StrokeKind::Rectangle);
        match stroke {
            Stroke::Rectangle(r) => assert_eq!(r.top_left, Pos2::new(10.0, 10.0)),
            other => panic!("unexpected {other:?}"),
        }
    }
}
