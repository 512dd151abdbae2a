use std::collections::BTreeMap;

use egui::{Color32, Pos2, Rect};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::event::{DocumentEvent, EventBus, ModelEvent};
use crate::image_cache::ImageCache;
use crate::layer::{LayerModel, LayerStateRecord};
use crate::render::{Painter, Path, Pen};
use crate::stroke::StrokeResult;

fn white() -> Color32 {
    Color32::WHITE
}

fn grid_grey() -> Color32 {
    Color32::from_rgb(220, 220, 220)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    pub visible: bool,
    pub spacing: f32,
    #[serde(with = "crate::util::color")]
    pub color: Color32,
    pub line_width: f32,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            visible: true,
            spacing: 20.0,
            color: grid_grey(),
            line_width: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulerSettings {
    pub visible: bool,
    pub unit: String,
}

impl Default for RulerSettings {
    fn default() -> Self {
        Self {
            visible: true,
            unit: "px".to_string(),
        }
    }
}

const MIN_GRID_SPACING: f32 = 1.0;
const MAX_GRID_LINES: usize = 4096;

/// Multiples of `spacing` in `[min, max]`, at most `MAX_GRID_LINES` of them.
/// Positions are computed from the index so large coordinates can't stall.
fn grid_lines(min: f32, max: f32, spacing: f32) -> impl Iterator<Item = f32> {
    let first = (min / spacing).ceil();
    let count = if max >= min && first.is_finite() {
        (((max / spacing).floor() - first + 1.0).max(0.0) as usize).min(MAX_GRID_LINES)
    } else {
        0
    };
    (0..count).map(move |i| (first + i as f32) * spacing)
}

/// Canvas background. Keys this version doesn't know are kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundSettings {
    #[serde(with = "crate::util::color", default = "white")]
    pub color: Color32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid: Option<GridSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ruler: Option<RulerSettings>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for BackgroundSettings {
    fn default() -> Self {
        Self {
            color: white(),
            grid: None,
            ruler: None,
            extra: Map::new(),
        }
    }
}

impl BackgroundSettings {
    pub fn render(&self, painter: &mut dyn Painter, viewport: Rect) {
        painter.draw_rect(viewport, None, Some(self.color));
        let Some(grid) = self.grid.as_ref().filter(|g| g.visible && g.spacing.is_finite()) else {
            return;
        };
        let spacing = grid.spacing.max(MIN_GRID_SPACING);
        let mut path = Path::new();
        for x in grid_lines(viewport.min.x, viewport.max.x, spacing) {
            path.move_to(Pos2::new(x, viewport.min.y));
            path.line_to(Pos2::new(x, viewport.max.y));
        }
        for y in grid_lines(viewport.min.y, viewport.max.y, spacing) {
            path.move_to(Pos2::new(viewport.min.x, y));
            path.line_to(Pos2::new(viewport.max.x, y));
        }
        if path.is_empty() {
            return;
        }
        painter.draw_path(&path, Some(&Pen::solid(grid.color, grid.line_width)), None);
    }
}

/// The collaborator that owns and rasterises a PDF. Its state is opaque here.
pub trait PdfBackgroundProvider {
    fn has_pdf_background(&self) -> bool;

    fn page_count(&self) -> usize;

    fn export_pdf_background_state(&self) -> Map<String, Value>;

    fn import_pdf_background_state(&mut self, state: &Map<String, Value>);

    /// Draw `page` behind the overlay strokes.
    fn render_page(&self, _page: usize, _painter: &mut dyn Painter, _viewport: Rect) {}
}

/// A loaded PDF: opaque provider state plus one layer model per visited page.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfBackground {
    state: Map<String, Value>,
    current_page: usize,
    page_count: usize,
    page_layers: BTreeMap<usize, LayerModel>,
}

impl PdfBackground {
    pub fn new(state: Map<String, Value>, page_count: usize) -> Self {
        let mut page_layers = BTreeMap::new();
        page_layers.insert(0, LayerModel::new());
        Self {
            state,
            current_page: 0,
            page_count: page_count.max(1),
            page_layers,
        }
    }

    /// Rebuild from the session's `pdf_background` object, which carries
    /// `current_page` and `page_count` next to the provider's own keys.
    pub fn from_state(mut state: Map<String, Value>) -> Self {
        let take = |state: &mut Map<String, Value>, key: &str| {
            state
                .remove(key)
                .and_then(|v| v.as_u64())
                .map(|v| v as usize)
        };
        let current_page = take(&mut state, "current_page").unwrap_or(0);
        let page_count = take(&mut state, "page_count").unwrap_or(1);
        let mut pdf = Self::new(state, page_count);
        pdf.current_page = current_page.min(pdf.page_count - 1);
        pdf.page_layers.clear();
        pdf.page_layers.insert(pdf.current_page, LayerModel::new());
        pdf
    }

    pub fn to_state(&self) -> Map<String, Value> {
        let mut state = self.state.clone();
        state.insert("current_page".into(), Value::from(self.current_page));
        state.insert("page_count".into(), Value::from(self.page_count));
        state
    }

    pub fn provider_state(&self) -> &Map<String, Value> {
        &self.state
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn page_layers(&self) -> &BTreeMap<usize, LayerModel> {
        &self.page_layers
    }

    fn current_layers(&self) -> Option<&LayerModel> {
        self.page_layers.get(&self.current_page)
    }

    fn current_layers_mut(&mut self) -> &mut LayerModel {
        self.page_layers.entry(self.current_page).or_default()
    }
}

/// One tab's canvas: background, layers, and an optional PDF with per-page layers.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub background: BackgroundSettings,
    layers: LayerModel,
    pdf: Option<PdfBackground>,
    events: EventBus,
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.background == other.background && self.layers == other.layers && self.pdf == other.pdf
    }
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layers(layers: LayerModel) -> Self {
        Self {
            layers,
            ..Self::default()
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    fn emit(&self, event: DocumentEvent) {
        self.events.emit(ModelEvent::Document(event));
    }

    pub fn mark_modified(&self) {
        self.emit(DocumentEvent::Modified);
    }

    /// The model edits go to: the visible page's when a PDF is loaded.
    pub fn layers(&self) -> &LayerModel {
        self.pdf
            .as_ref()
            .and_then(PdfBackground::current_layers)
            .unwrap_or(&self.layers)
    }

    pub fn layers_mut(&mut self) -> &mut LayerModel {
        match &mut self.pdf {
            Some(pdf) => pdf.current_layers_mut(),
            None => &mut self.layers,
        }
    }

    /// The layers that exist independently of any PDF.
    pub fn base_layers(&self) -> &LayerModel {
        &self.layers
    }

    pub fn set_base_layers(&mut self, layers: LayerModel) {
        self.layers = layers;
    }

    pub fn has_pdf_background(&self) -> bool {
        self.pdf.is_some()
    }

    pub fn pdf(&self) -> Option<&PdfBackground> {
        self.pdf.as_ref()
    }

    /// Switch to per-page layers, starting on page 0.
    pub fn attach_pdf(&mut self, provider: &dyn PdfBackgroundProvider) {
        if !provider.has_pdf_background() {
            log::warn!("PDF provider has no document loaded");
            return;
        }
        let pdf = PdfBackground::new(provider.export_pdf_background_state(), provider.page_count());
        let page_count = pdf.page_count;
        self.pdf = Some(pdf);
        log::info!("Attached PDF background with {page_count} pages");
        self.emit(DocumentEvent::PdfAttached { page_count });
    }

    pub fn restore_pdf(&mut self, mut pdf: PdfBackground) {
        pdf.current_layers_mut();
        self.pdf = Some(pdf);
    }

    pub fn detach_pdf(&mut self) -> Option<PdfBackground> {
        let pdf = self.pdf.take();
        if pdf.is_some() {
            self.emit(DocumentEvent::PdfDetached);
        }
        pdf
    }

    pub fn current_page(&self) -> Option<usize> {
        self.pdf.as_ref().map(|p| p.current_page)
    }

    /// Show `page` (clamped). Other pages' layers stay in memory.
    pub fn set_current_page(&mut self, page: usize) -> Option<usize> {
        let pdf = self.pdf.as_mut()?;
        let page = page.min(pdf.page_count - 1);
        if page != pdf.current_page {
            pdf.current_page = page;
            pdf.current_layers_mut();
            self.emit(DocumentEvent::PageChanged { page });
        }
        Some(page)
    }

    /// Per-page layer states keyed by the page index as a string.
    pub fn export_pdf_page_states(&self) -> BTreeMap<String, LayerStateRecord> {
        self.pdf
            .iter()
            .flat_map(|pdf| pdf.page_layers.iter())
            .map(|(page, model)| (page.to_string(), model.export_state()))
            .collect()
    }

    /// Replace the per-page layers. Keys that aren't page numbers are skipped.
    pub fn import_pdf_page_states(&mut self, states: &BTreeMap<String, LayerStateRecord>) -> StrokeResult<()> {
        let Some(pdf) = self.pdf.as_mut() else {
            if !states.is_empty() {
                log::warn!("Ignoring PDF page layers without a PDF background");
            }
            return Ok(());
        };
        let mut pages = BTreeMap::new();
        for (key, state) in states {
            match key.parse::<usize>() {
                Ok(page) => {
                    pages.insert(page, LayerModel::from_state(state)?);
                }
                Err(_) => log::warn!("Ignoring PDF page layers under key '{key}'"),
            }
        }
        pages.entry(pdf.current_page).or_default();
        pdf.page_layers = pages;
        Ok(())
    }

    /// Background, then the current layers: the visible page's model when a
    /// PDF is attached, the base layers otherwise.
    pub fn render(&self, painter: &mut dyn Painter, viewport: Rect) {
        self.background.render(painter, viewport);
        self.layers().render(painter);
    }

    pub fn attach_images(&mut self, cache: Option<&ImageCache>) {
        self.layers.attach_images(cache);
        if let Some(pdf) = &mut self.pdf {
            for model in pdf.page_layers.values_mut() {
                model.attach_images(cache);
            }
        }
    }

    pub fn refresh_images(&mut self) -> bool {
        let mut changed = self.layers.refresh_images();
        if let Some(pdf) = &mut self.pdf {
            for model in pdf.page_layers.values_mut() {
                changed |= model.refresh_images();
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{DrawOp, RecordingPainter};
    use crate::stroke::{LineStroke, Stroke, StrokeAttrs};
    use egui::Vec2;

    struct FakePdf {
        pages: usize,
    }

    impl PdfBackgroundProvider for FakePdf {
        fn has_pdf_background(&self) -> bool {
            true
        }

        fn page_count(&self) -> usize {
            self.pages
        }

        fn export_pdf_background_state(&self) -> Map<String, Value> {
            let mut state = Map::new();
            state.insert("path".into(), Value::from("/tmp/doc.pdf"));
            state
        }

        fn import_pdf_background_state(&mut self, _state: &Map<String, Value>) {}
    }

    fn line() -> Stroke {
        LineStroke::new(Pos2::ZERO, Pos2::new(1.0, 1.0), StrokeAttrs::default()).into()
    }

    #[test]
    fn test_pages_keep_their_own_layers() {
        let mut doc = Document::new();
        doc.attach_pdf(&FakePdf { pages: 3 });
        doc.layers_mut().add_stroke_to_active(line());
        assert_eq!(doc.set_current_page(1), Some(1));
        assert_eq!(doc.layers().stroke_count(), 0);
        doc.set_current_page(0);
        assert_eq!(doc.layers().stroke_count(), 1);
        assert_eq!(doc.base_layers().stroke_count(), 0);
    }

    #[test]
    fn test_page_is_clamped() {
        let mut doc = Document::new();
        assert_eq!(doc.set_current_page(4), None);
        doc.attach_pdf(&FakePdf { pages: 3 });
        assert_eq!(doc.set_current_page(10), Some(2));
    }

    #[test]
    fn test_pdf_state_carries_page_fields() {
        let mut doc = Document::new();
        doc.attach_pdf(&FakePdf { pages: 5 });
        doc.set_current_page(3);
        let state = doc.pdf().unwrap().to_state();
        assert_eq!(state["current_page"], 3);
        assert_eq!(state["page_count"], 5);
        let restored = PdfBackground::from_state(state);
        assert_eq!(restored.current_page(), 3);
        assert_eq!(restored.provider_state()["path"], "/tmp/doc.pdf");
    }

    #[test]
    fn test_grid_renders_over_background() {
        let mut doc = Document::new();
        doc.background.grid = Some(GridSettings::default());
        let mut painter = RecordingPainter::new();
        doc.render(&mut painter, Rect::from_min_size(Pos2::ZERO, Vec2::splat(100.0)));
        assert!(matches!(painter.ops()[0], DrawOp::Rect { fill: Some(c), .. } if c == Color32::WHITE));
        assert!(matches!(painter.ops()[1], DrawOp::Path { pen: Some(_), .. }));
    }

    #[test]
    fn test_pdf_page_replaces_base_layers_when_rendering() {
        let mut doc = Document::new();
        doc.layers_mut().add_stroke_to_active(line());
        doc.attach_pdf(&FakePdf { pages: 2 });
        assert_eq!(doc.layers().stroke_count(), 0);
        let mut painter = RecordingPainter::new();
        doc.render(&mut painter, Rect::from_min_size(Pos2::ZERO, Vec2::splat(10.0)));
        assert!(!painter.ops().iter().any(|op| matches!(op, DrawOp::Path { .. })));

        doc.detach_pdf();
        let mut painter = RecordingPainter::new();
        doc.render(&mut painter, Rect::from_min_size(Pos2::ZERO, Vec2::splat(10.0)));
        assert_eq!(painter.ops().iter().filter(|op| matches!(op, DrawOp::Path { .. })).count(), 1);
    }

    #[test]
    fn test_tiny_grid_spacing_is_bounded() {
        let mut doc = Document::new();
        doc.background.grid = Some(GridSettings {
            spacing: 1e-20,
            ..GridSettings::default()
        });
        let mut painter = RecordingPainter::new();
        doc.render(&mut painter, Rect::from_min_size(Pos2::ZERO, Vec2::splat(100.0)));
        assert!(matches!(painter.ops()[1], DrawOp::Path { .. }));
    }

    #[test]
    fn test_grid_lines_at_large_coordinates() {
        let lines: Vec<f32> = grid_lines(1.0e9, 1.0e9 + 100.0, 1.0).collect();
        assert!(lines.len() <= MAX_GRID_LINES);
        assert_eq!(grid_lines(0.0, 100.0, 20.0).count(), 6);
        assert_eq!(grid_lines(0.0, 1.0e9, 1.0).count(), MAX_GRID_LINES);
        assert_eq!(grid_lines(5.0, 1.0, 1.0).count(), 0);
    }

    #[test]
    fn test_unknown_background_keys_survive() {
        let json = serde_json::json!({"color": "#101010", "paper": "a4"});
        let settings: BackgroundSettings = serde_json::from_value(json).unwrap();
        assert_eq!(settings.extra["paper"], "a4");
        let back = serde_json::to_value(&settings).unwrap();
        assert_eq!(back["paper"], "a4");
        assert_eq!(back["color"], "#101010");
    }
}
