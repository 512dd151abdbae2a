use std::collections::{BTreeMap, HashMap};

use egui::Pos2;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::event::{EventBus, LayerEvent, ModelEvent};
use crate::image_cache::ImageCache;
use crate::render::Painter;
use crate::stroke::{Stroke, StrokeKind, StrokeResult, StrokeShape};

/// Stable layer identifier (a UUID string for layers created here).
pub type LayerId = String;

/// Named, ordered container of strokes. Later strokes paint on top.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    /// Unique identifier for the layer
    pub id: LayerId,
    /// Display name of the layer
    pub name: String,
    /// Whether the layer is currently visible
    pub visible: bool,
    /// Locked layers still render but refuse edits
    pub locked: bool,
    strokes: Vec<Stroke>,
}

impl Layer {
    pub fn new(name: &str) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), name)
    }

    pub fn with_id(id: impl Into<LayerId>, name: &str) -> Self {
        Self {
            id: id.into(),
            name: name.to_string(),
            visible: true,
            locked: false,
            strokes: Vec::new(),
        }
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    pub fn render(&self, painter: &mut dyn Painter) {
        for stroke in &self.strokes {
            stroke.render(painter);
        }
    }

    fn to_record(&self) -> LayerRecord {
        LayerRecord {
            id: self.id.clone(),
            name: self.name.clone(),
            visible: self.visible,
            locked: self.locked,
            strokes: self.strokes.iter().map(Stroke::to_dict).collect(),
        }
    }

    fn from_record(record: &LayerRecord) -> StrokeResult<Self> {
        let strokes = record
            .strokes
            .iter()
            .map(Stroke::from_dict)
            .collect::<StrokeResult<Vec<_>>>()?;
        Ok(Self {
            id: record.id.clone(),
            name: record.name.clone(),
            visible: record.visible,
            locked: record.locked,
            strokes,
        })
    }
}

fn default_true() -> bool {
    true
}

/// One layer as stored in a session file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerRecord {
    pub id: LayerId,
    pub name: String,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub strokes: Vec<Value>,
}

/// Serialised form of a [`LayerModel`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerStateRecord {
    #[serde(default)]
    pub order: Vec<LayerId>,
    #[serde(default)]
    pub active_layer: Option<LayerId>,
    #[serde(default)]
    pub layers: Vec<LayerRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_layers: Option<BTreeMap<String, LayerStateRecord>>,
}

/// What the layer panel shows for one layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerOverview {
    pub id: LayerId,
    pub name: String,
    pub visible: bool,
    pub locked: bool,
    pub active: bool,
    pub strokes: Vec<StrokeKind>,
}

/// Ordered layers plus the active-layer pointer.
///
/// Every id in `order` has an entry in `layers` and vice versa, and `active`
/// is either `None` or one of those ids. Mutations notify the event bus.
#[derive(Debug, Clone)]
pub struct LayerModel {
    order: Vec<LayerId>,
    layers: HashMap<LayerId, Layer>,
    active: Option<LayerId>,
    next_number: usize,
    events: EventBus,
}

impl PartialEq for LayerModel {
    fn eq(&self, other: &Self) -> bool {
        self.order == other.order && self.layers == other.layers && self.active == other.active
    }
}

impl Default for LayerModel {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerModel {
    /// One empty, active layer.
    pub fn new() -> Self {
        let mut model = Self::empty();
        model.add_layer(None);
        model
    }

    fn empty() -> Self {
        Self {
            order: Vec::new(),
            layers: HashMap::new(),
            active: None,
            next_number: 1,
            events: EventBus::new(),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    fn emit(&self, event: LayerEvent) {
        self.events.emit(ModelEvent::Layer(event));
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn order(&self) -> &[LayerId] {
        &self.order
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.order.iter().position(|l| l == id)
    }

    pub fn layer(&self, id: &str) -> Option<&Layer> {
        self.layers.get(id)
    }

    pub fn active_layer_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn active_layer(&self) -> Option<&Layer> {
        self.active.as_deref().and_then(|id| self.layers.get(id))
    }

    /// True when there is an active layer that accepts new strokes.
    pub fn active_accepts_strokes(&self) -> bool {
        self.active_layer().is_some_and(|layer| !layer.locked)
    }

    /// Append a layer on top and make it active. Unnamed layers are numbered.
    pub fn add_layer(&mut self, name: Option<&str>) -> LayerId {
        let name = match name {
            Some(name) => name.to_string(),
            None => format!("Layer {}", self.next_number),
        };
        self.next_number += 1;
        let layer = Layer::new(&name);
        let id = layer.id.clone();
        self.order.push(id.clone());
        self.layers.insert(id.clone(), layer);
        self.active = Some(id.clone());
        self.emit(LayerEvent::Added {
            id: id.clone(),
            index: self.order.len() - 1,
        });
        self.emit(LayerEvent::ActiveChanged { id: Some(id.clone()) });
        id
    }

    /// Refused for unknown ids and for the last remaining layer. When the
    /// active layer goes, the one below it (or the new bottom layer) takes over.
    pub fn remove_layer(&mut self, id: &str) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        if self.order.len() <= 1 {
            log::warn!("Refusing to remove the last layer");
            return false;
        }
        self.order.remove(index);
        self.layers.remove(id);
        self.emit(LayerEvent::Removed {
            id: id.to_string(),
            index,
        });
        if self.active.as_deref() == Some(id) {
            let fallback = index.saturating_sub(1).min(self.order.len().saturating_sub(1));
            self.active = self.order.get(fallback).cloned();
            self.emit(LayerEvent::ActiveChanged {
                id: self.active.clone(),
            });
        }
        true
    }

    /// Move a layer to `new_index`, clamped to the valid range.
    pub fn move_layer(&mut self, id: &str, new_index: usize) -> bool {
        let Some(old_index) = self.index_of(id) else {
            return false;
        };
        let new_index = new_index.min(self.order.len() - 1);
        if new_index != old_index {
            let moved = self.order.remove(old_index);
            self.order.insert(new_index, moved);
            self.emit(LayerEvent::Reordered {
                id: id.to_string(),
                old_index,
                new_index,
            });
        }
        true
    }

    pub fn rename_layer(&mut self, id: &str, name: &str) -> bool {
        let Some(layer) = self.layers.get_mut(id) else {
            return false;
        };
        layer.name = name.to_string();
        self.emit(LayerEvent::Renamed {
            id: id.to_string(),
            name: name.to_string(),
        });
        true
    }

    /// Display only; the layer's strokes are untouched.
    pub fn set_visibility(&mut self, id: &str, visible: bool) -> bool {
        let Some(layer) = self.layers.get_mut(id) else {
            return false;
        };
        layer.visible = visible;
        self.emit(LayerEvent::VisibilityChanged {
            id: id.to_string(),
            visible,
        });
        true
    }

    pub fn set_locked(&mut self, id: &str, locked: bool) -> bool {
        let Some(layer) = self.layers.get_mut(id) else {
            return false;
        };
        layer.locked = locked;
        self.emit(LayerEvent::LockChanged {
            id: id.to_string(),
            locked,
        });
        true
    }

    pub fn set_active(&mut self, id: &str) -> bool {
        if !self.layers.contains_key(id) {
            return false;
        }
        self.active = Some(id.to_string());
        self.emit(LayerEvent::ActiveChanged {
            id: Some(id.to_string()),
        });
        true
    }

    /// Bottom-to-top.
    pub fn iter_layers(&self) -> impl Iterator<Item = &Layer> + '_ {
        self.order.iter().filter_map(|id| self.layers.get(id))
    }

    pub fn get_overview(&self) -> Vec<LayerOverview> {
        self.iter_layers()
            .map(|layer| LayerOverview {
                id: layer.id.clone(),
                name: layer.name.clone(),
                visible: layer.visible,
                locked: layer.locked,
                active: self.active.as_deref() == Some(layer.id.as_str()),
                strokes: layer.strokes.iter().map(|s| s.kind()).collect(),
            })
            .collect()
    }

    fn editable_layer(&mut self, id: &str) -> Option<&mut Layer> {
        match self.layers.get_mut(id) {
            Some(layer) if layer.locked => {
                log::debug!("Layer {id} is locked");
                None
            }
            other => other,
        }
    }

    /// Append a stroke to a layer. Refused when the layer is locked or unknown.
    pub fn add_stroke(&mut self, id: &str, stroke: Stroke) -> bool {
        let Some(layer) = self.editable_layer(id) else {
            return false;
        };
        layer.strokes.push(stroke);
        self.emit(LayerEvent::ContentChanged { id: id.to_string() });
        true
    }

    pub fn add_stroke_to_active(&mut self, stroke: Stroke) -> bool {
        match self.active.clone() {
            Some(id) => self.add_stroke(&id, stroke),
            None => false,
        }
    }

    pub fn remove_stroke(&mut self, id: &str, index: usize) -> Option<Stroke> {
        let layer = self.editable_layer(id)?;
        if index >= layer.strokes.len() {
            return None;
        }
        let stroke = layer.strokes.remove(index);
        self.emit(LayerEvent::ContentChanged { id: id.to_string() });
        Some(stroke)
    }

    pub fn clear_layer(&mut self, id: &str) -> bool {
        let Some(layer) = self.editable_layer(id) else {
            return false;
        };
        layer.strokes.clear();
        self.emit(LayerEvent::ContentChanged { id: id.to_string() });
        true
    }

    pub fn stroke_count(&self) -> usize {
        self.layers.values().map(|l| l.strokes.len()).sum()
    }

    /// Every stroke, bottom layer first.
    pub fn all_strokes(&self) -> Vec<&Stroke> {
        self.iter_layers().flat_map(|l| l.strokes.iter()).collect()
    }

    /// Topmost stroke under `pos` on a visible layer, as (layer id, index).
    pub fn hit_test(&self, pos: Pos2) -> Option<(LayerId, usize)> {
        self.iter_layers()
            .filter(|l| l.visible)
            .flat_map(|l| l.strokes.iter().enumerate().map(move |(i, s)| (l, i, s)))
            .filter(|(_, _, s)| s.contains(pos))
            .last()
            .map(|(l, i, _)| (l.id.clone(), i))
    }

    /// Paint visible layers bottom-to-top, strokes in stored order.
    pub fn render(&self, painter: &mut dyn Painter) {
        for layer in self.iter_layers().filter(|l| l.visible) {
            layer.render(painter);
        }
    }

    /// Start loading pixels for every image stroke.
    pub fn attach_images(&mut self, cache: Option<&ImageCache>) {
        for layer in self.layers.values_mut() {
            for stroke in &mut layer.strokes {
                if let Some(image) = stroke.as_image_mut() {
                    image.attach(cache);
                }
            }
        }
    }

    /// Pick up finished image loads. True if any stroke changed.
    pub fn refresh_images(&mut self) -> bool {
        let mut changed = false;
        for layer in self.layers.values_mut() {
            for stroke in &mut layer.strokes {
                if let Some(image) = stroke.as_image_mut() {
                    changed |= image.refresh();
                }
            }
        }
        changed
    }

    pub fn export_state(&self) -> LayerStateRecord {
        LayerStateRecord {
            order: self.order.clone(),
            active_layer: self.active.clone(),
            layers: self.iter_layers().map(Layer::to_record).collect(),
            pdf_layers: None,
        }
    }

    /// Replace the whole model. Nothing changes if any stroke fails to decode.
    ///
    /// Ids listed in `order` without a layer are dropped; layers missing from
    /// `order` are appended on top. An empty state yields one blank layer.
    pub fn import_state(&mut self, state: &LayerStateRecord) -> StrokeResult<()> {
        let mut layers = HashMap::new();
        for record in &state.layers {
            let layer = Layer::from_record(record)?;
            if layers.insert(layer.id.clone(), layer).is_some() {
                log::warn!("Duplicate layer id {} in saved state", record.id);
            }
        }

        let mut order: Vec<LayerId> = Vec::with_capacity(layers.len());
        for id in &state.order {
            if layers.contains_key(id) && !order.contains(id) {
                order.push(id.clone());
            } else {
                log::warn!("Ignoring unknown layer id {id} in layer order");
            }
        }
        for record in &state.layers {
            if !order.contains(&record.id) {
                order.push(record.id.clone());
            }
        }

        let mut model = Self::empty();
        model.order = order;
        model.layers = layers;
        model.next_number = model.order.len() + 1;
        if model.order.is_empty() {
            model.add_layer(None);
        }
        model.active = match &state.active_layer {
            Some(id) if model.layers.contains_key(id) => Some(id.clone()),
            _ => model.order.last().cloned(),
        };

        self.order = model.order;
        self.layers = model.layers;
        self.active = model.active;
        self.next_number = model.next_number;
        self.emit(LayerEvent::Imported);
        Ok(())
    }

    /// Build a model from saved state.
    pub fn from_state(state: &LayerStateRecord) -> StrokeResult<Self> {
        let mut model = Self::empty();
        model.import_state(state)?;
        Ok(model)
    }

    /// Single layer holding `strokes`, as produced by the flat legacy format.
    pub fn from_strokes(strokes: Vec<Stroke>) -> Self {
        let mut model = Self::new();
        if let Some(layer) = model.active.clone().and_then(|id| model.layers.get_mut(&id)) {
            layer.strokes = strokes;
        }
        model
    }
}
