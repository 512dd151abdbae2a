use crate::layer::LayerId;

#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    Layer(LayerEvent),
    Document(DocumentEvent),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayerEvent {
    Added { id: LayerId, index: usize },
    Removed { id: LayerId, index: usize },
    Reordered {
        id: LayerId,
        old_index: usize,
        new_index: usize,
    },
    Renamed { id: LayerId, name: String },
    VisibilityChanged { id: LayerId, visible: bool },
    LockChanged { id: LayerId, locked: bool },
    ActiveChanged { id: Option<LayerId> },
    ContentChanged { id: LayerId },
    /// The whole model was replaced from a saved state.
    Imported,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DocumentEvent {
    Modified,
    Saved,
    Loaded,
    PdfAttached { page_count: usize },
    PdfDetached,
    PageChanged { page: usize },
}
