//! Session files (`.sdm`): every open tab plus window-level metadata, as JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::Document;
use crate::stroke::StrokeError;
use crate::util::time;

mod codec;
mod manager;
mod writer;

pub use codec::{from_json, from_record, to_json, to_record, SessionRecord, TabRecord, SESSION_VERSION};
pub use manager::{Recovery, SessionManager};
pub use writer::{write_atomic, write_atomic_with, TEMP_PREFIX};

/// Errors that can occur while saving or loading a session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("session is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown stroke kind '{0}'")]
    UnknownStrokeKind(String),

    #[error("invalid stroke: {0}")]
    InvalidStroke(#[source] StrokeError),

    #[error("unsupported session version '{0}'")]
    UnsupportedVersion(String),

    #[error("another save is already in progress")]
    SaveInProgress,
}

impl From<StrokeError> for SessionError {
    fn from(err: StrokeError) -> Self {
        match err {
            StrokeError::UnknownKind(kind) => SessionError::UnknownStrokeKind(kind),
            other => SessionError::InvalidStroke(other),
        }
    }
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// `group -> key -> value`, opaque to the core.
pub type Settings = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}

impl Default for WindowSize {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 800,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tab {
    pub name: String,
    pub document: Document,
}

impl Tab {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            document: Document::new(),
        }
    }
}

/// Everything a session file holds.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub created: String,
    pub window_size: WindowSize,
    pub settings: Settings,
    tabs: Vec<Tab>,
    active_tab: usize,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// One blank tab.
    pub fn new() -> Self {
        Self::from_tabs(vec![Tab::new("Untitled")], 0)
    }

    /// `active_tab` is clamped; an empty list gets a blank tab.
    pub fn from_tabs(mut tabs: Vec<Tab>, active_tab: usize) -> Self {
        if tabs.is_empty() {
            tabs.push(Tab::new("Untitled"));
        }
        let active_tab = active_tab.min(tabs.len() - 1);
        Self {
            created: time::iso_now(),
            window_size: WindowSize::default(),
            settings: Settings::new(),
            tabs,
            active_tab,
        }
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn tab_mut(&mut self, index: usize) -> Option<&mut Tab> {
        self.tabs.get_mut(index)
    }

    pub fn active_tab(&self) -> usize {
        self.active_tab
    }

    pub fn set_active_tab(&mut self, index: usize) -> bool {
        if index >= self.tabs.len() {
            return false;
        }
        self.active_tab = index;
        true
    }

    pub fn active_document(&self) -> &Document {
        &self.tabs[self.active_tab].document
    }

    pub fn active_document_mut(&mut self) -> &mut Document {
        &mut self.tabs[self.active_tab].document
    }

    /// Append a blank tab and switch to it.
    pub fn add_tab(&mut self, name: impl Into<String>) -> usize {
        self.tabs.push(Tab::new(name));
        self.active_tab = self.tabs.len() - 1;
        self.active_tab
    }

    /// Refused for the last tab.
    pub fn close_tab(&mut self, index: usize) -> bool {
        if index >= self.tabs.len() || self.tabs.len() == 1 {
            return false;
        }
        self.tabs.remove(index);
        if self.active_tab >= index && self.active_tab > 0 {
            self.active_tab -= 1;
        }
        true
    }

    pub fn setting(&self, group: &str, key: &str) -> Option<&str> {
        self.settings.get(group)?.get(key).map(String::as_str)
    }

    pub fn set_setting(&mut self, group: &str, key: &str, value: impl Into<String>) {
        self.settings
            .entry(group.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
    }
}
