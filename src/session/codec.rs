use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Session, SessionError, SessionResult, Settings, Tab, WindowSize};
use crate::document::{BackgroundSettings, Document, PdfBackground};
use crate::layer::{LayerModel, LayerStateRecord};
use crate::stroke::Stroke;
use crate::util::time;

/// Version written by this build.
pub const SESSION_VERSION: &str = "1.1";

const READABLE_VERSIONS: [&str; 2] = ["1.0", "1.1"];

/// Top-level envelope of a session file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub version: String,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub window_size: WindowSize,
    #[serde(default)]
    pub active_tab: usize,
    #[serde(default)]
    pub settings: Map<String, Value>,
    #[serde(default)]
    pub tabs: Vec<TabRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabRecord {
    pub name: String,
    #[serde(default)]
    pub background_settings: BackgroundSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_background: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layers: Option<LayerStateRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_page_layers: Option<BTreeMap<String, LayerStateRecord>>,
    /// Flat stroke list from files that predate layers. Read, never written.
    #[serde(default, skip_serializing)]
    pub strokes: Option<Vec<Value>>,
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Settings are strings only; anything else is stored in its JSON text form.
fn coerce_settings(raw: &Map<String, Value>) -> Settings {
    let mut settings = Settings::new();
    for (group, entries) in raw {
        let Value::Object(entries) = entries else {
            log::warn!("Setting group '{group}' is not a map, storing it under 'value'");
            settings
                .entry(group.clone())
                .or_default()
                .insert("value".to_string(), value_to_string(entries));
            continue;
        };
        let group_map = settings.entry(group.clone()).or_default();
        for (key, value) in entries {
            if !value.is_string() {
                log::warn!("Setting {group}.{key} is not a string, coercing {value}");
            }
            group_map.insert(key.clone(), value_to_string(value));
        }
    }
    settings
}

fn settings_to_map(settings: &Settings) -> Map<String, Value> {
    settings
        .iter()
        .map(|(group, entries)| {
            let entries: Map<String, Value> = entries
                .iter()
                .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
                .collect();
            (group.clone(), Value::Object(entries))
        })
        .collect()
}

fn tab_to_record(tab: &Tab) -> TabRecord {
    let document = &tab.document;
    let pdf = document.pdf();
    TabRecord {
        name: tab.name.clone(),
        background_settings: document.background.clone(),
        pdf_background: pdf.map(PdfBackground::to_state),
        layers: Some(document.base_layers().export_state()),
        pdf_page_layers: pdf.map(|_| document.export_pdf_page_states()),
        strokes: None,
    }
}

fn tab_from_record(record: TabRecord) -> SessionResult<Tab> {
    let TabRecord {
        name,
        background_settings,
        pdf_background,
        layers,
        pdf_page_layers,
        strokes,
    } = record;

    let mut nested_pages = None;
    let base = match (layers, strokes) {
        (Some(mut state), _) => {
            nested_pages = state.pdf_layers.take();
            LayerModel::from_state(&state)?
        }
        (None, Some(strokes)) => {
            log::info!("Tab '{name}' uses the flat stroke list, loading into one layer");
            let strokes = strokes
                .iter()
                .map(Stroke::from_dict)
                .collect::<Result<Vec<_>, _>>()?;
            LayerModel::from_strokes(strokes)
        }
        (None, None) => LayerModel::new(),
    };

    let mut document = Document::with_layers(base);
    document.background = background_settings;
    if let Some(state) = pdf_background {
        document.restore_pdf(PdfBackground::from_state(state));
        if let Some(pages) = pdf_page_layers.or(nested_pages) {
            document.import_pdf_page_states(&pages)?;
        }
    }
    Ok(Tab { name, document })
}

pub fn to_record(session: &Session) -> SessionRecord {
    SessionRecord {
        version: SESSION_VERSION.to_string(),
        created: session.created.clone(),
        window_size: session.window_size,
        active_tab: session.active_tab(),
        settings: settings_to_map(&session.settings),
        tabs: session.tabs().iter().map(tab_to_record).collect(),
    }
}

/// Versions 1.0 and 1.1 are read; other 1.x files are tried with a warning
/// and later major versions are refused.
pub fn from_record(record: SessionRecord) -> SessionResult<Session> {
    if !READABLE_VERSIONS.contains(&record.version.as_str()) {
        if record.version.split('.').next() == Some("1") {
            log::warn!("Reading session version {} as {SESSION_VERSION}", record.version);
        } else {
            return Err(SessionError::UnsupportedVersion(record.version));
        }
    }
    let settings = coerce_settings(&record.settings);
    let tabs = record
        .tabs
        .into_iter()
        .map(tab_from_record)
        .collect::<SessionResult<Vec<_>>>()?;
    let mut session = Session::from_tabs(tabs, record.active_tab);
    session.window_size = record.window_size;
    session.settings = settings;
    if !record.created.is_empty() {
        if time::parse_iso(&record.created).is_none() {
            log::warn!("Session creation time '{}' is not ISO-8601", record.created);
        }
        session.created = record.created;
    }
    Ok(session)
}

pub fn to_json(session: &Session) -> SessionResult<String> {
    Ok(serde_json::to_string_pretty(&to_record(session))?)
}

pub fn from_json(text: &str) -> SessionResult<Session> {
    let record: SessionRecord = serde_json::from_str(text)?;
    from_record(record)
}
