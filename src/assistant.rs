//! The seam to a language-model helper that turns requests into strokes.
//!
//! The HTTP client lives outside this crate. Whatever it returns is treated as
//! untrusted input and filtered through [`strokes_from_untrusted`].

use serde_json::Value;
use thiserror::Error;

use crate::stroke::{Stroke, StrokeKind, StrokeShape};

const MIN_WIDTH: f32 = 0.1;
const MAX_WIDTH: f32 = 100.0;

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("no model endpoint is configured")]
    NotConfigured,

    #[error("model request failed: {0}")]
    Request(String),

    #[error("model returned no usable strokes")]
    NoStrokes,
}

pub trait LlmClient {
    fn is_configured(&self) -> bool;

    fn list_models(&self) -> Result<Vec<String>, AssistantError>;

    /// Ask for a JSON object shaped like `schema_hint`.
    fn generate_json(&self, prompt: &str, schema_hint: &Value) -> Result<Value, AssistantError>;
}

/// Shape the model is asked to answer in.
pub fn stroke_schema_hint() -> Value {
    serde_json::json!({
        "strokes": [{
            "type": "line | rectangle | circle | bspline | freehand | text",
            "color": "#rrggbb",
            "width": 2.0,
            "style": 1
        }]
    })
}

/// Keep the strokes in `value` that parse, dropping the rest with a warning.
/// Accepts `{"strokes": [...]}` or a bare array. Image strokes are refused
/// since they would point at arbitrary files.
pub fn strokes_from_untrusted(value: &Value) -> Vec<Stroke> {
    let entries = match value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("strokes") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => {
                log::warn!("Model answer has no 'strokes' array");
                return Vec::new();
            }
        },
        _ => {
            log::warn!("Model answer is neither an object nor an array");
            return Vec::new();
        }
    };

    entries
        .iter()
        .enumerate()
        .filter_map(|(i, entry)| match Stroke::from_dict(entry) {
            Ok(stroke) if stroke.kind() == StrokeKind::Image => {
                log::warn!("Dropping model stroke {i}: image strokes are not accepted");
                None
            }
            Ok(mut stroke) => {
                sanitize(&mut stroke);
                Some(stroke)
            }
            Err(err) => {
                log::warn!("Dropping model stroke {i}: {err}");
                None
            }
        })
        .collect()
}

fn sanitize(stroke: &mut Stroke) {
    let attrs = stroke.attrs_mut();
    attrs.width = if attrs.width.is_finite() {
        attrs.width.clamp(MIN_WIDTH, MAX_WIDTH)
    } else {
        MIN_WIDTH
    };
}

/// Run `prompt` through `client` and return the strokes that survive validation.
pub fn request_strokes(client: &dyn LlmClient, prompt: &str) -> Result<Vec<Stroke>, AssistantError> {
    if !client.is_configured() {
        return Err(AssistantError::NotConfigured);
    }
    let answer = client.generate_json(prompt, &stroke_schema_hint())?;
    let strokes = strokes_from_untrusted(&answer);
    if strokes.is_empty() {
        return Err(AssistantError::NoStrokes);
    }
    log::info!("Model produced {} stroke(s)", strokes.len());
    Ok(strokes)
}
