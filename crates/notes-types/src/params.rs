//! Typed access to the free-form request parameters.
//!
//! UI collaborators send parameters as a JSON object. The worker reads the
//! fields each operation needs through the helpers here, so a missing or
//! ill-typed field becomes a [`TypeError`] instead of a silent default.

use serde_json::Value;

use crate::error::TypeError;
use crate::note::{NoteDraft, NoteId};

/// Request parameters, as published by UI collaborators.
pub type Params = serde_json::Map<String, Value>;

/// Read the required `id` parameter.
pub fn note_id(params: &Params) -> Result<NoteId, TypeError> {
    optional_note_id(params)?.ok_or(TypeError::MissingParam("id"))
}

/// Read the `id` parameter if present. `null` counts as absent.
pub fn optional_note_id(params: &Params) -> Result<Option<NoteId>, TypeError> {
    match params.get("id") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_u64().map(|raw| Some(NoteId::new(raw))).ok_or_else(|| {
            TypeError::InvalidParam {
                name: "id",
                reason: format!("expected a non-negative integer, got {n}"),
            }
        }),
        Some(other) => Err(TypeError::InvalidParam {
            name: "id",
            reason: format!("expected a non-negative integer, got {other}"),
        }),
    }
}

/// Read the `{id?, title, note}` parameters used by `add` and `put`.
pub fn note_draft(params: &Params) -> Result<NoteDraft, TypeError> {
    Ok(NoteDraft {
        id: optional_note_id(params)?,
        title: required_string(params, "title")?,
        note: required_string(params, "note")?,
    })
}

fn required_string(params: &Params, name: &'static str) -> Result<String, TypeError> {
    match params.get(name) {
        Some(Value::String(s)) => Ok(s.clone()),
        None | Some(Value::Null) => Err(TypeError::MissingParam(name)),
        Some(other) => Err(TypeError::InvalidParam {
            name,
            reason: format!("expected a string, got {other}"),
        }),
    }
}

/// Build a parameter map from a JSON value. Non-objects yield an empty map.
pub fn from_value(value: Value) -> Params {
    match value {
        Value::Object(map) => map,
        _ => Params::new(),
    }
}
