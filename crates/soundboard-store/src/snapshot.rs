//! Persisted form of [`AppState`].
//!
//! Encoding is plain `serde_json`. Decoding never fails: anything unreadable is dropped
//! (with a warning) and the rest of the snapshot is kept.

use std::collections::HashSet;

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use soundboard_types::{AppState, AudioData, Clip, Soundboard};

/// Serialize the full state.
pub fn encode_state(state: &AppState) -> Result<Vec<u8>> {
    serde_json::to_vec(state).context("serialize soundboard state")
}

/// Parse a stored blob, falling back to defaults for whatever is malformed.
pub fn decode_state(raw: &[u8]) -> AppState {
    let value: Value = match serde_json::from_slice(raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "stored state is not valid JSON; starting empty");
            return AppState::default();
        }
    };
    let mut root = match value {
        Value::Object(root) => root,
        other => {
            tracing::warn!(kind = json_kind(&other), "stored state is not an object; starting empty");
            return AppState::default();
        }
    };

    let soundboards = match root.remove("soundboards") {
        Some(Value::Array(items)) => decode_soundboards(items),
        None | Some(Value::Null) => Vec::new(),
        Some(other) => {
            tracing::warn!(kind = json_kind(&other), "ignoring non-array soundboards field");
            Vec::new()
        }
    };

    let selected_soundboard_id = match root.remove("selectedSoundboardId") {
        Some(Value::String(id)) if !id.is_empty() => Some(id),
        None | Some(Value::Null) | Some(Value::String(_)) => None,
        Some(other) => {
            tracing::warn!(kind = json_kind(&other), "ignoring non-string selection");
            None
        }
    };

    AppState {
        soundboards,
        selected_soundboard_id,
    }
}

fn decode_soundboards(items: Vec<Value>) -> Vec<Soundboard> {
    let mut seen = HashSet::new();
    let mut boards = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let Some(board) = decode_soundboard(index, item) else {
            continue;
        };
        if !seen.insert(board.id.clone()) {
            tracing::warn!(index, id = %board.id, "dropping soundboard with duplicate id");
            continue;
        }
        boards.push(board);
    }
    boards
}

fn decode_soundboard(index: usize, item: Value) -> Option<Soundboard> {
    let mut obj = match item {
        Value::Object(obj) => obj,
        other => {
            tracing::warn!(index, kind = json_kind(&other), "dropping malformed soundboard");
            return None;
        }
    };
    let Some(id) = take_id(&mut obj) else {
        tracing::warn!(index, "dropping soundboard without an id");
        return None;
    };
    let name = take_string(&mut obj, "name").unwrap_or_default();

    let clips = match obj.remove("clips").or_else(|| obj.remove("sounds")) {
        Some(Value::Array(items)) => decode_clips(&id, items),
        None | Some(Value::Null) => Vec::new(),
        Some(other) => {
            tracing::warn!(soundboard = %id, kind = json_kind(&other), "ignoring non-array clips");
            Vec::new()
        }
    };

    Some(Soundboard { id, name, clips })
}

fn decode_clips(soundboard_id: &str, items: Vec<Value>) -> Vec<Clip> {
    let mut seen = HashSet::new();
    let mut clips = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let Some(clip) = decode_clip(item) else {
            tracing::warn!(soundboard = %soundboard_id, index, "dropping malformed clip");
            continue;
        };
        if !seen.insert(clip.id.clone()) {
            tracing::warn!(soundboard = %soundboard_id, id = %clip.id, "dropping clip with duplicate id");
            continue;
        }
        clips.push(clip);
    }
    clips
}

fn decode_clip(item: Value) -> Option<Clip> {
    let Value::Object(mut obj) = item else {
        return None;
    };
    let id = take_id(&mut obj)?;
    let audio_data = take_string(&mut obj, "audioData").filter(|data| !data.is_empty())?;
    let name = take_string(&mut obj, "name").unwrap_or_default();
    Some(Clip {
        id,
        name,
        audio_data: AudioData::from_data_uri(audio_data),
    })
}

fn take_id(obj: &mut Map<String, Value>) -> Option<String> {
    take_string(obj, "id").filter(|id| !id.is_empty())
}

fn take_string(obj: &mut Map<String, Value>, field: &str) -> Option<String> {
    match obj.remove(field) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
