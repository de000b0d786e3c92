//! Shared soundboard data model.
//!
//! These types are persisted as JSON (camelCase) and read by both the store and
//! the player. They carry no I/O of their own.

mod audio_data;

use serde::{Deserialize, Serialize};

pub use audio_data::{
    AudioData, AudioDataError, DecodedAudio, extension_for_mime, mime_for_file_name,
};

/// Full persisted application state: every soundboard plus the current selection.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    /// Soundboards in creation order.
    #[serde(default)]
    pub soundboards: Vec<Soundboard>,
    /// Id of the soundboard currently opened, if any.
    ///
    /// May be stale; use [`AppState::selected_soundboard`] to resolve it.
    #[serde(default)]
    pub selected_soundboard_id: Option<String>,
}

impl AppState {
    /// Look up a soundboard by id.
    pub fn soundboard(&self, id: &str) -> Option<&Soundboard> {
        self.soundboards.iter().find(|board| board.id == id)
    }

    /// Mutable lookup of a soundboard by id.
    pub fn soundboard_mut(&mut self, id: &str) -> Option<&mut Soundboard> {
        self.soundboards.iter_mut().find(|board| board.id == id)
    }

    /// Whether a soundboard with `id` exists.
    pub fn contains_soundboard(&self, id: &str) -> bool {
        self.soundboard(id).is_some()
    }

    /// Resolve the selection. A selection pointing at a missing soundboard yields `None`.
    pub fn selected_soundboard(&self) -> Option<&Soundboard> {
        self.selected_soundboard_id
            .as_deref()
            .and_then(|id| self.soundboard(id))
    }
}

/// A named, ordered collection of clips.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Soundboard {
    /// Opaque id, unique across all soundboards.
    pub id: String,
    /// User-supplied display name.
    pub name: String,
    /// Clips in the order they were added. Older snapshots call this `sounds`.
    #[serde(default, alias = "sounds")]
    pub clips: Vec<Clip>,
}

impl Soundboard {
    /// New soundboard with no clips.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            clips: Vec::new(),
        }
    }

    /// Look up a clip by id.
    pub fn clip(&self, id: &str) -> Option<&Clip> {
        self.clips.iter().find(|clip| clip.id == id)
    }

    pub fn contains_clip(&self, id: &str) -> bool {
        self.clip(id).is_some()
    }
}

/// One playable audio item.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Clip {
    /// Opaque id, unique within its soundboard.
    pub id: String,
    /// Display name; defaults to the source file name.
    pub name: String,
    /// Self-contained encoded audio (a base64 data URI).
    pub audio_data: AudioData,
}
