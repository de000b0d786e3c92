//! Soundboard persistence.
//!
//! - [`kv`]: the key-value byte stores the state blob lives in
//! - [`snapshot`]: JSON encoding of [`AppState`] and its forgiving decoder
//! - [`source`]: clip inputs (files or in-memory bytes) and their conversion to [`AudioData`]
//! - [`store`]: [`SoundboardStore`], the owner of the in-memory state
//!
//! [`AppState`]: soundboard_types::AppState
//! [`AudioData`]: soundboard_types::AudioData

pub mod error;
pub mod kv;
pub mod snapshot;
pub mod source;
pub mod store;

pub use error::StoreError;
pub use kv::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
pub use source::{ClipSource, FileClipSource, InMemoryClip};
pub use store::{AddClipsReport, AddedClip, DEFAULT_STATE_KEY, SkippedClip, SoundboardStore};
