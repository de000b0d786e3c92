//! The soundboard store: in-memory [`AppState`] plus its persisted copy.
//!
//! Every mutating operation either persists its change or, if the write fails, rolls
//! the in-memory state back so memory and storage never disagree.

use anyhow::Context;
use soundboard_types::{AppState, Clip, Soundboard};
use uuid::Uuid;

use crate::error::StoreError;
use crate::kv::KeyValueStore;
use crate::snapshot;
use crate::source::{ClipSource, encode_source};

/// Key the state blob is stored under unless configured otherwise.
pub const DEFAULT_STATE_KEY: &str = "darkSoundboards";

/// Clip appended by [`SoundboardStore::add_clips`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddedClip {
    pub id: String,
    pub name: String,
}

/// Source that could not be turned into a clip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedClip {
    pub file_name: String,
    pub reason: String,
}

/// Result of a clip batch: what went in, what was dropped and why.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AddClipsReport {
    pub added: Vec<AddedClip>,
    pub skipped: Vec<SkippedClip>,
}

/// Owner of the soundboard state.
pub struct SoundboardStore<K> {
    kv: K,
    key: String,
    state: AppState,
}

impl<K: KeyValueStore> SoundboardStore<K> {
    /// Open the store under [`DEFAULT_STATE_KEY`] and load the persisted state.
    pub fn open(kv: K) -> anyhow::Result<Self> {
        Self::open_with_key(kv, DEFAULT_STATE_KEY)
    }

    /// Open the store under a custom key and load the persisted state.
    pub fn open_with_key(kv: K, key: impl Into<String>) -> anyhow::Result<Self> {
        let mut store = Self {
            kv,
            key: key.into(),
            state: AppState::default(),
        };
        store.load()?;
        Ok(store)
    }

    /// Reload from storage. An absent entry is seeded with the empty state.
    pub fn load(&mut self) -> anyhow::Result<&AppState> {
        let raw = self
            .kv
            .get(&self.key)
            .with_context(|| format!("load state {:?}", self.key))?;
        match raw {
            Some(raw) => {
                self.state = snapshot::decode_state(&raw);
                tracing::debug!(
                    key = %self.key,
                    soundboards = self.state.soundboards.len(),
                    "loaded soundboard state"
                );
            }
            None => {
                self.state = AppState::default();
                self.save()?;
                tracing::info!(key = %self.key, "seeded empty soundboard state");
            }
        }
        Ok(&self.state)
    }

    /// Write the current state as a single entry.
    pub fn save(&self) -> anyhow::Result<()> {
        let raw = snapshot::encode_state(&self.state)?;
        self.kv
            .set(&self.key, &raw)
            .with_context(|| format!("save state {:?}", self.key))?;
        Ok(())
    }

    /// Replace the whole state and persist it.
    pub fn save_state(&mut self, state: AppState) -> anyhow::Result<()> {
        let previous = std::mem::replace(&mut self.state, state);
        if let Err(e) = self.save() {
            self.state = previous;
            return Err(e);
        }
        Ok(())
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn soundboards(&self) -> &[Soundboard] {
        &self.state.soundboards
    }

    pub fn soundboard(&self, id: &str) -> Option<&Soundboard> {
        self.state.soundboard(id)
    }

    /// The opened soundboard; `None` when nothing is selected or the selection is stale.
    pub fn selected_soundboard(&self) -> Option<&Soundboard> {
        self.state.selected_soundboard()
    }

    /// Create an empty soundboard.
    ///
    /// `None` means the name prompt was dismissed. Blank names are rejected.
    pub fn create_soundboard(&mut self, name: Option<&str>) -> Result<Soundboard, StoreError> {
        let name = name.ok_or(StoreError::Cancelled)?.trim();
        if name.is_empty() {
            return Err(StoreError::EmptyName);
        }

        let id = fresh_id(|candidate| self.state.contains_soundboard(candidate));
        let board = Soundboard::new(id, name);
        self.state.soundboards.push(board.clone());
        if let Err(e) = self.save() {
            self.state.soundboards.pop();
            return Err(e.into());
        }
        tracing::info!(id = %board.id, name = %board.name, "created soundboard");
        Ok(board)
    }

    /// Append clips to a soundboard in input order and persist once.
    ///
    /// Sources that cannot be read or encoded are skipped and listed in the report.
    pub fn add_clips<I>(
        &mut self,
        soundboard_id: &str,
        files: I,
    ) -> Result<AddClipsReport, StoreError>
    where
        I: IntoIterator,
        I::Item: ClipSource,
    {
        if !self.state.contains_soundboard(soundboard_id) {
            return Err(StoreError::SoundboardNotFound {
                id: soundboard_id.to_string(),
            });
        }

        let mut encoded = Vec::new();
        let mut report = AddClipsReport::default();
        for source in files {
            let file_name = source.file_name();
            match encode_source(&source) {
                Ok(data) => encoded.push((file_name, data)),
                Err(e) => {
                    tracing::warn!(file = %file_name, "skipping clip: {e:#}");
                    report.skipped.push(SkippedClip {
                        file_name,
                        reason: format!("{e:#}"),
                    });
                }
            }
        }

        let Some(board) = self.state.soundboard_mut(soundboard_id) else {
            return Err(StoreError::SoundboardNotFound {
                id: soundboard_id.to_string(),
            });
        };
        let before = board.clips.len();
        for (name, audio_data) in encoded {
            let id = fresh_id(|candidate| board.contains_clip(candidate));
            report.added.push(AddedClip {
                id: id.clone(),
                name: name.clone(),
            });
            board.clips.push(Clip {
                id,
                name,
                audio_data,
            });
        }

        if let Err(e) = self.save() {
            if let Some(board) = self.state.soundboard_mut(soundboard_id) {
                board.clips.truncate(before);
            }
            return Err(e.into());
        }
        tracing::info!(
            soundboard = %soundboard_id,
            added = report.added.len(),
            skipped = report.skipped.len(),
            "added clips"
        );
        Ok(report)
    }

    /// Open a soundboard (`Some`) or go back to the list (`None`).
    pub fn select(&mut self, soundboard_id: Option<&str>) -> Result<(), StoreError> {
        if let Some(id) = soundboard_id {
            if !self.state.contains_soundboard(id) {
                return Err(StoreError::SoundboardNotFound { id: id.to_string() });
            }
        }

        let previous = std::mem::replace(
            &mut self.state.selected_soundboard_id,
            soundboard_id.map(str::to_string),
        );
        if let Err(e) = self.save() {
            self.state.selected_soundboard_id = previous;
            return Err(e.into());
        }
        tracing::debug!(selected = ?soundboard_id, "selection changed");
        Ok(())
    }
}

/// Random id that `taken` does not already claim.
fn fresh_id(taken: impl Fn(&str) -> bool) -> String {
    loop {
        let id = Uuid::new_v4().to_string();
        if !taken(&id) {
            return id;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use anyhow::anyhow;

    use super::*;
    use crate::kv::MemoryKeyValueStore;
    use crate::source::{FileClipSource, InMemoryClip};

    /// Memory store whose writes can be switched off.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryKeyValueStore,
        fail_writes: AtomicBool,
    }

    impl KeyValueStore for FlakyStore {
        fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
            if self.fail_writes.load(Ordering::Relaxed) {
                return Err(anyhow!("disk full"));
            }
            self.inner.set(key, value)
        }
    }

    fn open_shared() -> (Arc<MemoryKeyValueStore>, SoundboardStore<Arc<MemoryKeyValueStore>>) {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let store = SoundboardStore::open(kv.clone()).unwrap();
        (kv, store)
    }

    fn persisted(kv: &MemoryKeyValueStore) -> AppState {
        snapshot::decode_state(&kv.get(DEFAULT_STATE_KEY).unwrap().unwrap())
    }

    #[test]
    fn load_on_empty_storage_seeds_default() {
        let (kv, mut store) = open_shared();
        assert_eq!(store.state(), &AppState::default());

        let raw = kv.get(DEFAULT_STATE_KEY).unwrap().expect("default persisted");
        let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(json, serde_json::json!({"soundboards": [], "selectedSoundboardId": null}));

        let again = store.load().unwrap().clone();
        assert_eq!(again, AppState::default());
        assert_eq!(kv.get(DEFAULT_STATE_KEY).unwrap(), Some(raw));
    }

    #[test]
    fn memes_scenario_survives_reload() {
        let (kv, mut store) = open_shared();
        let board = store.create_soundboard(Some("Memes")).unwrap();
        assert_eq!(store.soundboards().len(), 1);
        assert_eq!(board.name, "Memes");
        assert!(board.clips.is_empty());
        assert!(!board.id.is_empty());

        let report = store
            .add_clips(&board.id, [InMemoryClip::new("laugh.mp3", b"ID3\x04".to_vec())])
            .unwrap();
        assert_eq!(report.added.len(), 1);
        assert!(report.skipped.is_empty());

        let saved = store.soundboard(&board.id).unwrap().clone();
        assert_eq!(saved.clips.len(), 1);
        assert_eq!(saved.clips[0].name, "laugh.mp3");
        assert!(!saved.clips[0].audio_data.is_empty());

        let reopened = SoundboardStore::open(kv.clone()).unwrap();
        assert_eq!(reopened.state(), store.state());
    }

    #[test]
    fn save_state_then_load_roundtrips() {
        let (kv, mut store) = open_shared();
        let mut board = Soundboard::new("b", "Board");
        board.clips.push(Clip {
            id: "c".to_string(),
            name: "c.wav".to_string(),
            audio_data: soundboard_types::AudioData::encode("c.wav", b"RIFF").unwrap(),
        });
        let state = AppState {
            soundboards: vec![board],
            selected_soundboard_id: Some("b".to_string()),
        };

        store.save_state(state.clone()).unwrap();
        let mut other = SoundboardStore::open(kv).unwrap();
        assert_eq!(other.load().unwrap(), &state);
    }

    #[test]
    fn blank_or_cancelled_names_are_rejected() {
        let (kv, mut store) = open_shared();
        let before = kv.get(DEFAULT_STATE_KEY).unwrap();

        assert!(matches!(store.create_soundboard(Some("")), Err(StoreError::EmptyName)));
        assert!(matches!(store.create_soundboard(Some("   ")), Err(StoreError::EmptyName)));
        assert!(matches!(store.create_soundboard(None), Err(StoreError::Cancelled)));

        assert!(store.soundboards().is_empty());
        assert_eq!(kv.get(DEFAULT_STATE_KEY).unwrap(), before);
    }

    #[test]
    fn add_clips_to_unknown_board_changes_nothing() {
        let (kv, mut store) = open_shared();
        store.create_soundboard(Some("Sfx")).unwrap();
        let before = store.state().clone();
        let raw_before = kv.get(DEFAULT_STATE_KEY).unwrap();

        let err = store
            .add_clips("nonexistent-id", [InMemoryClip::new("a.mp3", b"x".to_vec())])
            .unwrap_err();

        assert!(matches!(err, StoreError::SoundboardNotFound { ref id } if id == "nonexistent-id"));
        assert!(err.is_notice());
        assert_eq!(store.state(), &before);
        assert_eq!(kv.get(DEFAULT_STATE_KEY).unwrap(), raw_before);
    }

    #[test]
    fn add_clips_keeps_good_files_when_some_fail() {
        let (kv, mut store) = open_shared();
        let board = store.create_soundboard(Some("Mixed")).unwrap();

        let sources: Vec<Box<dyn ClipSource>> = vec![
            Box::new(InMemoryClip::new("one.mp3", b"1".to_vec())),
            Box::new(FileClipSource::new("/no/such/dir/missing.wav")),
            Box::new(InMemoryClip::new("empty.wav", Vec::new())),
            Box::new(InMemoryClip::new("two.ogg", b"2".to_vec())),
        ];
        let report = store
            .add_clips(&board.id, sources.iter().map(|s| s.as_ref()))
            .unwrap();

        let added = report.added.iter().map(|c| c.name.as_str()).collect::<Vec<_>>();
        assert_eq!(added, vec!["one.mp3", "two.ogg"]);
        let skipped = report
            .skipped
            .iter()
            .map(|c| c.file_name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(skipped, vec!["missing.wav", "empty.wav"]);

        let stored = persisted(&kv);
        let names = stored.soundboards[0]
            .clips
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["one.mp3", "two.ogg"]);
    }

    #[test]
    fn ids_stay_unique_across_operations() {
        let (_kv, mut store) = open_shared();
        let mut board_ids = Vec::new();
        for i in 0..20 {
            board_ids.push(store.create_soundboard(Some(format!("Board {i}").as_str())).unwrap().id);
        }
        for id in &board_ids[..5] {
            for round in 0..3 {
                let batch = (0..4)
                    .map(|n| InMemoryClip::new(format!("{round}-{n}.mp3"), vec![n as u8 + 1]))
                    .collect::<Vec<_>>();
                store.add_clips(id, batch).unwrap();
            }
        }

        let unique_boards = store.soundboards().iter().map(|b| &b.id).collect::<HashSet<_>>();
        assert_eq!(unique_boards.len(), 20);
        for board in store.soundboards() {
            let unique_clips = board.clips.iter().map(|c| &c.id).collect::<HashSet<_>>();
            assert_eq!(unique_clips.len(), board.clips.len());
        }
        assert_eq!(store.soundboard(&board_ids[0]).unwrap().clips.len(), 12);
    }

    #[test]
    fn select_sets_clears_and_rejects_unknown() {
        let (kv, mut store) = open_shared();
        let board = store.create_soundboard(Some("Memes")).unwrap();

        store.select(Some(board.id.as_str())).unwrap();
        assert_eq!(store.selected_soundboard().map(|b| b.id.as_str()), Some(board.id.as_str()));
        assert_eq!(persisted(&kv).selected_soundboard_id.as_deref(), Some(board.id.as_str()));

        let err = store.select(Some("missing")).unwrap_err();
        assert!(matches!(err, StoreError::SoundboardNotFound { .. }));
        assert_eq!(store.state().selected_soundboard_id.as_deref(), Some(board.id.as_str()));

        store.select(None).unwrap();
        assert!(store.selected_soundboard().is_none());
        assert!(persisted(&kv).selected_soundboard_id.is_none());
    }

    #[test]
    fn stale_selection_from_storage_resolves_to_none() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        kv.set(
            DEFAULT_STATE_KEY,
            br#"{"soundboards":[{"id":"a","name":"A","clips":[]}],"selectedSoundboardId":"deleted"}"#,
        )
        .unwrap();

        let store = SoundboardStore::open(kv).unwrap();
        assert_eq!(store.state().selected_soundboard_id.as_deref(), Some("deleted"));
        assert!(store.selected_soundboard().is_none());
    }

    #[test]
    fn corrupt_storage_opens_empty() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        kv.set(DEFAULT_STATE_KEY, b"\xff\xfe garbage").unwrap();
        let store = SoundboardStore::open(kv).unwrap();
        assert_eq!(store.state(), &AppState::default());
    }

    #[test]
    fn custom_key_is_used() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let store = SoundboardStore::open_with_key(kv.clone(), "other").unwrap();
        assert_eq!(store.key(), "other");
        assert!(kv.get("other").unwrap().is_some());
        assert!(kv.get(DEFAULT_STATE_KEY).unwrap().is_none());
    }

    #[test]
    fn failed_writes_roll_back_memory() {
        let kv = Arc::new(FlakyStore::default());
        let mut store = SoundboardStore::open(kv.clone()).unwrap();
        let board = store.create_soundboard(Some("Keep")).unwrap();
        kv.fail_writes.store(true, Ordering::Relaxed);

        let err = store.create_soundboard(Some("Lost")).unwrap_err();
        assert!(matches!(err, StoreError::Storage(_)));
        assert!(!err.is_notice());
        assert_eq!(store.soundboards().len(), 1);

        assert!(store
            .add_clips(&board.id, [InMemoryClip::new("a.mp3", b"a".to_vec())])
            .is_err());
        assert!(store.soundboard(&board.id).unwrap().clips.is_empty());

        assert!(store.select(Some(board.id.as_str())).is_err());
        assert!(store.state().selected_soundboard_id.is_none());
    }
}
