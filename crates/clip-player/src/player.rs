//! One live playback handle per clip.
//!
//! Handles are created on first play and kept in a map keyed by clip id. Playing a clip
//! that still has a handle seeks that handle back to zero and plays it again, so rapid
//! presses restart the sound rather than stacking copies of it. When a handle reports
//! that it ended, its entry is removed and the next play starts fresh.
//!
//! Every start or restart gets a new session number. End reports carry the session they
//! belong to, and a report for a session that has since been restarted is ignored: the
//! restarted playback is still running. A session that goes away without reporting, for
//! instance because its thread panicked, reports `Failed` when its [`EndSignal`] drops.

use std::collections::HashMap;
use std::thread;

use anyhow::Result;
use crossbeam_channel::{Receiver, Sender};
use soundboard_types::AudioData;

/// Why a playback session ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlaybackEnd {
    /// The clip played to its end.
    Finished,
    /// The clip could not be decoded or played.
    Failed(String),
}

/// End report sent by a backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaybackEvent {
    pub clip_id: String,
    pub session: u64,
    pub end: PlaybackEnd,
}

/// Single-use notifier handed to a backend for one session.
///
/// Dropping it unused reports [`PlaybackEnd::Failed`]; a session stopped on purpose
/// consumes it with [`EndSignal::cancelled`].
#[derive(Debug)]
pub struct EndSignal {
    tx: Option<Sender<PlaybackEvent>>,
    clip_id: String,
    session: u64,
}

impl EndSignal {
    /// Report that the session played to its end.
    pub fn finished(mut self) {
        self.send(PlaybackEnd::Finished);
    }

    /// Report that the session failed.
    pub fn failed(mut self, reason: impl Into<String>) {
        self.send(PlaybackEnd::Failed(reason.into()));
    }

    /// Consume without reporting, for a session stopped by a restart or a dropped handle.
    pub fn cancelled(mut self) {
        self.tx = None;
    }

    fn send(&mut self, end: PlaybackEnd) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        // The player owns the receiver; a failed send only means it is gone.
        let _ = tx.send(PlaybackEvent {
            clip_id: std::mem::take(&mut self.clip_id),
            session: self.session,
            end,
        });
    }
}

impl Drop for EndSignal {
    fn drop(&mut self) {
        if self.tx.is_none() {
            return;
        }
        let reason = if thread::panicking() {
            "playback thread panicked"
        } else {
            "playback ended without a report"
        };
        self.send(PlaybackEnd::Failed(reason.to_string()));
    }
}

/// Audio output used by [`ClipPlayer`].
pub trait PlaybackBackend {
    /// Live playback of one clip.
    type Handle;

    /// Create a handle for `audio` and start playing it from the beginning.
    ///
    /// `on_end` must be used once the session ends on its own. When the session is
    /// restarted or the handle is dropped, consume it with [`EndSignal::cancelled`]; a
    /// signal dropped unused reports a failure, which the player ignores for superseded
    /// sessions.
    fn start(&mut self, clip_id: &str, audio: &AudioData, on_end: EndSignal)
    -> Result<Self::Handle>;

    /// Move `handle` back to position zero and play it again.
    fn restart(&mut self, handle: &mut Self::Handle, on_end: EndSignal) -> Result<()>;
}

struct ActiveClip<H> {
    handle: H,
    session: u64,
}

/// Plays clips by id, restarting a clip that is pressed again while still sounding.
pub struct ClipPlayer<B: PlaybackBackend> {
    backend: B,
    active: HashMap<String, ActiveClip<B::Handle>>,
    next_session: u64,
    events_tx: Sender<PlaybackEvent>,
    events_rx: Receiver<PlaybackEvent>,
}

impl<B: PlaybackBackend> ClipPlayer<B> {
    pub fn new(backend: B) -> Self {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        Self {
            backend,
            active: HashMap::new(),
            next_session: 0,
            events_tx,
            events_rx,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Play `audio` under `clip_id`.
    ///
    /// Reuses the clip's handle when it has one, restarting it from zero. If the backend
    /// fails, no handle is kept for the clip and the error is returned.
    pub fn play(&mut self, clip_id: &str, audio: &AudioData) -> Result<()> {
        self.drain_events();

        self.next_session += 1;
        let session = self.next_session;
        let on_end = EndSignal {
            tx: Some(self.events_tx.clone()),
            clip_id: clip_id.to_string(),
            session,
        };

        if let Some(active) = self.active.get_mut(clip_id) {
            if let Err(e) = self.backend.restart(&mut active.handle, on_end) {
                self.active.remove(clip_id);
                return Err(e);
            }
            active.session = session;
            tracing::debug!(clip = %clip_id, session, "restarted clip");
            return Ok(());
        }

        let handle = self.backend.start(clip_id, audio, on_end)?;
        self.active
            .insert(clip_id.to_string(), ActiveClip { handle, session });
        tracing::debug!(clip = %clip_id, session, "started clip");
        Ok(())
    }

    /// Apply an end report. Returns `true` if it removed a handle.
    pub fn handle_event(&mut self, event: &PlaybackEvent) -> bool {
        let current = self
            .active
            .get(&event.clip_id)
            .map(|active| active.session == event.session)
            .unwrap_or(false);
        if !current {
            tracing::trace!(clip = %event.clip_id, session = event.session, "ignoring stale end report");
            return false;
        }

        self.active.remove(&event.clip_id);
        match &event.end {
            PlaybackEnd::Finished => {
                tracing::debug!(clip = %event.clip_id, session = event.session, "clip finished")
            }
            PlaybackEnd::Failed(reason) => {
                tracing::warn!(clip = %event.clip_id, session = event.session, "clip playback failed: {reason}")
            }
        }
        true
    }

    /// Apply every end report received so far. Returns how many removed a handle.
    pub fn drain_events(&mut self) -> usize {
        let mut removed = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            if self.handle_event(&event) {
                removed += 1;
            }
        }
        removed
    }

    /// Block until no clip is playing. Returns the end reports that removed a handle.
    pub fn wait_idle(&mut self) -> Vec<PlaybackEvent> {
        let mut ended = Vec::new();
        while !self.active.is_empty() {
            let Ok(event) = self.events_rx.recv() else {
                break;
            };
            if self.handle_event(&event) {
                ended.push(event);
            }
        }
        ended
    }

    /// Receiver of end reports, for callers that multiplex it with other channels.
    ///
    /// Reports taken from it must be passed to [`ClipPlayer::handle_event`].
    pub fn events(&self) -> &Receiver<PlaybackEvent> {
        &self.events_rx
    }

    pub fn is_active(&self, clip_id: &str) -> bool {
        self.active.contains_key(clip_id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn handle(&self, clip_id: &str) -> Option<&B::Handle> {
        self.active.get(clip_id).map(|active| &active.handle)
    }

    /// Drop every handle, stopping whatever is still playing.
    pub fn stop_all(&mut self) {
        self.active.clear();
        while self.events_rx.try_recv().is_ok() {}
    }
}
