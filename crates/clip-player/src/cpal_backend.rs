//! [`PlaybackBackend`] playing clips on a CPAL output device.
//!
//! Each handle owns at most one session thread. A session decodes the clip bytes from
//! memory, opens an output stream and plays until the clip ends or the session is
//! cancelled. Restarting cancels the running session, joins it, and starts a new one
//! from the first sample.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use soundboard_types::AudioData;

use crate::config::PlaybackConfig;
use crate::pipeline::SessionOutcome;
use crate::player::{EndSignal, PlaybackBackend};
use crate::{decode, device, pipeline};

/// Plays clips on the default output device or the first one matching a name.
#[derive(Clone, Debug)]
pub struct CpalBackend {
    device: Option<String>,
    playback: PlaybackConfig,
}

impl CpalBackend {
    pub fn new(device: Option<String>, playback: PlaybackConfig) -> Self {
        Self { device, playback }
    }

    fn spawn_session(&self, handle: &mut CpalHandle, on_end: EndSignal) -> Result<()> {
        cancel_session(&mut handle.session);

        let cancel = Arc::new(AtomicBool::new(false));
        let cancel_for_thread = cancel.clone();
        let device = self.device.clone();
        let playback = self.playback.clone();
        let bytes = handle.bytes.clone();
        let extension = handle.extension;
        let clip_id = handle.clip_id.clone();

        let join = std::thread::Builder::new()
            .name(format!("clip-{clip_id}"))
            .spawn(move || {
                let result = play_clip(
                    device.as_deref(),
                    &playback,
                    bytes,
                    extension,
                    &cancel_for_thread,
                );
                match result {
                    Ok(SessionOutcome::Finished) => on_end.finished(),
                    Ok(SessionOutcome::Cancelled) => on_end.cancelled(),
                    Err(_) if cancel_for_thread.load(Ordering::Relaxed) => on_end.cancelled(),
                    Err(e) => {
                        tracing::warn!(clip = %clip_id, "clip playback error: {e:#}");
                        on_end.failed(format!("{e:#}"));
                    }
                }
            })
            .context("spawn clip session thread")?;

        handle.session = Some(Session { cancel, join });
        Ok(())
    }
}

impl PlaybackBackend for CpalBackend {
    type Handle = CpalHandle;

    fn start(&mut self, clip_id: &str, audio: &AudioData, on_end: EndSignal) -> Result<CpalHandle> {
        let decoded = audio
            .decode()
            .with_context(|| format!("read audio data of clip {clip_id}"))?;
        let mut handle = CpalHandle {
            clip_id: clip_id.to_string(),
            extension: decoded.extension_hint(),
            bytes: Arc::from(decoded.bytes),
            session: None,
        };
        self.spawn_session(&mut handle, on_end)?;
        Ok(handle)
    }

    fn restart(&mut self, handle: &mut CpalHandle, on_end: EndSignal) -> Result<()> {
        self.spawn_session(handle, on_end)
    }
}

/// Decoded clip bytes plus the session currently playing them.
pub struct CpalHandle {
    clip_id: String,
    bytes: Arc<[u8]>,
    extension: Option<&'static str>,
    session: Option<Session>,
}

impl Drop for CpalHandle {
    fn drop(&mut self) {
        cancel_session(&mut self.session);
    }
}

struct Session {
    cancel: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

/// Cancel the running session, if any, and wait for its thread.
fn cancel_session(session: &mut Option<Session>) {
    if let Some(sess) = session.take() {
        sess.cancel.store(true, Ordering::Relaxed);
        let _ = sess.join.join();
    }
}

/// Open the output device, decode the clip and play it through.
fn play_clip(
    device_needle: Option<&str>,
    playback: &PlaybackConfig,
    bytes: Arc<[u8]>,
    extension: Option<&str>,
    cancel: &Arc<AtomicBool>,
) -> Result<SessionOutcome> {
    let host = cpal::default_host();
    let device = device::pick_device(&host, device_needle)?;

    let clip = decode::start_clip_decode(bytes, extension, playback.buffer_seconds)?;
    let config = match device::pick_output_config(&device, Some(clip.spec.rate)) {
        Ok(config) => config,
        Err(e) => {
            clip.queue.close();
            return Err(e);
        }
    };
    let mut stream_config: cpal::StreamConfig = config.clone().into();
    if let Some(buffer_size) = device::pick_buffer_size(&config, playback.output_buffer_frames) {
        stream_config.buffer_size = buffer_size;
    }

    tracing::debug!(
        rate_hz = stream_config.sample_rate,
        channels = stream_config.channels,
        codec = clip.codec.as_deref().unwrap_or("unknown"),
        duration_ms = clip.duration_ms.unwrap_or(0),
        "clip session started"
    );

    pipeline::play_clip_stream(&device, &config, &stream_config, playback, clip, cancel)
}
