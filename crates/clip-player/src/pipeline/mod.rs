//! Stage wiring for one clip session: optional resampler, output stream, and the wait
//! for the clip to end.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Result, anyhow};
use cpal::traits::StreamTrait;

use crate::config::PlaybackConfig;
use crate::decode::ClipStream;
use crate::queue::SampleQueue;
use crate::{playback, resample};

/// Time left for the device to play its last buffer before the stream is dropped.
const DRAIN_GRACE: Duration = Duration::from_millis(100);

/// How a session stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Every decoded sample reached the device.
    Finished,
    /// `cancel` was raised first.
    Cancelled,
}

/// Play a decoding clip on `device` and block until it finishes or `cancel` is raised.
///
/// A resampler is inserted when the clip rate differs from the stream rate. If the decode
/// or resample stage fails, the session ends with that error once the output drains.
pub fn play_clip_stream(
    device: &cpal::Device,
    config: &cpal::SupportedStreamConfig,
    stream_config: &cpal::StreamConfig,
    playback: &PlaybackConfig,
    clip: ClipStream,
    cancel: &Arc<AtomicBool>,
) -> Result<SessionOutcome> {
    let srcq = clip.queue;
    let dst_rate = stream_config.sample_rate;
    let dstq = if clip.spec.rate == dst_rate {
        tracing::debug!(rate_hz = dst_rate, "resample skipped");
        srcq.clone()
    } else {
        tracing::debug!(from_hz = clip.spec.rate, to_hz = dst_rate, "resampling");
        resample::start_resampler(
            srcq.clone(),
            clip.spec,
            dst_rate,
            resample::ResampleConfig {
                chunk_frames: playback.chunk_frames,
                buffer_seconds: playback.buffer_seconds,
            },
        )?
    };

    let stream = match playback::build_output_stream(
        device,
        stream_config,
        config.sample_format(),
        &dstq,
        playback::OutputConfig {
            refill_max_frames: playback.refill_max_frames,
            silenced: cancel.clone(),
        },
    ) {
        Ok(stream) => stream,
        Err(e) => {
            srcq.close();
            dstq.close();
            return Err(e);
        }
    };
    if let Err(e) = stream.play() {
        srcq.close();
        dstq.close();
        return Err(e.into());
    }

    let outcome = wait_for_clip(&srcq, &dstq, cancel);

    srcq.close();
    dstq.close();
    drop(stream);
    outcome
}

/// Wait for the output queue to drain, then report how the session ended.
fn wait_for_clip(
    srcq: &SampleQueue,
    dstq: &SampleQueue,
    cancel: &AtomicBool,
) -> Result<SessionOutcome> {
    if !dstq.wait_drained_or_cancel(cancel) {
        return Ok(SessionOutcome::Cancelled);
    }
    if let Some(reason) = dstq.failure().or_else(|| srcq.failure()) {
        return Err(anyhow!("clip stream failed: {reason}"));
    }

    thread::sleep(DRAIN_GRACE);
    if cancel.load(Ordering::Relaxed) {
        Ok(SessionOutcome::Cancelled)
    } else {
        Ok(SessionOutcome::Finished)
    }
}
