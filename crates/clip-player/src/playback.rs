//! Output stage: the CPAL stream and its real-time callback.
//!
//! The callback refills a small local buffer from the [`SampleQueue`] without blocking,
//! maps source channels onto the device layout, and converts to the device sample
//! format. Anything it cannot fill is written as silence.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Result, anyhow};
use cpal::traits::DeviceTrait;

use crate::queue::{PopStrategy, SampleQueue};

#[derive(Clone, Debug)]
pub struct OutputConfig {
    /// Max frames pulled from the queue per refill.
    pub refill_max_frames: usize,
    /// While raised the callback writes silence and leaves the queue alone.
    pub silenced: Arc<AtomicBool>,
}

/// Build an output stream playing `queue`, which must already be at the device rate.
pub fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    queue: &Arc<SampleQueue>,
    cfg: OutputConfig,
) -> Result<cpal::Stream> {
    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, queue, cfg),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, queue, cfg),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, queue, cfg),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, queue, cfg),
        other => Err(anyhow!("unsupported sample format: {other:?}")),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    queue: &Arc<SampleQueue>,
    cfg: OutputConfig,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels_out = (config.channels as usize).max(1);
    let refill_max_frames = cfg.refill_max_frames.max(1);
    let silenced = cfg.silenced;
    let queue_cb = queue.clone();
    let mut cursor = FrameCursor::new(queue.channels());

    let err_fn = |err| tracing::warn!("stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            let silence = <T as cpal::Sample>::from_sample::<f32>(0.0);
            if silenced.load(Ordering::Relaxed) {
                data.fill(silence);
                return;
            }
            let mut exhausted = false;
            for frame in data.chunks_mut(channels_out) {
                if !exhausted && cursor.is_empty() {
                    match queue_cb.pop(PopStrategy::NonBlocking {
                        max_frames: refill_max_frames,
                    }) {
                        Some(samples) => cursor.refill(samples),
                        None => exhausted = true,
                    }
                }
                if exhausted {
                    frame.fill(silence);
                    continue;
                }
                for (ch, out) in frame.iter_mut().enumerate() {
                    *out = <T as cpal::Sample>::from_sample::<f32>(
                        cursor.sample_for(ch, channels_out),
                    );
                }
                cursor.advance();
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

/// Read position inside the last chunk taken from the queue.
struct FrameCursor {
    src_channels: usize,
    src: Vec<f32>,
    pos: usize,
}

impl FrameCursor {
    fn new(src_channels: usize) -> Self {
        Self {
            src_channels: src_channels.max(1),
            src: Vec::new(),
            pos: 0,
        }
    }

    fn is_empty(&self) -> bool {
        self.pos + self.src_channels > self.src.len()
    }

    fn refill(&mut self, samples: Vec<f32>) {
        self.src = samples;
        self.pos = 0;
    }

    fn advance(&mut self) {
        self.pos += self.src_channels;
    }

    /// Output sample for `dst_ch` of the current frame.
    ///
    /// Mono is duplicated to every output channel, stereo is averaged down to mono, and
    /// other layouts map channel by channel, repeating the last source channel.
    fn sample_for(&self, dst_ch: usize, dst_channels: usize) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let frame = &self.src[self.pos..self.pos + self.src_channels];
        match (self.src_channels, dst_channels) {
            (2, 1) => 0.5 * (frame[0] + frame[1]),
            (1, _) => frame[0],
            (src, _) => frame[dst_ch.min(src - 1)],
        }
    }
}
