//! Resample stage.
//!
//! Clips are usually recorded at 44.1 or 48 kHz, and the output device rarely matches
//! every one of them. When the rates differ, a rubato sinc resampler runs on its own thread
//! between the decode queue and the output queue.

use std::sync::Arc;
use std::thread;

use anyhow::{Result, anyhow};
use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{
    Async, FixedAsync, Indexing, Resampler, SincInterpolationParameters, SincInterpolationType,
    WindowFunction, calculate_cutoff,
};
use symphonia::core::audio::SignalSpec;

use crate::queue::{PopStrategy, ProducerGuard, SampleQueue, calc_max_buffered_samples};

#[derive(Clone, Copy, Debug)]
pub struct ResampleConfig {
    /// Input chunk size in frames.
    pub chunk_frames: usize,
    /// Buffering of the output queue, in seconds.
    pub buffer_seconds: f32,
}

/// Start a resampler thread converting `srcq` from `src_spec.rate` to `dst_rate`.
///
/// The returned queue is closed once `srcq` is closed and drained, or as soon as either
/// queue is closed by the consumer side. If resampling fails the returned queue is
/// failed with the reason.
pub fn start_resampler(
    srcq: Arc<SampleQueue>,
    src_spec: SignalSpec,
    dst_rate: u32,
    cfg: ResampleConfig,
) -> Result<Arc<SampleQueue>> {
    let src_rate = src_spec.rate;
    if src_rate == 0 || dst_rate == 0 {
        return Err(anyhow!("invalid resample rates {src_rate} -> {dst_rate}"));
    }
    let channels = src_spec.channels.count();

    let dstq = Arc::new(SampleQueue::new(
        channels,
        calc_max_buffered_samples(dst_rate, channels, cfg.buffer_seconds),
    ));

    let f_ratio = dst_rate as f64 / src_rate as f64;
    let sinc_len = 128;
    let window = WindowFunction::BlackmanHarris2;
    let params = SincInterpolationParameters {
        sinc_len,
        f_cutoff: calculate_cutoff(sinc_len, window),
        interpolation: SincInterpolationType::Cubic,
        oversampling_factor: 256,
        window,
    };
    let chunk_in_frames = cfg.chunk_frames.max(1);

    let dstq_thread = dstq.clone();
    thread::spawn(move || {
        let _guard = ProducerGuard::new(dstq_thread.clone());
        let resampler = match Async::<f32>::new_sinc(
            f_ratio,
            1.1,
            &params,
            chunk_in_frames,
            channels,
            FixedAsync::Input,
        ) {
            Ok(r) => Box::new(r) as Box<dyn Resampler<f32>>,
            Err(e) => {
                tracing::warn!("resampler init error: {e:#}");
                srcq.close();
                dstq_thread.fail(format!("resampler init: {e}"));
                return;
            }
        };

        // Upsampling by a large ratio yields many output frames per input chunk.
        let out_frames = resampler.output_frames_max();
        let mut stage = ResampleStage {
            resampler,
            channels,
            out_interleaved: vec![0.0f32; channels * out_frames],
            indexing: Indexing {
                input_offset: 0,
                output_offset: 0,
                active_channels_mask: None,
                partial_len: None,
            },
        };
        if let Err(e) = stage.run(&srcq, &dstq_thread, chunk_in_frames) {
            tracing::warn!("resampler error: {e:#}");
            srcq.close();
            dstq_thread.fail(format!("{e:#}"));
        }
    });

    Ok(dstq)
}

struct ResampleStage {
    resampler: Box<dyn Resampler<f32>>,
    channels: usize,
    out_interleaved: Vec<f32>,
    indexing: Indexing,
}

impl ResampleStage {
    fn run(&mut self, srcq: &SampleQueue, dstq: &SampleQueue, chunk_in_frames: usize) -> Result<()> {
        // Full chunks while the decoder keeps up, then whatever partial tail is left.
        while let Some(chunk) = srcq.pop(PopStrategy::BlockingExact {
            frames: chunk_in_frames,
        }) {
            if !self.process(&chunk, None, dstq)? {
                srcq.close();
                return Ok(());
            }
        }

        while let Some(tail) = srcq.pop(PopStrategy::BlockingUpTo {
            max_frames: chunk_in_frames,
        }) {
            let tail_frames = tail.len() / self.channels;
            if !self.process(&tail, Some(tail_frames), dstq)? {
                return Ok(());
            }
        }
        Ok(())
    }

    /// Resample one chunk into `dstq`. Returns `false` once `dstq` stops accepting data.
    fn process(&mut self, input: &[f32], partial_len: Option<usize>, dstq: &SampleQueue) -> Result<bool> {
        let channels = self.channels;
        let in_frames = input.len() / channels;
        let input_adapter = InterleavedSlice::new(input, channels, in_frames)
            .map_err(|e| anyhow!("interleaved input: {e}"))?;

        let out_capacity_frames = self.out_interleaved.len() / channels;
        let mut output_adapter =
            InterleavedSlice::new_mut(&mut self.out_interleaved, channels, out_capacity_frames)
                .map_err(|e| anyhow!("interleaved output: {e}"))?;

        self.indexing.input_offset = 0;
        self.indexing.output_offset = 0;
        self.indexing.partial_len = partial_len;

        let (_nbr_in, nbr_out) = self
            .resampler
            .process_into_buffer(&input_adapter, &mut output_adapter, Some(&self.indexing))
            .map_err(|e| anyhow!("resample: {e}"))?;

        let produced = nbr_out * channels;
        if produced == 0 {
            return Ok(true);
        }
        Ok(dstq.push_interleaved_blocking(&self.out_interleaved[..produced]))
    }
}
