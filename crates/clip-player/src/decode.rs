//! Decode stage.
//!
//! Clips live in memory as data URIs, so the decoder reads from a byte slice rather than
//! a file. Symphonia probes the container, then a background thread decodes packets into
//! interleaved `f32` samples and pushes them into a bounded [`SampleQueue`].

use std::io::Cursor;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result, anyhow};
use symphonia::core::audio::{SampleBuffer, SignalSpec};
use symphonia::core::codecs::{CodecParameters, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::queue::{ProducerGuard, SampleQueue, calc_max_buffered_samples};

/// A clip whose decode thread is running.
pub struct ClipStream {
    /// Source rate and channel layout.
    pub spec: SignalSpec,
    /// Decoded samples; closed at end of stream, failed on a decode error or panic.
    pub queue: Arc<SampleQueue>,
    pub duration_ms: Option<u64>,
    pub codec: Option<String>,
}

/// Probe `bytes` and start decoding them on a background thread.
///
/// `extension` is a container hint such as `"mp3"`; probing still works without it.
pub fn start_clip_decode(
    bytes: Arc<[u8]>,
    extension: Option<&str>,
    buffer_seconds: f32,
) -> Result<ClipStream> {
    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .context("unrecognized audio format")?;
    let format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| anyhow!("no default audio track"))?;
    let track_id = track.id;
    let codec_params: CodecParameters = track.codec_params.clone();

    let layout = codec_params
        .channels
        .ok_or_else(|| anyhow!("unknown channel layout"))?;
    let rate = codec_params
        .sample_rate
        .ok_or_else(|| anyhow!("unknown sample rate"))?;
    let spec = SignalSpec::new(rate, layout);
    let channels = layout.count();

    let duration_ms = duration_ms_from_codec_params(&codec_params);
    let codec = codec_name_from_params(&codec_params);

    let queue = Arc::new(SampleQueue::new(
        channels,
        calc_max_buffered_samples(rate, channels, buffer_seconds),
    ));

    let queue_for_thread = queue.clone();
    thread::spawn(move || {
        let _guard = ProducerGuard::new(queue_for_thread.clone());
        if let Err(e) = decode_format_loop(format, track_id, &codec_params, &queue_for_thread) {
            tracing::warn!("decoder thread error: {e:#}");
            queue_for_thread.fail(format!("decode: {e:#}"));
        }
    });

    Ok(ClipStream {
        spec,
        queue,
        duration_ms,
        codec,
    })
}

/// Decode every packet of the default track into `queue`.
///
/// Stops early once the queue is closed by the consumer.
fn decode_format_loop(
    mut format: Box<dyn FormatReader>,
    track_id: u32,
    codec_params: &CodecParameters,
    queue: &SampleQueue,
) -> Result<()> {
    let mut decoder =
        symphonia::default::get_codecs().make(codec_params, &DecoderOptions::default())?;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::debug!("skipping undecodable packet: {e}");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let mut sample_buf = SampleBuffer::<f32>::new(decoded.frames() as u64, *decoded.spec());
        sample_buf.copy_interleaved_ref(decoded);

        if !queue.push_interleaved_blocking(sample_buf.samples()) {
            break;
        }
    }

    Ok(())
}

/// Duration from container metadata, if it declares a frame count.
fn duration_ms_from_codec_params(codec_params: &CodecParameters) -> Option<u64> {
    let frames = codec_params.n_frames?;
    let rate = codec_params.sample_rate? as u64;
    if rate == 0 {
        return None;
    }
    Some(frames.saturating_mul(1000) / rate)
}

fn codec_name_from_params(params: &CodecParameters) -> Option<String> {
    use symphonia::core::codecs::*;
    let name = match params.codec {
        CODEC_TYPE_FLAC => "FLAC",
        CODEC_TYPE_MP3 => "MP3",
        CODEC_TYPE_AAC => "AAC",
        CODEC_TYPE_ALAC => "ALAC",
        CODEC_TYPE_VORBIS => "VORBIS",
        CODEC_TYPE_OPUS => "OPUS",
        CODEC_TYPE_PCM_S16LE | CODEC_TYPE_PCM_S16BE => "PCM_S16",
        CODEC_TYPE_PCM_S24LE | CODEC_TYPE_PCM_S24BE => "PCM_S24",
        CODEC_TYPE_PCM_F32LE | CODEC_TYPE_PCM_F32BE => "PCM_F32",
        CODEC_TYPE_PCM_U8 => "PCM_U8",
        _ => return None,
    };
    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::PopStrategy;
    use symphonia::core::codecs::*;

    /// Minimal 16-bit PCM WAV holding `frames` frames of a constant value.
    fn wav_bytes(rate: u32, channels: u16, frames: u32) -> Vec<u8> {
        let block_align = channels as u32 * 2;
        let data_len = frames * block_align;
        let mut out = Vec::with_capacity(44 + data_len as usize);
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVEfmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&rate.to_le_bytes());
        out.extend_from_slice(&(rate * block_align).to_le_bytes());
        out.extend_from_slice(&(block_align as u16).to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        for _ in 0..frames * channels as u32 {
            out.extend_from_slice(&8192i16.to_le_bytes());
        }
        out
    }

    #[test]
    fn decodes_wav_from_memory() {
        let bytes: Arc<[u8]> = wav_bytes(8_000, 2, 800).into();
        let stream = start_clip_decode(bytes, Some("wav"), 1.0).unwrap();

        assert_eq!(stream.spec.rate, 8_000);
        assert_eq!(stream.spec.channels.count(), 2);
        assert_eq!(stream.duration_ms, Some(100));
        assert_eq!(stream.codec.as_deref(), Some("PCM_S16"));

        let mut frames = 0;
        while let Some(chunk) = stream.queue.pop(PopStrategy::BlockingUpTo { max_frames: 256 }) {
            assert!(chunk.iter().all(|s| (*s - 0.25).abs() < 1e-3));
            frames += chunk.len() / 2;
        }
        assert_eq!(frames, 800);
    }

    #[test]
    fn probes_without_extension_hint() {
        let bytes: Arc<[u8]> = wav_bytes(22_050, 1, 10).into();
        let stream = start_clip_decode(bytes, None, 1.0).unwrap();
        assert_eq!(stream.spec.rate, 22_050);
    }

    #[test]
    fn rejects_bytes_that_are_not_audio() {
        let bytes: Arc<[u8]> = Arc::from(&b"definitely not audio"[..]);
        assert!(start_clip_decode(bytes, Some("mp3"), 1.0).is_err());
    }

    #[test]
    fn duration_ms_from_codec_params_handles_zero_rate() {
        let mut params = CodecParameters::new();
        params.sample_rate = Some(0);
        params.n_frames = Some(100);
        assert!(duration_ms_from_codec_params(&params).is_none());
    }

    #[test]
    fn codec_name_from_params_maps_known_codecs() {
        let mut params = CodecParameters::new();
        params.codec = CODEC_TYPE_MP3;
        assert_eq!(codec_name_from_params(&params), Some("MP3".to_string()));
        params.codec = CODEC_TYPE_NULL;
        assert!(codec_name_from_params(&params).is_none());
    }
}
