/// Tuning for the decode, resample and output stages of a clip.
#[derive(Clone, Debug, PartialEq)]
pub struct PlaybackConfig {
    /// Resampler chunk size in frames.
    pub chunk_frames: usize,
    /// Max frames pulled per output callback refill.
    pub refill_max_frames: usize,
    /// Decoded audio kept ahead of the device, used to size the queues.
    pub buffer_seconds: f32,
    /// Preferred device buffer in frames. Clamped to what the device supports.
    pub output_buffer_frames: Option<u32>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            chunk_frames: 1024,
            refill_max_frames: 4096,
            buffer_seconds: 2.0,
            output_buffer_frames: Some(1024),
        }
    }
}
