//! Clip playback for soundboards.
//!
//! [`ClipPlayer`] keeps at most one live handle per clip id: playing a clip that is
//! already sounding restarts it from the beginning instead of layering a second copy.
//! The audio work itself sits behind [`PlaybackBackend`]; [`CpalBackend`] decodes the
//! clip's stored data URI with Symphonia and plays it on a CPAL output device.

pub mod config;
pub mod cpal_backend;
pub mod decode;
pub mod device;
pub mod pipeline;
pub mod playback;
pub mod player;
pub mod queue;
pub mod resample;

pub use config::PlaybackConfig;
pub use cpal_backend::{CpalBackend, CpalHandle};
pub use player::{ClipPlayer, EndSignal, PlaybackBackend, PlaybackEnd, PlaybackEvent};
