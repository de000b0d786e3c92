//! Configuration loading and resolution.
//!
//! Every setting can come from a CLI flag, the TOML config file, or a built-in default,
//! in that order.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clip_player::PlaybackConfig;
use serde::Deserialize;
use soundboard_store::DEFAULT_STATE_KEY;

use crate::cli::GlobalArgs;

/// Data directory used when neither a flag nor the config file names one.
pub const DEFAULT_DATA_DIR: &str = ".soundboard";
/// Config file looked up inside the data directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Config file schema. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SoundboardConfig {
    /// Directory holding the persisted state.
    pub data_dir: Option<PathBuf>,
    /// Key the state is stored under.
    pub storage_key: Option<String>,
    pub playback: Option<PlaybackSection>,
}

/// `[playback]` table.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlaybackSection {
    /// Output device substring.
    pub device: Option<String>,
    pub chunk_frames: Option<usize>,
    pub refill_max_frames: Option<usize>,
    pub buffer_seconds: Option<f32>,
    pub output_buffer_frames: Option<u32>,
}

impl SoundboardConfig {
    /// Load configuration from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        Self::parse(&raw).with_context(|| format!("parse config {:?}", path))
    }

    fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str::<SoundboardConfig>(raw)?)
    }
}

/// Settings after applying flags, config file and defaults.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub storage_key: String,
    pub device: Option<String>,
    pub playback: PlaybackConfig,
}

impl Settings {
    /// Resolve settings for `args`, reading the config file if one applies.
    ///
    /// An explicit `--config` must exist. Otherwise `<data-dir>/config.toml` is used when
    /// present, where the data dir is the flag value or the default.
    pub fn from_args(args: &GlobalArgs) -> Result<Self> {
        let file = match &args.config {
            Some(path) => Some(SoundboardConfig::load(path)?),
            None => {
                let dir = args
                    .data_dir
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
                let implicit = dir.join(CONFIG_FILE_NAME);
                if implicit.is_file() {
                    tracing::debug!(path = %implicit.display(), "using config");
                    Some(SoundboardConfig::load(&implicit)?)
                } else {
                    None
                }
            }
        };
        Ok(Self::resolve(args, file.unwrap_or_default()))
    }

    fn resolve(args: &GlobalArgs, file: SoundboardConfig) -> Self {
        let defaults = PlaybackConfig::default();
        let section = file.playback.unwrap_or_default();

        let storage_key = file
            .storage_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .unwrap_or_else(|| DEFAULT_STATE_KEY.to_string());

        Self {
            data_dir: args
                .data_dir
                .clone()
                .or(file.data_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            storage_key,
            device: args
                .device
                .clone()
                .or(section.device)
                .filter(|device| !device.trim().is_empty()),
            playback: PlaybackConfig {
                chunk_frames: section.chunk_frames.unwrap_or(defaults.chunk_frames),
                refill_max_frames: section
                    .refill_max_frames
                    .unwrap_or(defaults.refill_max_frames),
                buffer_seconds: section.buffer_seconds.unwrap_or(defaults.buffer_seconds),
                output_buffer_frames: section
                    .output_buffer_frames
                    .or(defaults.output_buffer_frames),
            },
        }
    }
}
