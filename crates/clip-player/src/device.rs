//! Output device discovery and selection.

use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait};

/// Pick the first output device whose name contains `needle` (case-insensitive), or the
/// host default when no needle is given.
pub fn pick_device(host: &cpal::Host, needle: Option<&str>) -> Result<cpal::Device> {
    if let Some(needle) = needle.filter(|n| !n.trim().is_empty()) {
        let mut devices = host.output_devices().context("no output devices")?;
        return devices
            .find(|d| {
                device_name(d)
                    .map(|name| matches_device_name(&name, needle))
                    .unwrap_or(false)
            })
            .ok_or_else(|| anyhow!("no output device matched: {needle}"));
    }

    host.default_output_device()
        .ok_or_else(|| anyhow!("no default output device"))
}

/// Names of every output device on the host, in host order.
pub fn output_device_names(host: &cpal::Host) -> Result<Vec<String>> {
    let devices = host.output_devices().context("no output devices")?;
    Ok(devices
        .map(|d| device_name(&d).unwrap_or_else(|| "<unnamed device>".to_string()))
        .collect())
}

/// Name of the host's default output device, if there is one.
pub fn default_device_name(host: &cpal::Host) -> Option<String> {
    host.default_output_device().as_ref().and_then(device_name)
}

fn device_name(device: &cpal::Device) -> Option<String> {
    device
        .description()
        .ok()
        .map(|desc| desc.name().to_string())
}

/// Pick an output config for a clip at `target_rate`.
///
/// Prefers the clip's own rate when a range allows it, so no resampling is needed.
/// Otherwise the highest rate not above the target wins, then the lowest one above it.
/// Ties go to the better sample format.
pub fn pick_output_config(
    device: &cpal::Device,
    target_rate: Option<u32>,
) -> Result<cpal::SupportedStreamConfig> {
    let mut best: Option<(Candidate, cpal::SupportedStreamConfig)> = None;

    for range in device.supported_output_configs()? {
        let rate = pick_rate_for_range(range.min_sample_rate(), range.max_sample_rate(), target_rate);
        let candidate = Candidate {
            below: target_rate.map(|t| rate <= t).unwrap_or(true),
            rate,
            format_rank: sample_format_rank(range.sample_format()),
        };
        let replace = best
            .as_ref()
            .map(|(current, _)| candidate.is_better_than(current, target_rate))
            .unwrap_or(true);
        if replace {
            best = Some((candidate, range.with_sample_rate(rate)));
        }
    }

    best.map(|(_, cfg)| cfg)
        .ok_or_else(|| anyhow!("no supported output configs"))
}

/// Fixed device buffer near `preferred_frames`, or `None` to let CPAL decide.
pub fn pick_buffer_size(
    config: &cpal::SupportedStreamConfig,
    preferred_frames: Option<u32>,
) -> Option<cpal::BufferSize> {
    let preferred = preferred_frames?;
    match config.buffer_size() {
        cpal::SupportedBufferSize::Range { min, max } => {
            Some(cpal::BufferSize::Fixed(preferred.clamp(*min, (*max).max(*min))))
        }
        cpal::SupportedBufferSize::Unknown => None,
    }
}

#[derive(Clone, Copy, Debug)]
struct Candidate {
    below: bool,
    rate: u32,
    format_rank: u8,
}

impl Candidate {
    fn is_better_than(&self, other: &Candidate, target_rate: Option<u32>) -> bool {
        if self.below != other.below {
            return self.below;
        }
        if self.rate != other.rate {
            // Below the target: closer from beneath. Above it: closer from above.
            return if self.below || target_rate.is_none() {
                self.rate > other.rate
            } else {
                self.rate < other.rate
            };
        }
        self.format_rank < other.format_rank
    }
}

fn pick_rate_for_range(min: u32, max: u32, target_rate: Option<u32>) -> u32 {
    match target_rate {
        Some(target) => target.clamp(min, max.max(min)),
        None => max,
    }
}

fn sample_format_rank(format: cpal::SampleFormat) -> u8 {
    match format {
        cpal::SampleFormat::F32 => 0,
        cpal::SampleFormat::I32 => 1,
        cpal::SampleFormat::I16 => 2,
        cpal::SampleFormat::U16 => 3,
        _ => 10,
    }
}

fn matches_device_name(name: &str, needle: &str) -> bool {
    let needle = needle.trim();
    if needle.is_empty() {
        return false;
    }
    name.to_lowercase().contains(&needle.to_lowercase())
}
