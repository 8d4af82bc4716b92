//! Mixer operating configuration (§10.3): sample rate, channel count,
//! device buffer size, and the other knobs the core and device layer need
//! to start up. Deliberately narrow — this is not a place for narrative or
//! game data, which stays a host concern.

use std::path::Path;

use serde::Deserialize;

fn default_sample_rate() -> u32 {
    44_100
}

fn default_output_channels() -> u16 {
    2
}

fn default_buffer_frames() -> u32 {
    1024
}

fn default_channel_table_capacity() -> usize {
    8
}

fn default_log_filter() -> String {
    "info".to_string()
}

/// Deserialized as-is from an optional TOML file; every field has a
/// sensible default so a missing or partial file is never an error.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    pub sample_rate: u32,
    pub output_channels: u16,
    pub buffer_frames: u32,
    pub channel_table_capacity: usize,
    pub log_filter: String,
    /// Name of the output device to open, or `None` for the host default.
    pub device_name: Option<String>,
}

impl Default for MixerConfig {
    fn default() -> Self {
        MixerConfig {
            sample_rate: default_sample_rate(),
            output_channels: default_output_channels(),
            buffer_frames: default_buffer_frames(),
            channel_table_capacity: default_channel_table_capacity(),
            log_filter: default_log_filter(),
            device_name: None,
        }
    }
}

impl MixerConfig {
    /// Load from a TOML file, falling back to defaults for any field the
    /// file does not set. Returns `Ok(default())` if the file is absent.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(MixerConfig::default());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}
