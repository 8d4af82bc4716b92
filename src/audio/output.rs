//! Device I/O (§10.4): opens a real output device with `cpal` and drives the
//! mixer core's real-time callback from it.
//!
//! This is the only place in the crate that touches an actual sound card.
//! The core itself (`playback::mixer::mix_into` via `MixerContext::mix_into`)
//! knows nothing about `cpal`, streams, or devices — it just fills a raw
//! `&mut [i16]` buffer, exactly the contract this module's callback closure
//! hands it.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use tracing::{info, warn};

use crate::error::{MixerError, Result};
use crate::state::MixerContext;

/// An open output stream bound to one [`MixerContext`]. Dropping this stops
/// playback and closes the device.
pub struct AudioOutput {
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
}

impl AudioOutput {
    /// Enumerate output device names, for a host's device picker.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host
            .output_devices()
            .map_err(|e| MixerError::Device(format!("failed to enumerate devices: {e}")))?
            .filter_map(|device| device.name().ok())
            .collect();
        Ok(devices)
    }

    /// Open the named device, or the host default if `device_name` is
    /// `None`, negotiating a signed-16-bit stereo stream at `sample_rate`.
    pub fn open(
        device_name: Option<&str>,
        sample_rate: u32,
        channels: u16,
        buffer_frames: u32,
    ) -> Result<Self> {
        let host = cpal::default_host();
        let device = match device_name {
            Some(name) => host
                .output_devices()
                .map_err(|e| MixerError::Device(e.to_string()))?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| MixerError::Device(format!("no such output device: {name}")))?,
            None => host
                .default_output_device()
                .ok_or_else(|| MixerError::Device("no default output device".to_string()))?,
        };

        let config = StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Fixed(buffer_frames),
        };

        info!(
            device = %device.name().unwrap_or_default(),
            sample_rate,
            channels,
            "opened audio output device"
        );

        Ok(AudioOutput {
            device,
            config,
            stream: None,
        })
    }

    /// Start the stream, calling `ctx.mix_into` once per device buffer. The
    /// device is assumed to want signed 16-bit samples (§6.1); other sample
    /// formats are converted from an internal i16 pass.
    pub fn start(&mut self, ctx: Arc<MixerContext>) -> Result<()> {
        let sample_format = self
            .device
            .default_output_config()
            .map_err(|e| MixerError::Device(e.to_string()))?
            .sample_format();

        let err_fn = |err| warn!(%err, "audio output stream error");
        let config = self.config.clone();

        let stream = match sample_format {
            SampleFormat::I16 => self.device.build_output_stream(
                &config,
                move |data: &mut [i16], _| ctx.mix_into(data),
                err_fn,
                None,
            ),
            SampleFormat::F32 => {
                let ctx = ctx.clone();
                // Owned by this closure alone (the audio thread never runs
                // two invocations concurrently); resized only if the host
                // ever calls back with a different buffer length, not on
                // every callback.
                let mut scratch: Vec<i16> = Vec::new();
                self.device.build_output_stream(
                    &config,
                    move |data: &mut [f32], _| {
                        if scratch.len() != data.len() {
                            scratch.resize(data.len(), 0);
                        }
                        ctx.mix_into(&mut scratch);
                        for (out, sample) in data.iter_mut().zip(scratch.iter()) {
                            *out = *sample as f32 / 32768.0;
                        }
                    },
                    err_fn,
                    None,
                )
            }
            other => {
                return Err(MixerError::Device(format!(
                    "unsupported output sample format: {other:?}"
                )))
            }
        }
        .map_err(|e| MixerError::Device(e.to_string()))?;

        stream
            .play()
            .map_err(|e| MixerError::Device(e.to_string()))?;
        self.stream = Some(stream);
        Ok(())
    }

    pub fn pause(&self) -> Result<()> {
        if let Some(stream) = &self.stream {
            stream
                .pause()
                .map_err(|e| MixerError::Device(e.to_string()))?;
        }
        Ok(())
    }
}
