//! The real-time mixing callback (§4.3).
//!
//! `mix_into` is called once per host audio-device buffer. It must never
//! block, never allocate in the common (non-end-of-stream) path, and never
//! close a decoder itself — retired handles go to the [`DyingList`]. All
//! scratch buffers live in a caller-owned [`MixScratch`] so steady-state
//! playback performs zero allocations after warmup.

use tracing::trace;

use crate::events::{ChannelEvent, EventProducer};
use crate::playback::channel::Channel;
use crate::playback::dying_list::DyingList;

/// Reusable scratch space for one mixer, sized to the largest buffer it has
/// ever been asked to fill. Own one per [`crate::state::MixerContext`]; never
/// construct one per callback invocation.
pub struct MixScratch {
    accum: Vec<f32>,
    pcm: Vec<i16>,
}

impl MixScratch {
    pub fn new() -> Self {
        MixScratch {
            accum: Vec::new(),
            pcm: Vec::new(),
        }
    }

    fn ensure_capacity(&mut self, sample_count: usize) {
        if self.accum.len() < sample_count {
            self.accum.resize(sample_count, 0.0);
        }
        if self.pcm.len() < sample_count {
            self.pcm.resize(sample_count, 0);
        }
    }
}

impl Default for MixScratch {
    fn default() -> Self {
        MixScratch::new()
    }
}

/// Left/right attenuation for a pan value in `[-1, 1]`. Center (0.0) leaves
/// both channels unattenuated; panning toward one side attenuates only the
/// other (§9, resolved open question — no amplification past unity gain).
fn pan_gains(pan: f32) -> (f32, f32) {
    let pan = pan.clamp(-1.0, 1.0);
    ((1.0 - pan).min(1.0), (1.0 + pan).min(1.0))
}

/// Fill `out` (interleaved signed-16-bit stereo, `out.len()` must be even)
/// with the next buffer's worth of mixed audio across every channel.
///
/// Frames beyond what any channel can supply are left at silence. Decoders
/// that reach end-of-stream are promoted or retired per the channel state
/// machine in [`crate::playback::channel`]; retired handles are pushed onto
/// `dying` rather than dropped here.
pub fn mix_into(
    scratch: &mut MixScratch,
    channels: &mut [Channel],
    dying: &DyingList,
    events: &mut EventProducer,
    sample_rate: u32,
    out: &mut [i16],
) {
    debug_assert!(out.len() % 2 == 0, "output buffer must hold whole stereo frames");
    let frame_count = out.len() / 2;
    let sample_count = out.len();
    scratch.ensure_capacity(sample_count);

    let accum = &mut scratch.accum[..sample_count];
    accum.iter_mut().for_each(|s| *s = 0.0);

    for (idx, channel) in channels.iter_mut().enumerate() {
        if channel.playing.is_empty() || channel.paused {
            continue;
        }

        let relative_volume = channel.playing.relative_volume;
        let mixer_volume = channel.mixer_volume;

        let mut mixed = 0usize;
        while mixed < frame_count && !channel.playing.is_empty() {
            let want_frames = frame_count - mixed;
            let pcm = &mut scratch.pcm[..want_frames * 2];
            let returned = channel
                .playing
                .decoder
                .as_mut()
                .expect("checked non-empty above")
                .read_audio(pcm);

            if returned == 0 || channel.stop_samples == 0 {
                trace!(channel = idx, "stream ended, promoting queued slot");
                if channel.event != 0 {
                    events.post(ChannelEvent {
                        channel: idx,
                        tag: channel.event,
                    });
                }
                if let Some(retired) = channel.promote(sample_rate) {
                    dying.retire_one(retired);
                }
                continue;
            }

            let remaining_stop = if channel.stop_samples > 0 {
                channel.stop_samples as usize
            } else {
                returned
            };
            let k = returned.min(remaining_stop);

            for i in 0..k {
                let (pan_l, pan_r) = pan_gains(channel.pan.get());
                let secondary = channel.secondary_volume.get();
                let fade = channel.fade.get();
                let gain = mixer_volume * secondary * fade * relative_volume;

                let l = (pcm[i * 2] as f32 / 32768.0) * gain * pan_l;
                let r = (pcm[i * 2 + 1] as f32 / 32768.0) * gain * pan_r;

                let out_pos = (mixed + i) * 2;
                accum[out_pos] += l;
                accum[out_pos + 1] += r;

                channel.pos += 1;
                channel.fade.advance(1);
                channel.pan.advance(1);
                channel.secondary_volume.advance(1);
                if channel.stop_samples > 0 {
                    channel.stop_samples -= 1;
                }
            }
            mixed += k;
        }
    }

    for (sample, slot) in accum.iter().zip(out.iter_mut()) {
        *slot = crate::audio::types::clip_to_i16(*sample);
    }
}
