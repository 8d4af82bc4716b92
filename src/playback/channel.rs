//! The per-channel state machine: playing/queued stream slots, fade state,
//! pan/secondary-volume envelopes, and the gapless-promotion rule.
//!
//! `Channel` holds no lock of its own — it is always reached through the
//! audio lock (`MixerContext`'s `Mutex<Vec<Channel>>`) or, for the narrower
//! name/position fields, documented as consistent-as-of the last promotion.
//! It owns its decoder handles outright: a handle is moved out of a
//! `StreamSlot` exactly once, into the dying list, and never aliased.

use crate::audio::decoder::{Decoder, VideoMode};
use crate::playback::interpolator::Interpolator;

/// Convert a millisecond duration to a sample-frame count at `sample_rate`.
pub fn ms_to_samples(ms: u32, sample_rate: u32) -> u32 {
    ((ms as u64 * sample_rate as u64) / 1000) as u32
}

/// Convert a sample-frame count to milliseconds at `sample_rate`.
pub fn samples_to_ms(samples: u64, sample_rate: u32) -> i64 {
    if sample_rate == 0 {
        return 0;
    }
    ((samples * 1000) / sample_rate as u64) as i64
}

/// One playing or queued stream. `decoder.is_none()` means the slot is
/// empty; all other fields are only meaningful while `decoder` is `Some`.
pub struct StreamSlot {
    pub decoder: Option<Box<dyn Decoder>>,
    pub name: Option<String>,
    pub fadein_ms: u32,
    pub tight: bool,
    pub start_ms: i64,
    pub relative_volume: f32,
}

impl StreamSlot {
    pub fn empty() -> Self {
        StreamSlot {
            decoder: None,
            name: None,
            fadein_ms: 0,
            tight: false,
            start_ms: 0,
            relative_volume: 1.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.decoder.is_none()
    }
}

/// The per-channel state machine (§3/§4.2).
pub struct Channel {
    pub playing: StreamSlot,
    pub queued: Option<StreamSlot>,
    pub paused: bool,
    pub mixer_volume: f32,
    pub secondary_volume: Interpolator,
    pub pan: Interpolator,
    pub fade: Interpolator,
    pub pos: u64,
    /// -1: no scheduled stop; 0: stop now; >0: frames remaining.
    pub stop_samples: i64,
    pub event: u32,
    pub video: VideoMode,
}

impl Channel {
    /// A freshly allocated channel, per the zero-init rule in §3: paused,
    /// full mixer volume, constant envelopes, no event, audio-only.
    pub fn new() -> Self {
        Channel {
            playing: StreamSlot::empty(),
            queued: None,
            paused: true,
            mixer_volume: 1.0,
            secondary_volume: Interpolator::constant(1.0),
            pan: Interpolator::constant(0.0),
            fade: Interpolator::constant(1.0),
            pos: 0,
            stop_samples: -1,
            event: 0,
            video: VideoMode::AudioOnly,
        }
    }

    pub fn is_playing(&self) -> bool {
        !self.playing.is_empty()
    }

    pub fn queue_depth(&self) -> u8 {
        (!self.playing.is_empty()) as u8 + self.queued.is_some() as u8
    }

    pub fn playing_name(&self) -> Option<&str> {
        self.playing.name.as_deref()
    }

    /// `play(ch, ...)`: replace both slots with a single new playing stream.
    /// Returns any decoders displaced from the old slots, to be moved onto
    /// the dying list by the caller (never closed here).
    pub fn play(&mut self, slot: StreamSlot, paused: bool, sample_rate: u32) -> Vec<Box<dyn Decoder>> {
        let mut retired = Vec::with_capacity(2);
        if let Some(old) = self.playing.decoder.take() {
            retired.push(old);
        }
        if let Some(mut q) = self.queued.take() {
            if let Some(old) = q.decoder.take() {
                retired.push(old);
            }
        }

        let fadein = slot.fadein_ms;
        self.playing = slot;
        self.paused = paused;
        self.fade.set_ramp(0.0, 1.0, ms_to_samples(fadein, sample_rate));
        self.stop_samples = -1;
        self.pos = 0;
        retired
    }

    /// `queue(ch, ...)`: if the channel is empty, delegate to `play` with
    /// `paused = false` (§4.5). Otherwise replace the queued slot only.
    pub fn queue(&mut self, slot: StreamSlot, sample_rate: u32) -> Vec<Box<dyn Decoder>> {
        if self.playing.is_empty() {
            debug_assert!(self.queued.is_none(), "queued implies playing (§3 invariant)");
            return self.play(slot, false, sample_rate);
        }

        let mut retired = Vec::with_capacity(1);
        if let Some(mut old) = self.queued.replace(slot) {
            if let Some(decoder) = old.decoder.take() {
                retired.push(decoder);
            }
        }
        retired
    }

    /// `stop(ch)`: free both slots. Returns `true` if a stream had been
    /// playing (so the caller can post the channel's end event), plus any
    /// displaced decoders for the dying list.
    pub fn stop(&mut self) -> (bool, Vec<Box<dyn Decoder>>) {
        let mut retired = Vec::with_capacity(2);
        let was_playing = !self.playing.is_empty();
        if let Some(old) = self.playing.decoder.take() {
            retired.push(old);
        }
        self.playing.name = None;
        self.playing.start_ms = 0;
        if let Some(mut q) = self.queued.take() {
            if let Some(old) = q.decoder.take() {
                retired.push(old);
            }
        }
        (was_playing, retired)
    }

    /// `dequeue(ch, even_tight)`: tight-queue removal rule (§4.5, glossary).
    /// A tight *playing* slot blocks removal of the queued slot unless
    /// `even_tight` overrides it; in that blocked case the queued slot's own
    /// tight flag is cleared instead (it no longer insists on gaplessness).
    pub fn dequeue(&mut self, even_tight: bool) -> Option<Box<dyn Decoder>> {
        if self.queued.is_none() {
            return None;
        }
        if !self.playing.tight || even_tight {
            let mut slot = self.queued.take().unwrap();
            slot.decoder.take()
        } else {
            if let Some(q) = self.queued.as_mut() {
                q.tight = false;
            }
            None
        }
    }

    /// `fadeout(ch, ms)`: schedule the playing stream to decay to silence
    /// (or stop immediately if `ms == 0`) over `ms` milliseconds.
    pub fn fadeout(&mut self, ms: u32, sample_rate: u32) {
        if ms == 0 {
            self.stop_samples = 0;
            return;
        }
        let duration = ms_to_samples(ms, sample_rate);
        self.fade.ramp_from_current(0.0, duration);
        self.stop_samples = duration as i64;

        if let Some(q) = self.queued.as_mut() {
            q.tight = false;
        } else {
            self.playing.tight = false;
        }
    }

    pub fn set_pan(&mut self, pan: f32, delay_s: f64, sample_rate: u32) {
        let duration = ms_to_samples((delay_s * 1000.0).max(0.0) as u32, sample_rate);
        self.pan.ramp_from_current(pan.clamp(-1.0, 1.0), duration);
    }

    pub fn set_secondary_volume(&mut self, vol: f32, delay_s: f64, sample_rate: u32) {
        let duration = ms_to_samples((delay_s * 1000.0).max(0.0) as u32, sample_rate);
        self.secondary_volume.ramp_from_current(vol.max(0.0), duration);
    }

    pub fn set_endevent(&mut self, tag: u32) {
        self.event = tag;
    }

    pub fn get_pos_ms(&self, sample_rate: u32) -> i64 {
        if self.playing.is_empty() {
            -1
        } else {
            samples_to_ms(self.pos, sample_rate) + self.playing.start_ms
        }
    }

    pub fn get_duration(&self) -> f64 {
        self.playing
            .decoder
            .as_ref()
            .map(|d| d.duration())
            .unwrap_or(0.0)
    }

    /// Promote the queued stream into the playing slot, per the gapless rule
    /// in §4.2: the fade envelope survives the boundary (gapless) unless the
    /// old stream was not tight, or the new stream specifies a fade-in.
    /// Returns the retired decoder from the old playing slot, if any.
    pub fn promote(&mut self, sample_rate: u32) -> Option<Box<dyn Decoder>> {
        let old_tight = self.playing.tight;
        let retired = self.playing.decoder.take();

        match self.queued.take() {
            Some(next) => {
                let reset_fade = !old_tight || next.fadein_ms > 0;
                let fadein = next.fadein_ms;
                self.playing = next;
                self.pos = 0;
                if reset_fade {
                    self.fade.set_ramp(0.0, 1.0, ms_to_samples(fadein, sample_rate));
                    self.stop_samples = -1;
                }
            }
            None => {
                self.playing = StreamSlot::empty();
                self.pos = 0;
            }
        }

        retired
    }
}

impl Default for Channel {
    fn default() -> Self {
        Channel::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decoder::VideoFrame;

    struct StubDecoder {
        frames_left: usize,
    }

    impl Decoder for StubDecoder {
        fn set_window(&mut self, _start_s: f64, _end_s: f64) {}
        fn want_video(&mut self, _mode: VideoMode) {}
        fn start(&mut self) {}
        fn pause(&mut self, _paused: bool) {}
        fn read_audio(&mut self, out: &mut [i16]) -> usize {
            let frames = (out.len() / 2).min(self.frames_left);
            self.frames_left -= frames;
            frames
        }
        fn read_video(&mut self) -> Option<VideoFrame> {
            None
        }
        fn video_ready(&self) -> bool {
            false
        }
        fn duration(&self) -> f64 {
            1.0
        }
        fn wait_ready(&mut self) {}
    }

    fn slot(name: &str, tight: bool, fadein_ms: u32) -> StreamSlot {
        StreamSlot {
            decoder: Some(Box::new(StubDecoder { frames_left: 1000 })),
            name: Some(name.to_string()),
            fadein_ms,
            tight,
            start_ms: 0,
            relative_volume: 1.0,
        }
    }

    #[test]
    fn new_channel_matches_zero_init_invariants() {
        let c = Channel::new();
        assert!(c.paused);
        assert_eq!(c.mixer_volume, 1.0);
        assert_eq!(c.event, 0);
        assert_eq!(c.queue_depth(), 0);
        assert_eq!(c.get_pos_ms(44_100), -1);
    }

    #[test]
    fn queue_on_empty_channel_behaves_like_play_unpaused() {
        let mut c = Channel::new();
        c.paused = true;
        let retired = c.queue(slot("A", false, 0), 44_100);
        assert!(retired.is_empty());
        assert!(c.is_playing());
        assert!(!c.paused);
        assert_eq!(c.queue_depth(), 1);
    }

    #[test]
    fn queue_onto_playing_channel_only_fills_queued_slot() {
        let mut c = Channel::new();
        c.play(slot("A", false, 0), false, 44_100);
        let retired = c.queue(slot("B", false, 0), 44_100);
        assert!(retired.is_empty());
        assert_eq!(c.playing_name(), Some("A"));
        assert_eq!(c.queue_depth(), 2);
    }

    #[test]
    fn play_on_busy_channel_retires_both_old_decoders() {
        let mut c = Channel::new();
        c.play(slot("A", false, 0), false, 44_100);
        c.queue(slot("B", false, 0), 44_100);
        let retired = c.play(slot("C", false, 0), false, 44_100);
        assert_eq!(retired.len(), 2);
        assert_eq!(c.playing_name(), Some("C"));
        assert_eq!(c.queue_depth(), 1);
    }

    #[test]
    fn stop_clears_both_slots_and_reports_was_playing() {
        let mut c = Channel::new();
        c.play(slot("A", false, 0), false, 44_100);
        c.queue(slot("B", false, 0), 44_100);
        let (was_playing, retired) = c.stop();
        assert!(was_playing);
        assert_eq!(retired.len(), 2);
        assert_eq!(c.queue_depth(), 0);
        assert_eq!(c.get_pos_ms(44_100), -1);
    }

    #[test]
    fn stop_on_empty_channel_reports_not_playing() {
        let mut c = Channel::new();
        let (was_playing, retired) = c.stop();
        assert!(!was_playing);
        assert!(retired.is_empty());
    }

    #[test]
    fn dequeue_blocked_by_tight_playing_slot_clears_queued_tight_instead() {
        let mut c = Channel::new();
        c.play(slot("A", true, 0), false, 44_100);
        c.queue(slot("B", false, 0), 44_100);

        let removed = c.dequeue(false);
        assert!(removed.is_none());
        assert_eq!(c.queue_depth(), 2);
        assert!(!c.queued.as_ref().unwrap().tight);
    }

    #[test]
    fn dequeue_with_even_tight_override_removes_queued_slot() {
        let mut c = Channel::new();
        c.play(slot("A", true, 0), false, 44_100);
        c.queue(slot("B", false, 0), 44_100);

        let removed = c.dequeue(true);
        assert!(removed.is_some());
        assert_eq!(c.queue_depth(), 1);
    }

    #[test]
    fn dequeue_without_tight_playing_slot_removes_freely() {
        let mut c = Channel::new();
        c.play(slot("A", false, 0), false, 44_100);
        c.queue(slot("B", false, 0), 44_100);

        let removed = c.dequeue(false);
        assert!(removed.is_some());
        assert_eq!(c.queue_depth(), 1);
    }

    #[test]
    fn fadeout_zero_schedules_immediate_stop() {
        let mut c = Channel::new();
        c.play(slot("A", false, 0), false, 44_100);
        c.fadeout(0, 44_100);
        assert_eq!(c.stop_samples, 0);
    }

    #[test]
    fn fadeout_seeds_ramp_from_current_fade_value() {
        let mut c = Channel::new();
        c.play(slot("A", false, 0), false, 44_100);
        c.fade.advance(22_050); // halfway through a notional 1s fade-in... but fadein=0 here so fade is at 1.0
        c.fadeout(1000, 44_100);
        assert_eq!(c.stop_samples, 44_100);
        assert_eq!(c.fade.get(), 1.0); // started from current (already-ramped) value
    }

    #[test]
    fn fadeout_clears_queued_tight_when_queue_present() {
        let mut c = Channel::new();
        c.play(slot("A", false, 0), false, 44_100);
        c.queue(slot("B", true, 0), 44_100);
        c.fadeout(500, 44_100);
        assert!(!c.queued.as_ref().unwrap().tight);
    }

    #[test]
    fn fadeout_clears_playing_tight_when_no_queue() {
        let mut c = Channel::new();
        c.play(slot("A", true, 0), false, 44_100);
        c.fadeout(500, 44_100);
        assert!(!c.playing.tight);
    }

    #[test]
    fn promotion_preserves_fade_across_tight_boundary() {
        let mut c = Channel::new();
        c.play(slot("A", true, 0), false, 44_100);
        c.fade.advance(44_100); // fully ramped to 1.0, simulating steady playback
        c.queue(slot("B", false, 0), 44_100);

        let retired = c.promote(44_100);
        assert!(retired.is_some());
        assert_eq!(c.playing_name(), Some("B"));
        assert_eq!(c.pos, 0);
        // Gapless: fade was preserved, so it is still fully ramped (no silent dip).
        assert_eq!(c.fade.get(), 1.0);
        assert_eq!(c.stop_samples, -1);
    }

    #[test]
    fn promotion_resets_fade_when_old_stream_not_tight() {
        let mut c = Channel::new();
        c.play(slot("A", false, 0), false, 44_100);
        c.fade.advance(44_100);
        c.queue(slot("B", false, 0), 44_100);

        c.promote(44_100);
        assert_eq!(c.fade.get(), 0.0); // fresh ramp, done==0
    }

    #[test]
    fn promotion_resets_fade_when_new_stream_requests_fadein_even_if_tight() {
        let mut c = Channel::new();
        c.play(slot("A", true, 0), false, 44_100);
        c.fade.advance(44_100);
        c.queue(slot("B", true, 500), 44_100);

        c.promote(44_100);
        assert_eq!(c.fade.get(), 0.0);
    }

    #[test]
    fn promotion_with_no_queued_stream_empties_channel() {
        let mut c = Channel::new();
        c.play(slot("A", false, 0), false, 44_100);
        let retired = c.promote(44_100);
        assert!(retired.is_some());
        assert!(!c.is_playing());
        assert_eq!(c.queue_depth(), 0);
    }

    #[test]
    fn ms_to_samples_and_back_round_trip_on_exact_multiples() {
        assert_eq!(ms_to_samples(1000, 44_100), 44_100);
        assert_eq!(samples_to_ms(44_100, 44_100), 1000);
        assert_eq!(ms_to_samples(0, 44_100), 0);
    }
}
