//! End-to-end scenarios against the public `MixerContext` control API,
//! mirroring the testable-property list: basic playback, gapless tight
//! queueing, fadeout with an armed queue, immediate stop, channel
//! auto-allocation, and tight-queue dequeue.

use std::io::Cursor;
use std::sync::Arc;

use loomcast::audio::decoder::{Decoder, DecoderFactory, Source, VideoFrame, VideoMode};
use loomcast::error::DecoderError;
use loomcast::playback::PlayRequest;
use loomcast::MixerContext;

const SAMPLE_RATE: u32 = 44_100;

/// A decoder that yields a fixed number of frames of a constant amplitude,
/// then end-of-stream. Stands in for a real file so these tests exercise
/// only the mixer core's control-plane logic.
struct ToneDecoder {
    amplitude: i16,
    frames_left: usize,
}

impl Decoder for ToneDecoder {
    fn set_window(&mut self, _start_s: f64, _end_s: f64) {}
    fn want_video(&mut self, _mode: VideoMode) {}
    fn start(&mut self) {}
    fn pause(&mut self, _paused: bool) {}
    fn read_audio(&mut self, out: &mut [i16]) -> usize {
        let frames = (out.len() / 2).min(self.frames_left);
        for i in 0..frames {
            out[i * 2] = self.amplitude;
            out[i * 2 + 1] = self.amplitude;
        }
        self.frames_left -= frames;
        frames
    }
    fn read_video(&mut self) -> Option<VideoFrame> {
        None
    }
    fn video_ready(&self) -> bool {
        true
    }
    fn duration(&self) -> f64 {
        self.frames_left as f64 / SAMPLE_RATE as f64
    }
    fn wait_ready(&mut self) {}
}

/// Opens a `ToneDecoder` whose frame count and amplitude are encoded in the
/// requested extension hint as `"<amplitude>:<frames>"`, so each test can
/// describe its fixture without a real file on disk.
struct ToneFactory;

impl DecoderFactory for ToneFactory {
    fn open(
        &self,
        _source: Box<dyn Source>,
        ext: Option<&str>,
    ) -> Result<Box<dyn Decoder>, DecoderError> {
        let spec = ext.unwrap_or("10000:44100");
        let mut parts = spec.split(':');
        let amplitude: i16 = parts.next().unwrap().parse().unwrap();
        let frames: usize = parts.next().unwrap().parse().unwrap();
        Ok(Box::new(ToneDecoder {
            amplitude,
            frames_left: frames,
        }))
    }
}

fn request(amplitude: i16, frames: usize, name: &str, tight: bool, fadein_ms: u32) -> PlayRequest {
    PlayRequest {
        source: Box::new(Cursor::new(Vec::<u8>::new())),
        ext: Some(format!("{amplitude}:{frames}")),
        name: Some(name.to_string()),
        fadein_ms,
        tight,
        start_s: 0.0,
        end_s: 0.0,
        relative_volume: 1.0,
    }
}

fn context() -> MixerContext {
    MixerContext::new(SAMPLE_RATE, Arc::new(ToneFactory))
}

fn pump(ctx: &MixerContext, frames: usize) -> Vec<loomcast::events::ChannelEvent> {
    let mut out = vec![0i16; frames * 2];
    ctx.mix_into(&mut out);
    let mut events = Vec::new();
    ctx.reap(|e| events.push(e));
    events
}

#[test]
fn basic_playback_posts_event_once_and_resets_state() {
    let ctx = context();
    ctx.set_endevent(0, 1).unwrap();
    ctx.play(0, false, request(20_000, 220_500, "a", false, 0))
        .unwrap(); // 5s at 44100 Hz

    let mut all_events = Vec::new();
    for _ in 0..6 {
        all_events.extend(pump(&ctx, 44_100));
    }

    assert_eq!(all_events.len(), 1);
    assert_eq!(all_events[0].tag, 1);
    assert_eq!(ctx.queue_depth(0).unwrap(), 0);
    assert_eq!(ctx.get_pos(0).unwrap(), -1);
}

#[test]
fn gapless_tight_queue_transitions_without_fade_dip() {
    let ctx = context();
    ctx.play(0, false, request(32_000, 100, "A", true, 0)).unwrap();
    ctx.queue(0, request(16_000, 100, "B", false, 0)).unwrap();

    assert_eq!(ctx.playing_name(0).unwrap().as_deref(), Some("A"));

    let mut out = vec![0i16; 200 * 2]; // more than A's 100 frames
    ctx.mix_into(&mut out);

    assert_eq!(ctx.playing_name(0).unwrap().as_deref(), Some("B"));
    // B's samples should be at full scale (gain 1.0), not faded from 0.
    let last_frame = out[out.len() - 2];
    assert!((last_frame as i32 - 16_000).abs() <= 1);
}

#[test]
fn fadeout_with_armed_queue_attenuates_then_promotes() {
    let ctx = context();
    ctx.play(0, false, request(32_000, SAMPLE_RATE as usize * 2, "A", false, 0))
        .unwrap();
    ctx.queue(0, request(16_000, 100, "B", false, 0)).unwrap();
    ctx.fadeout(0, 1000).unwrap();

    // Pump exactly one second; A should fade to silence and hand off to B.
    let mut out = vec![0i16; SAMPLE_RATE as usize * 2 + 200];
    ctx.mix_into(&mut out);

    // Near the fade boundary the samples should be much quieter than full
    // scale, and B should now be playing.
    assert_eq!(ctx.playing_name(0).unwrap().as_deref(), Some("B"));
}

#[test]
fn immediate_stop_via_fadeout_zero_finalizes_next_callback() {
    let ctx = context();
    ctx.play(0, false, request(32_000, 1000, "A", false, 0)).unwrap();
    ctx.fadeout(0, 0).unwrap();

    let events = pump(&ctx, 64);
    assert_eq!(events.len(), 0); // no endevent configured
    assert_eq!(ctx.queue_depth(0).unwrap(), 0);
}

#[test]
fn channel_auto_allocation_zero_inits_intermediate_channels() {
    let ctx = context();
    ctx.set_volume(7, 0.5).unwrap();

    assert_eq!(ctx.channel_count(), 8);
    for ch in 0..7 {
        assert_eq!(ctx.get_volume(ch).unwrap(), 1.0);
    }
    assert_eq!(ctx.get_volume(7).unwrap(), 0.5);
}

#[test]
fn dequeue_honors_tight_flag_unless_overridden() {
    let ctx = context();
    ctx.play(0, false, request(32_000, 100, "A", true, 0)).unwrap();
    ctx.queue(0, request(16_000, 100, "B", false, 0)).unwrap();

    ctx.dequeue(0, false).unwrap();
    assert_eq!(ctx.queue_depth(0).unwrap(), 2);

    ctx.dequeue(0, true).unwrap();
    assert_eq!(ctx.queue_depth(0).unwrap(), 1);
}

#[test]
fn queue_on_empty_channel_behaves_like_unpaused_play() {
    let ctx = context();
    ctx.queue(0, request(32_000, 100, "A", false, 0)).unwrap();
    assert_eq!(ctx.playing_name(0).unwrap().as_deref(), Some("A"));
    assert_eq!(ctx.queue_depth(0).unwrap(), 1);
}

#[test]
fn negative_channel_index_is_rejected_with_generic_error() {
    let ctx = context();
    let err = ctx.stop(-1).unwrap_err();
    assert!(matches!(err, loomcast::MixerError::InvalidChannel(-1)));
    assert_eq!(ctx.get_error().0, loomcast::ErrorCode::Generic);
}
