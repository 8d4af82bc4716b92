//! The control API surface (§4.5), implemented as inherent methods on
//! [`crate::state::MixerContext`]. Every entry point resolves its channel
//! index through `check_channel` first and records its outcome via the
//! last-error slot, matching §7's propagation policy.

use tracing::debug;

use crate::audio::decoder::{Source, VideoMode};
use crate::error::Result;
use crate::playback::channel::StreamSlot;
use crate::state::MixerContext;

/// Parameters shared by `play` and `queue` (§4.5). Bundled into one struct
/// because both entry points take the same seven-odd arguments describing
/// the stream to open.
pub struct PlayRequest {
    pub source: Box<dyn Source>,
    pub ext: Option<String>,
    pub name: Option<String>,
    pub fadein_ms: u32,
    pub tight: bool,
    pub start_s: f64,
    pub end_s: f64,
    pub relative_volume: f32,
}

impl MixerContext {
    fn open_slot(&self, req: PlayRequest, video_mode: VideoMode) -> Result<StreamSlot> {
        let mut decoder = self
            .decoder_factory
            .open(req.source, req.ext.as_deref())
            .map_err(|e| self.map_decoder_error(e))?;
        decoder.set_window(req.start_s, req.end_s);
        decoder.want_video(video_mode);
        decoder.start();
        Ok(StreamSlot {
            decoder: Some(decoder),
            name: req.name,
            fadein_ms: req.fadein_ms,
            tight: req.tight,
            start_ms: 0,
            relative_volume: req.relative_volume,
        })
    }

    /// `play(ch, ...)`: close both slots, open a new decoder, start playing.
    pub fn play(&self, channel: i64, paused: bool, req: PlayRequest) -> Result<()> {
        let idx = self.check_channel(channel)?;
        let video_mode = self.channels.lock().unwrap()[idx].video;
        let slot = self.open_slot(req, video_mode)?;

        let retired = {
            let mut channels = self.channels.lock().unwrap();
            channels[idx].play(slot, paused, self.sample_rate)
        };
        self.dying.retire(retired);
        self.clear_last_error();
        debug!(channel = idx, "play");
        Ok(())
    }

    /// `queue(ch, ...)`: arm a second stream behind the one already playing,
    /// or behave like `play(..., paused=false)` on an empty channel.
    pub fn queue(&self, channel: i64, req: PlayRequest) -> Result<()> {
        let idx = self.check_channel(channel)?;
        let video_mode = self.channels.lock().unwrap()[idx].video;
        let slot = self.open_slot(req, video_mode)?;

        let retired = {
            let mut channels = self.channels.lock().unwrap();
            channels[idx].queue(slot, self.sample_rate)
        };
        self.dying.retire(retired);
        self.clear_last_error();
        debug!(channel = idx, "queue");
        Ok(())
    }

    /// `stop(ch)`: free both slots, posting the channel's end event if a
    /// stream had been playing.
    pub fn stop(&self, channel: i64) -> Result<()> {
        let idx = self.check_channel(channel)?;
        let (was_playing, event_tag, retired) = {
            let mut channels = self.channels.lock().unwrap();
            let tag = channels[idx].event;
            let (was_playing, retired) = channels[idx].stop();
            (was_playing, tag, retired)
        };
        self.dying.retire(retired);
        if was_playing {
            self.post_event(idx, event_tag);
        }
        self.clear_last_error();
        debug!(channel = idx, "stop");
        Ok(())
    }

    /// `dequeue(ch, even_tight)`: remove the queued slot, subject to the
    /// tight-queue override rule.
    pub fn dequeue(&self, channel: i64, even_tight: bool) -> Result<()> {
        let idx = self.check_channel(channel)?;
        let retired = self.channels.lock().unwrap()[idx].dequeue(even_tight);
        if let Some(decoder) = retired {
            self.dying.retire(vec![decoder]);
        }
        self.clear_last_error();
        Ok(())
    }

    /// `fadeout(ch, ms)`: decay the playing stream to silence over `ms`
    /// milliseconds (or stop immediately when `ms == 0`).
    pub fn fadeout(&self, channel: i64, ms: u32) -> Result<()> {
        let idx = self.check_channel(channel)?;
        self.channels.lock().unwrap()[idx].fadeout(ms, self.sample_rate);
        self.clear_last_error();
        debug!(channel = idx, ms, "fadeout");
        Ok(())
    }

    /// `pause(ch, paused)`: set the channel pause flag and the decoder's own
    /// pause state together.
    pub fn pause(&self, channel: i64, paused: bool) -> Result<()> {
        let idx = self.check_channel(channel)?;
        let mut channels = self.channels.lock().unwrap();
        channels[idx].paused = paused;
        if let Some(decoder) = channels[idx].playing.decoder.as_mut() {
            decoder.pause(paused);
        }
        drop(channels);
        self.clear_last_error();
        Ok(())
    }

    /// `unpause_all_at_start()`: for every channel whose playing stream has
    /// not yet produced a sample, block until its decoder is ready, then
    /// unpause both the channel and the decoder. Blocking happens with the
    /// audio lock released so the mixer callback is never held up by it.
    pub fn unpause_all_at_start(&self) {
        let pending: Vec<usize> = {
            let channels = self.channels.lock().unwrap();
            channels
                .iter()
                .enumerate()
                .filter(|(_, c)| !c.playing.is_empty() && c.pos == 0)
                .map(|(i, _)| i)
                .collect()
        };

        for idx in pending {
            // Take the decoder out and release the audio lock before the
            // blocking wait, so the mixer callback is never held up by it
            // (§5: `unpause_all_at_start` may block arbitrarily).
            let decoder = self.channels.lock().unwrap()[idx].playing.decoder.take();
            let mut decoder = match decoder {
                Some(d) => d,
                None => continue,
            };
            decoder.wait_ready();
            decoder.pause(false);

            let mut channels = self.channels.lock().unwrap();
            channels[idx].playing.decoder = Some(decoder);
            channels[idx].paused = false;
        }
        self.clear_last_error();
    }

    pub fn set_volume(&self, channel: i64, volume: f32) -> Result<()> {
        let idx = self.check_channel(channel)?;
        self.channels.lock().unwrap()[idx].mixer_volume = volume.max(0.0);
        self.clear_last_error();
        Ok(())
    }

    pub fn get_volume(&self, channel: i64) -> Result<f32> {
        let idx = self.check_channel(channel)?;
        let vol = self.channels.lock().unwrap()[idx].mixer_volume;
        self.clear_last_error();
        Ok(vol)
    }

    pub fn set_pan(&self, channel: i64, pan: f32, delay_s: f64) -> Result<()> {
        let idx = self.check_channel(channel)?;
        self.channels.lock().unwrap()[idx].set_pan(pan, delay_s, self.sample_rate);
        self.clear_last_error();
        Ok(())
    }

    pub fn set_secondary_volume(&self, channel: i64, volume: f32, delay_s: f64) -> Result<()> {
        let idx = self.check_channel(channel)?;
        self.channels.lock().unwrap()[idx].set_secondary_volume(volume, delay_s, self.sample_rate);
        self.clear_last_error();
        Ok(())
    }

    pub fn set_endevent(&self, channel: i64, tag: u32) -> Result<()> {
        let idx = self.check_channel(channel)?;
        self.channels.lock().unwrap()[idx].set_endevent(tag);
        self.clear_last_error();
        Ok(())
    }

    pub fn set_video(&self, channel: i64, mode: VideoMode) -> Result<()> {
        let idx = self.check_channel(channel)?;
        self.channels.lock().unwrap()[idx].video = mode;
        self.clear_last_error();
        Ok(())
    }

    pub fn get_pos(&self, channel: i64) -> Result<i64> {
        let idx = self.check_channel(channel)?;
        let pos = self.channels.lock().unwrap()[idx].get_pos_ms(self.sample_rate);
        self.clear_last_error();
        Ok(pos)
    }

    pub fn get_duration(&self, channel: i64) -> Result<f64> {
        let idx = self.check_channel(channel)?;
        let duration = self.channels.lock().unwrap()[idx].get_duration();
        self.clear_last_error();
        Ok(duration)
    }

    pub fn queue_depth(&self, channel: i64) -> Result<u8> {
        let idx = self.check_channel(channel)?;
        let depth = self.channels.lock().unwrap()[idx].queue_depth();
        self.clear_last_error();
        Ok(depth)
    }

    pub fn playing_name(&self, channel: i64) -> Result<Option<String>> {
        let idx = self.check_channel(channel)?;
        let name = self.channels.lock().unwrap()[idx]
            .playing_name()
            .map(str::to_owned);
        self.clear_last_error();
        Ok(name)
    }

    /// `video_ready(ch)`: true if a video frame is ready, or if the channel
    /// is empty (§4.5 — an empty channel never blocks a polling host).
    pub fn video_ready(&self, channel: i64) -> Result<bool> {
        let idx = self.check_channel(channel)?;
        let channels = self.channels.lock().unwrap();
        let ready = match channels[idx].playing.decoder.as_ref() {
            Some(decoder) => decoder.video_ready(),
            None => true,
        };
        drop(channels);
        self.clear_last_error();
        Ok(ready)
    }

    /// `read_video(ch)`: pull a decoded frame from the playing decoder, if
    /// any. May block inside the decoder; callers bridging to a
    /// garbage-collected host language must release its global lock first.
    ///
    /// The decoder is taken out of its slot and the audio lock released
    /// before the (potentially arbitrarily long) blocking call, so the
    /// mixer callback is never stalled behind a video decode — the same
    /// take-out/drop-lock/call/put-back pattern `unpause_all_at_start` uses.
    pub fn read_video(&self, channel: i64) -> Result<Option<crate::audio::decoder::VideoFrame>> {
        let idx = self.check_channel(channel)?;

        let decoder = self.channels.lock().unwrap()[idx].playing.decoder.take();
        let mut decoder = match decoder {
            Some(d) => d,
            None => {
                self.clear_last_error();
                return Ok(None);
            }
        };

        let frame = decoder.read_video();

        self.channels.lock().unwrap()[idx].playing.decoder = Some(decoder);
        self.clear_last_error();
        Ok(frame)
    }
}
