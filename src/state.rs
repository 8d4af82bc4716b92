//! `MixerContext`: the single object a host owns to run the mixer core.
//!
//! It encapsulates everything §9 calls out as "global state" — the channel
//! table, the dying list, the audio spec, the last-error slot, and the event
//! ring — behind ordinary `Mutex`es rather than process-wide singletons. A
//! host may run more than one `MixerContext` (e.g. in tests) without them
//! interfering.
//!
//! The channel table's `Mutex<Vec<Channel>>` plays the role of the audio
//! lock described in §5: the mixer callback holds it for the duration of
//! `mix_into`, and every control-API entry point that mutates playing or
//! queued slots acquires the same lock. Position/name queries and the dying
//! list additionally route through `DyingList`'s own mutex, which stands in
//! for the finer-grained name lock — a simplification documented in
//! `DESIGN.md` rather than splitting channel state across two structures.

use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::audio::decoder::DecoderFactory;
use crate::error::{DecoderError, ErrorCode, MixerError, Result};
use crate::events::{event_channel, ChannelEvent, EventConsumer, EventProducer};
use crate::playback::channel::Channel;
use crate::playback::dying_list::DyingList;
use crate::playback::mixer::{self, MixScratch};

/// Upper bound on how far `check_channel` will grow the channel table for a
/// single index, guarding against a hostile or mistaken huge channel number
/// turning into an enormous allocation (§7 "channel-table growth failure").
const DEFAULT_CHANNEL_TABLE_LIMIT: usize = 4096;

pub struct MixerContext {
    pub(crate) channels: Mutex<Vec<Channel>>,
    pub(crate) dying: DyingList,
    pub(crate) sample_rate: u32,
    pub(crate) decoder_factory: Arc<dyn DecoderFactory>,
    channel_table_limit: usize,
    scratch: Mutex<MixScratch>,
    event_producer: Mutex<EventProducer>,
    event_consumer: Mutex<EventConsumer>,
    last_error: Mutex<(ErrorCode, String)>,
}

impl MixerContext {
    pub fn new(sample_rate: u32, decoder_factory: Arc<dyn DecoderFactory>) -> Self {
        Self::with_channel_table_limit(sample_rate, decoder_factory, DEFAULT_CHANNEL_TABLE_LIMIT)
    }

    pub fn with_channel_table_limit(
        sample_rate: u32,
        decoder_factory: Arc<dyn DecoderFactory>,
        channel_table_limit: usize,
    ) -> Self {
        let (producer, consumer) = event_channel();
        MixerContext {
            channels: Mutex::new(Vec::new()),
            dying: DyingList::new(),
            sample_rate,
            decoder_factory,
            channel_table_limit,
            scratch: Mutex::new(MixScratch::new()),
            event_producer: Mutex::new(producer),
            event_consumer: Mutex::new(consumer),
            last_error: Mutex::new((ErrorCode::Success, String::new())),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The mixer callback entry point (§4.3). The host's audio device
    /// invokes this once per buffer; it must not be called re-entrantly.
    pub fn mix_into(&self, out: &mut [i16]) {
        let mut channels = self.channels.lock().unwrap();
        let mut scratch = self.scratch.lock().unwrap();
        let mut producer = self.event_producer.lock().unwrap();
        mixer::mix_into(
            &mut scratch,
            &mut channels,
            &self.dying,
            &mut producer,
            self.sample_rate,
            out,
        );
    }

    /// Drain posted channel events and reap retired decoders off the audio
    /// thread (§4.4). Call this frequently from the application thread —
    /// at least once per host main-loop frame.
    pub fn reap(&self, mut on_event: impl FnMut(ChannelEvent)) {
        self.event_consumer.lock().unwrap().drain(&mut on_event);
        let reaped = self.dying.reap();
        if reaped > 0 {
            debug!(count = reaped, "reaped retired decoders");
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.lock().unwrap().len()
    }

    /// Resolve `index` to a valid channel slot, growing the table with
    /// freshly zero-initialized channels (§3) if needed. Rejects negative
    /// indices and indices beyond the configured growth ceiling.
    pub(crate) fn check_channel(&self, index: i64) -> Result<usize> {
        if index < 0 {
            let err = MixerError::InvalidChannel(index);
            self.set_last_error(err.code(), err.to_string());
            return Err(err);
        }
        let index = index as usize;
        if index >= self.channel_table_limit {
            let err = MixerError::ChannelTableOverflow {
                requested: index,
                limit: self.channel_table_limit,
            };
            self.set_last_error(err.code(), err.to_string());
            return Err(err);
        }

        let mut channels = self.channels.lock().unwrap();
        if index >= channels.len() {
            channels.resize_with(index + 1, Channel::new);
        }
        Ok(index)
    }

    /// Post a channel-end event into the lock-free ring, mirroring what the
    /// mixer callback itself does on end-of-stream (§4.3). Used by control
    /// entry points (`stop`) that can also finalize a playing stream.
    pub(crate) fn post_event(&self, channel: usize, tag: u32) {
        if tag != 0 {
            self.event_producer
                .lock()
                .unwrap()
                .post(ChannelEvent { channel, tag });
        }
    }

    pub(crate) fn set_last_error(&self, code: ErrorCode, message: String) {
        if code != ErrorCode::Success {
            warn!(%message, code = code.as_i32(), "mixer control API error");
        }
        *self.last_error.lock().unwrap() = (code, message);
    }

    pub(crate) fn clear_last_error(&self) {
        *self.last_error.lock().unwrap() = (ErrorCode::Success, String::new());
    }

    /// The legacy-style last-error accessor (§6.3): the most recent control
    /// entry point's error code and message, or `(Success, "")`.
    pub fn get_error(&self) -> (ErrorCode, String) {
        self.last_error.lock().unwrap().clone()
    }

    pub(crate) fn map_decoder_error(&self, err: DecoderError) -> MixerError {
        let err = MixerError::Decoder(err);
        self.set_last_error(err.code(), err.to_string());
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decoder::{Decoder, Source};

    struct NullFactory;
    impl DecoderFactory for NullFactory {
        fn open(
            &self,
            _source: Box<dyn Source>,
            _ext: Option<&str>,
        ) -> std::result::Result<Box<dyn Decoder>, DecoderError> {
            Err(DecoderError::UnsupportedFormat(None))
        }
    }

    fn ctx() -> MixerContext {
        MixerContext::new(44_100, Arc::new(NullFactory))
    }

    #[test]
    fn check_channel_rejects_negative_index() {
        let ctx = ctx();
        let err = ctx.check_channel(-1).unwrap_err();
        assert!(matches!(err, MixerError::InvalidChannel(-1)));
        assert_eq!(ctx.get_error().0, ErrorCode::Generic);
    }

    #[test]
    fn check_channel_grows_table_and_zero_inits_new_slots() {
        let ctx = ctx();
        let idx = ctx.check_channel(7).unwrap();
        assert_eq!(idx, 7);
        assert_eq!(ctx.channel_count(), 8);
    }

    #[test]
    fn check_channel_rejects_beyond_growth_ceiling() {
        let ctx = MixerContext::with_channel_table_limit(44_100, Arc::new(NullFactory), 4);
        assert!(ctx.check_channel(3).is_ok());
        let err = ctx.check_channel(10).unwrap_err();
        assert!(matches!(err, MixerError::ChannelTableOverflow { .. }));
    }

    #[test]
    fn mix_into_silent_buffer_on_fresh_context() {
        let ctx = ctx();
        ctx.check_channel(0).unwrap();
        let mut out = vec![7i16; 16];
        ctx.mix_into(&mut out);
        assert!(out.iter().all(|&s| s == 0));
    }

    #[test]
    fn reap_drains_events_posted_by_a_finished_channel() {
        let ctx = ctx();
        // No real decoder wired here; this test only verifies reap() doesn't
        // panic with nothing queued and reports a clean last-error.
        let mut seen = Vec::new();
        ctx.reap(|e| seen.push(e));
        assert!(seen.is_empty());
        assert_eq!(ctx.get_error().0, ErrorCode::Success);
    }
}
