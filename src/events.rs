//! Host event delivery.
//!
//! The mixer callback must be able to tell the host "channel N's stream just
//! ended" without blocking or allocating. Rather than assume the host's own
//! event queue can accept pushes from a real-time thread, the callback writes
//! into a bounded lock-free SPSC ring (`ringbuf::HeapRb`); the application
//! thread (typically via [`crate::state::MixerContext::reap`]) drains it and
//! forwards entries to whatever the host actually uses.

use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

/// Default capacity of the event ring. Sized generously relative to the
/// number of channels likely to finish a stream in the same callback.
const DEFAULT_EVENT_CAPACITY: usize = 256;

/// A single "stream ended" notification posted by the mixer callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelEvent {
    /// Index of the channel whose playing stream just ended.
    pub channel: usize,
    /// The channel's configured end-event tag (`set_endevent`). Never 0 —
    /// the callback does not post an event when the tag is 0 ("no event").
    pub tag: u32,
}

/// Producer half, held by [`crate::state::MixerContext`] and used only from
/// the mixer callback.
pub struct EventProducer {
    inner: HeapProd<ChannelEvent>,
}

impl EventProducer {
    /// Push an event. Never blocks; silently drops the event if the ring is
    /// full, which can only happen if the application thread stops draining
    /// it entirely (the ring is sized far above plausible per-callback
    /// event counts).
    pub fn post(&mut self, event: ChannelEvent) {
        let _ = self.inner.try_push(event);
    }
}

/// Consumer half, drained by the application thread.
pub struct EventConsumer {
    inner: HeapCons<ChannelEvent>,
}

impl EventConsumer {
    /// Drain all currently queued events, invoking `f` for each in order.
    pub fn drain(&mut self, mut f: impl FnMut(ChannelEvent)) {
        while let Some(event) = self.inner.try_pop() {
            f(event);
        }
    }
}

/// Construct a fresh producer/consumer pair with the default capacity.
pub fn event_channel() -> (EventProducer, EventConsumer) {
    event_channel_with_capacity(DEFAULT_EVENT_CAPACITY)
}

pub fn event_channel_with_capacity(capacity: usize) -> (EventProducer, EventConsumer) {
    let (prod, cons) = HeapRb::new(capacity).split();
    (EventProducer { inner: prod }, EventConsumer { inner: cons })
}
