//! Decoders retired from the mixer callback are never closed on the audio
//! thread — `Decoder::drop`/close can block on I/O or allocate. Instead the
//! callback moves the handle onto this list; [`DyingList::reap`] runs from
//! the application thread (periodically, or driven by `MixerContext::reap`)
//! and drops the handles there.
//!
//! The list itself is protected by the name lock (§4.1): a short,
//! never-blocking-on-I/O critical section, distinct from the audio lock that
//! guards the channel table.

use std::sync::Mutex;

use crate::audio::decoder::Decoder;

pub struct DyingList {
    handles: Mutex<Vec<Box<dyn Decoder>>>,
}

impl DyingList {
    pub fn new() -> Self {
        DyingList {
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Move a batch of retired decoders onto the list. Called from the
    /// mixer callback; must not block beyond acquiring the name lock.
    pub fn retire(&self, mut decoders: Vec<Box<dyn Decoder>>) {
        if decoders.is_empty() {
            return;
        }
        let mut handles = self.handles.lock().unwrap();
        handles.append(&mut decoders);
    }

    /// Move a single retired decoder onto the list, without the caller
    /// allocating an intermediate `Vec` to do it. End-of-stream promotion
    /// (§4.3) is a normal, frequent event on a busy mixer, not a rare error
    /// path, so this avoids the one-element-`Vec` allocation `retire` would
    /// otherwise need on every stream completion.
    pub fn retire_one(&self, decoder: Box<dyn Decoder>) {
        self.handles.lock().unwrap().push(decoder);
    }

    /// Drain and drop every handle currently on the list, closing each
    /// decoder off the audio thread. Returns the number reaped.
    pub fn reap(&self) -> usize {
        let drained = {
            let mut handles = self.handles.lock().unwrap();
            std::mem::take(&mut *handles)
        };
        let count = drained.len();
        drop(drained);
        count
    }

    pub fn len(&self) -> usize {
        self.handles.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DyingList {
    fn default() -> Self {
        DyingList::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decoder::VideoMode;

    struct StubDecoder;
    impl Decoder for StubDecoder {
        fn set_window(&mut self, _start_s: f64, _end_s: f64) {}
        fn want_video(&mut self, _mode: VideoMode) {}
        fn start(&mut self) {}
        fn pause(&mut self, _paused: bool) {}
        fn read_audio(&mut self, _out: &mut [i16]) -> usize {
            0
        }
        fn read_video(&mut self) -> Option<crate::audio::decoder::VideoFrame> {
            None
        }
        fn video_ready(&self) -> bool {
            false
        }
        fn duration(&self) -> f64 {
            0.0
        }
        fn wait_ready(&mut self) {}
    }

    #[test]
    fn retire_then_reap_drains_and_reports_count() {
        let list = DyingList::new();
        list.retire(vec![Box::new(StubDecoder), Box::new(StubDecoder)]);
        assert_eq!(list.len(), 2);
        assert_eq!(list.reap(), 2);
        assert!(list.is_empty());
    }

    #[test]
    fn retiring_an_empty_batch_is_a_no_op() {
        let list = DyingList::new();
        list.retire(Vec::new());
        assert!(list.is_empty());
    }

    #[test]
    fn reap_on_empty_list_returns_zero() {
        let list = DyingList::new();
        assert_eq!(list.reap(), 0);
    }
}
