//! The opaque decoder contract the mixer core is built against.
//!
//! The core never knows how a stream is decoded — only that it can be asked
//! for interleaved signed-16-bit stereo PCM, paused, windowed to a start/end
//! offset, and eventually closed. Everything in this module is a trait; the
//! concrete implementation lives in [`crate::audio::symphonia_decoder`] and
//! is wired up by the host, not by `playback::`.

use std::io::{Read, Seek};

use crate::error::DecoderError;

/// A seekable byte source handed to [`DecoderFactory::open`].
pub trait Source: Read + Seek + Send {}
impl<T: Read + Seek + Send> Source for T {}

/// Video decoding mode, set via `set_video` before a stream is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoMode {
    /// No video decoding.
    #[default]
    AudioOnly,
    /// Decode video, dropping late frames to keep up with audio.
    DroppingFrames,
    /// Decode video, never dropping frames even if late.
    NoDropping,
}

/// A single decoded video frame, handed to the host's surface/video object.
/// The core treats the payload as opaque; only width/height are inspected.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// One open decoder handle (§6.2). Implementations are not required to be
/// `Sync`; the core only ever touches a given handle from one thread at a
/// time (the audio thread while playing, the application thread while
/// opening/closing), so `Send` alone is sufficient.
pub trait Decoder: Send {
    /// Clamp playback to `[start_s, end_s]`. `end_s <= 0.0` means "to end".
    fn set_window(&mut self, start_s: f64, end_s: f64);

    /// Enable or disable video decoding for this handle.
    fn want_video(&mut self, mode: VideoMode);

    /// Begin producing samples from the start of the configured window.
    fn start(&mut self);

    /// Pause or resume decoding (distinct from the channel's own pause flag;
    /// lets the decoder release resources or stop read-ahead while paused).
    fn pause(&mut self, paused: bool);

    /// Fill `out` (interleaved stereo, one element per sample) with up to
    /// `out.len() / 2` frames of PCM at the output sample rate. Returns the
    /// number of frames actually written; 0 means end-of-stream. The decoder
    /// is responsible for resampling to the output rate — the core never
    /// resamples (§1 Non-goals).
    fn read_audio(&mut self, out: &mut [i16]) -> usize;

    /// Pull a decoded video frame if one is ready, else `None`.
    fn read_video(&mut self) -> Option<VideoFrame>;

    /// Whether a video frame is currently ready without blocking.
    fn video_ready(&self) -> bool;

    /// Total duration of the underlying stream, in seconds (0.0 if unknown).
    fn duration(&self) -> f64;

    /// Block until the decoder can deliver its first samples. Callers that
    /// bridge to a host language with a global interpreter lock must release
    /// it for the duration of this call (§4.5 `unpause_all_at_start`).
    fn wait_ready(&mut self);
}

/// Opens new [`Decoder`] handles. The core holds one `Arc<dyn DecoderFactory>`
/// and calls it from `play`/`queue`; it never constructs decoders itself.
pub trait DecoderFactory: Send + Sync {
    /// Open `source` for decoding, using `ext` (a file-extension-style hint,
    /// e.g. `"wav"`) to help with codec selection.
    fn open(
        &self,
        source: Box<dyn Source>,
        ext: Option<&str>,
    ) -> Result<Box<dyn Decoder>, DecoderError>;
}
