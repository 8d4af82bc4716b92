//! # loomcast
//!
//! A multi-channel real-time audio mixer core for interactive narrative
//! runtimes: per-channel playing/queued stream slots, linear fade/pan/
//! secondary-volume envelopes, gapless tight-queue promotion, and a
//! wait-free-for-the-audio-thread mixing callback.
//!
//! The core (`playback`, `audio::decoder`, `events`, `error`) has no
//! knowledge of real decoders or real audio devices — see
//! [`audio::symphonia_decoder`] and [`audio::output`] for the reference
//! implementations wired up around it.

pub mod audio;
pub mod config;
pub mod error;
pub mod events;
pub mod playback;
pub mod state;

pub use error::{ErrorCode, MixerError, Result};
pub use playback::control::PlayRequest;
pub use state::MixerContext;
