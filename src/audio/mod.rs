//! Audio data types, the opaque decoder contract, and the host-facing device
//! layer built around the mixer core.

pub mod decoder;
pub mod output;
pub mod symphonia_decoder;
pub mod types;

pub use types::{clip_to_i16, AudioFrame};
