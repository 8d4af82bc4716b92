//! Error types for the mixer core and its ambient stack.
//!
//! The control API (§4.5/§6.3 of the design) reports failures two ways at once:
//! entry points return a `Result` for normal Rust error handling, and also stash
//! an [`ErrorCode`] + message that mirrors the legacy "last error" accessor model
//! so host bindings that expect a process-wide error code still have one to read.

use thiserror::Error;

/// Process-wide-style error code, mirroring the four-way taxonomy from the
/// control API surface: validation/generic errors, device errors, and codec
/// errors are distinguished so a host binding can react differently to each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// No error; the previous operation completed normally.
    Success = 0,
    /// Error reported verbatim by the host device subsystem.
    DeviceError = -1,
    /// Decoder/codec failure opening or reading a stream.
    SoundError = -2,
    /// Validation or allocation failure internal to the core.
    Generic = -3,
}

impl ErrorCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Top-level error type for the mixer core.
#[derive(Debug, Error)]
pub enum MixerError {
    /// A channel index was negative, or otherwise could not be resolved.
    #[error("invalid channel index: {0}")]
    InvalidChannel(i64),

    /// The channel table could not grow to the requested index.
    #[error("channel table cannot grow to index {requested} (capacity limit {limit})")]
    ChannelTableOverflow { requested: usize, limit: usize },

    /// Opening or reading from a decoder failed.
    #[error("decoder error: {0}")]
    Decoder(#[from] DecoderError),

    /// The host audio device subsystem reported an error.
    #[error("audio device error: {0}")]
    Device(String),

    /// Catch-all for conditions that don't fit the other variants.
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl MixerError {
    /// Maps this error onto the legacy three-way error code taxonomy (§6.3/§7).
    pub fn code(&self) -> ErrorCode {
        match self {
            MixerError::InvalidChannel(_) | MixerError::ChannelTableOverflow { .. } => {
                ErrorCode::Generic
            }
            MixerError::Decoder(_) => ErrorCode::SoundError,
            MixerError::Device(_) => ErrorCode::DeviceError,
            MixerError::Other(_) => ErrorCode::Generic,
        }
    }
}

/// Errors raised by a [`crate::audio::decoder::Decoder`] implementation.
#[derive(Debug, Error, Clone)]
pub enum DecoderError {
    #[error("failed to open source: {0}")]
    Open(String),

    #[error("unsupported format (extension hint: {0:?})")]
    UnsupportedFormat(Option<String>),

    #[error("read error: {0}")]
    Read(String),

    #[error("seek/window error: {0}")]
    Seek(String),
}

pub type Result<T> = std::result::Result<T, MixerError>;
