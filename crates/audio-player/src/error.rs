//! Error taxonomy for the playback pipeline.
//!
//! Every fatal variant names the component that failed so the binary can print a
//! single tagged line. [`PlayerError::SkippedPacket`] is the only recoverable variant:
//! the driver absorbs it and keeps streaming.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlayerError {
    /// The input could not be opened or its container could not be parsed.
    #[error("[source] failed to open {path}: {reason}")]
    Open { path: String, reason: String },

    /// The container holds no decodable audio track.
    #[error("[source] no audio stream found in {path}")]
    NoAudioStream { path: String },

    /// The codec could not be initialized for the selected stream.
    #[error("[decoder] failed to open codec: {0}")]
    CodecOpen(String),

    /// The conversion stage could not be configured.
    #[error("[resampler] initialization failed: {0}")]
    ResampleInit(String),

    /// Conversion failed mid-stream (converter error or an over-reported sample count).
    #[error("[resampler] conversion failed: {0}")]
    Resample(String),

    /// No usable output device exists.
    #[error("[output] no output device: {0}")]
    NoOutputDevice(String),

    /// The device exists but the output stream could not be configured or started.
    #[error("[output] failed to open output stream: {0}")]
    StreamOpen(String),

    /// Writing to the device failed; playback cannot continue.
    #[error("[output] write failed (buffer underrun?): {0}")]
    Underrun(String),

    /// Playback was interrupted from outside (Ctrl-C).
    #[error("[player] playback cancelled")]
    Cancelled,

    /// A single packet was rejected by the codec and dropped.
    #[error("[decoder] packet skipped: {0}")]
    SkippedPacket(String),
}

impl PlayerError {
    /// Whether the driver may drop the offending unit of work and continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PlayerError::SkippedPacket(_))
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        1
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;
