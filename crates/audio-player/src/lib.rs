//! Decode a local or remote audio file and play it on an output device.
//!
//! Stages, in pipeline order:
//! - [`source`]: container probing and packet production
//! - [`decode`]: packet → native-format frame
//! - [`resample`]: any layout/format (and optionally rate) → stereo `i16`
//! - [`gain`]: linear volume
//! - [`playback`]: bounded queue into a CPAL output stream
//!
//! [`pipeline::Pipeline`] drives one session over a [`backend::MediaBackend`].

pub mod backend;
pub mod buffer;
pub mod config;
pub mod decode;
pub mod device;
pub mod error;
pub mod frame;
pub mod gain;
pub mod http_stream;
pub mod layout;
pub mod pipeline;
pub mod playback;
pub mod queue;
pub mod resample;
pub mod resource;
pub mod runtime;
pub mod source;
pub mod status;

pub use backend::{MediaBackend, SystemBackend};
pub use config::PlaybackConfig;
pub use error::{PlayerError, Result};
pub use pipeline::Pipeline;
pub use status::{PipelineState, PlaybackSummary};
