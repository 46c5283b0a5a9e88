pub use audio_player::config::PlaybackConfig;

use crate::cli::Args;

/// Longest queue the sink will allocate for.
pub const MAX_BUFFER_SECONDS: f32 = 10.0;
/// Largest resampler input chunk.
pub const MAX_CHUNK_FRAMES: usize = 16_384;

/// Playback settings for one invocation.
#[derive(Clone, Debug)]
pub struct PlayConfig {
    pub input: String,
    pub playback: PlaybackConfig,
}

impl PlayConfig {
    /// `None` when no input was given (only valid with `--list-devices`).
    pub fn from_args(args: &Args) -> Option<Self> {
        let input = args.path.clone()?;
        let defaults = PlaybackConfig::default();
        Some(Self {
            input,
            playback: PlaybackConfig {
                gain: args.effective_gain(),
                device: args.device.clone(),
                output_rate: args.output_rate,
                buffer_seconds: if args.buffer_seconds.is_finite() && args.buffer_seconds > 0.0 {
                    args.buffer_seconds.min(MAX_BUFFER_SECONDS)
                } else {
                    defaults.buffer_seconds
                },
                chunk_frames: args.chunk_frames.clamp(1, MAX_CHUNK_FRAMES),
            },
        })
    }
}
