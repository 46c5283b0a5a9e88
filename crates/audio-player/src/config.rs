/// Playback parameters shared by the resample, gain and output stages.
#[derive(Clone, Debug)]
pub struct PlaybackConfig {
    /// Linear gain applied to every output sample.
    pub gain: f32,
    /// Output device substring match; `None` uses the host default.
    pub device: Option<String>,
    /// Output sample rate. `None` keeps the source rate (no rate conversion).
    pub output_rate: Option<u32>,
    /// Target duration of audio buffered between the driver and the device callback.
    pub buffer_seconds: f32,
    /// Rate converter input chunk size in frames (only used when `output_rate` differs).
    pub chunk_frames: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            gain: 1.0,
            device: None,
            output_rate: None,
            buffer_seconds: 0.5,
            chunk_frames: 1024,
        }
    }
}
