use std::fmt;

/// Lifecycle of one playback session.
///
/// `Closed` and `Errored` are terminal; `Errored` is reachable from every non-terminal
/// state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Opening,
    Negotiating,
    Streaming,
    Draining,
    Closed,
    Errored,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Closed | PipelineState::Errored)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Opening => "opening",
            PipelineState::Negotiating => "negotiating",
            PipelineState::Streaming => "streaming",
            PipelineState::Draining => "draining",
            PipelineState::Closed => "closed",
            PipelineState::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// What a session did, reported whether it ended normally or not.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlaybackSummary {
    /// Packets of the selected stream pulled from the source.
    pub packets_read: u64,
    /// Packets the decoder rejected and the driver dropped.
    pub packets_skipped: u64,
    /// Frames decoded while streaming.
    pub frames_decoded: u64,
    /// Frames that only came out of the decoder flush.
    pub frames_drained: u64,
    /// Stereo frames handed to the sink.
    pub samples_written: u64,
    /// Successful sink writes.
    pub writes: u64,
    /// Output sample rate.
    pub output_rate: Option<u32>,
}
