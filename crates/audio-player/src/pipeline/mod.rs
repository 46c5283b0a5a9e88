//! Pipeline driver: read → decode → convert → gain → write, then drain.
//!
//! One session runs synchronously on the calling thread:
//! 1. **Opening**: the backend opens the source and selects the audio stream.
//! 2. **Negotiating**: decoder, converter and sink are configured from the stream.
//! 3. **Streaming**: one packet at a time until the source is exhausted. Rejected packets
//!    are skipped; any other failure (notably a sink write) aborts the session.
//! 4. **Draining**: the decoder is flushed and its buffered frames take the same path,
//!    followed by the converter's tail; then the sink plays out what it holds.
//!
//! Every resource is held in a [`Scoped`] wrapper and released in reverse acquisition
//! order on every exit path.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::backend::MediaBackend;
use crate::buffer::{OUTPUT_CHANNELS, OutputBuffer};
use crate::config::PlaybackConfig;
use crate::decode::{Decoder, drain_frames};
use crate::error::{PlayerError, Result};
use crate::frame::Frame;
use crate::gain::apply_gain;
use crate::playback::{AudioSink, SinkSpec};
use crate::resample::{Converter, ResamplePlan};
use crate::resource::Scoped;
use crate::source::PacketSource;
use crate::status::{PipelineState, PlaybackSummary};

#[cfg(test)]
mod tests;

pub struct Pipeline<B: MediaBackend> {
    backend: B,
    config: PlaybackConfig,
    cancel: Option<Arc<AtomicBool>>,
    state: PipelineState,
    summary: PlaybackSummary,
}

/// Downstream stages borrowed for the length of a session.
struct Stages<'a, C, K> {
    converter: &'a mut C,
    sink: &'a mut K,
    output: &'a mut OutputBuffer,
    gain: f32,
}

impl<B: MediaBackend> Pipeline<B> {
    pub fn new(backend: B, config: PlaybackConfig) -> Self {
        Self {
            backend,
            config,
            cancel: None,
            state: PipelineState::Idle,
            summary: PlaybackSummary::default(),
        }
    }

    /// Abort the session at the next packet, frame or drain step once `cancel` is set.
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Counters from the most recent session, including one that failed.
    pub fn summary(&self) -> &PlaybackSummary {
        &self.summary
    }

    /// Play `input` to completion.
    pub fn run(&mut self, input: &str) -> Result<PlaybackSummary> {
        self.summary = PlaybackSummary::default();
        self.state = PipelineState::Idle;

        match self.run_session(input) {
            Ok(()) => {
                self.transition(PipelineState::Closed);
                Ok(self.summary.clone())
            }
            Err(e) => {
                self.transition(PipelineState::Errored);
                Err(e)
            }
        }
    }

    fn run_session(&mut self, input: &str) -> Result<()> {
        self.transition(PipelineState::Opening);
        let mut source = Scoped::new(self.backend.open_source(input)?);
        let stream = source.stream().clone();

        self.transition(PipelineState::Negotiating);
        let mut decoder = Scoped::new(self.backend.open_decoder(&stream)?);
        let plan = ResamplePlan::for_stream(
            &stream,
            self.config.output_rate,
            self.config.chunk_frames,
        );
        let rate = plan.target_rate;
        let mut converter = Scoped::new(self.backend.open_converter(plan)?);
        let mut sink = Scoped::new(self.backend.open_sink(&SinkSpec {
            rate,
            channels: OUTPUT_CHANNELS as u16,
            device: self.config.device.clone(),
            buffer_seconds: self.config.buffer_seconds,
        })?);
        let mut output = OutputBuffer::new();
        self.summary.output_rate = Some(rate);

        let mut stages = Stages {
            converter: &mut *converter,
            sink: &mut *sink,
            output: &mut output,
            gain: self.config.gain,
        };

        self.transition(PipelineState::Streaming);
        let mut result = self.stream_packets(&mut *source, &mut *decoder, &mut stages);
        if result.is_ok() {
            self.transition(PipelineState::Draining);
            result = self.drain(&mut *decoder, &mut stages);
        }

        output.release();
        sink.release();
        converter.release();
        decoder.release();
        source.release();
        result
    }

    fn stream_packets(
        &mut self,
        source: &mut B::Source,
        decoder: &mut B::Decoder,
        stages: &mut Stages<'_, B::Converter, B::Sink>,
    ) -> Result<()> {
        while let Some(packet) = source.next_packet()? {
            self.check_cancelled()?;
            self.summary.packets_read += 1;

            match decoder.submit(packet) {
                Ok(()) => {}
                Err(e) if e.is_recoverable() => {
                    self.summary.packets_skipped += 1;
                    tracing::debug!("{e}");
                    continue;
                }
                Err(e) => return Err(e),
            }

            for frame in drain_frames(decoder) {
                let frame = frame?;
                self.summary.frames_decoded += 1;
                stages.emit(&frame, &mut self.summary)?;
            }
        }
        // A cancelled remote read looks like end of stream to the demuxer.
        self.check_cancelled()
    }

    fn drain(
        &mut self,
        decoder: &mut B::Decoder,
        stages: &mut Stages<'_, B::Converter, B::Sink>,
    ) -> Result<()> {
        decoder.flush()?;
        for frame in drain_frames(decoder) {
            let frame = frame?;
            self.check_cancelled()?;
            self.summary.frames_drained += 1;
            stages.emit(&frame, &mut self.summary)?;
        }
        self.check_cancelled()?;
        stages.flush(&mut self.summary)?;
        self.check_cancelled()?;
        stages.sink.finish()?;
        self.check_cancelled()
    }

    fn check_cancelled(&self) -> Result<()> {
        if self
            .cancel
            .as_ref()
            .is_some_and(|c| c.load(Ordering::Relaxed))
        {
            return Err(PlayerError::Cancelled);
        }
        Ok(())
    }

    fn transition(&mut self, next: PipelineState) {
        tracing::debug!(from = %self.state, to = %next, "pipeline state");
        self.state = next;
    }
}

impl<C: Converter, K: AudioSink> Stages<'_, C, K> {
    fn emit(&mut self, frame: &Frame, summary: &mut PlaybackSummary) -> Result<()> {
        let bound = self.converter.max_output_samples(frame);
        let produced = self.converter.convert(frame, self.output.prepare(bound))?;
        self.write(produced, summary)
    }

    /// Push out whatever the converter still buffers.
    fn flush(&mut self, summary: &mut PlaybackSummary) -> Result<()> {
        let bound = self.converter.max_flush_samples();
        let produced = self.converter.flush(self.output.prepare(bound))?;
        self.write(produced, summary)
    }

    fn write(&mut self, produced: usize, summary: &mut PlaybackSummary) -> Result<()> {
        let samples = self.output.commit(produced)?;
        if produced == 0 {
            return Ok(());
        }
        apply_gain(samples, self.gain);
        self.sink.write(samples)?;
        summary.writes += 1;
        summary.samples_written += produced as u64;
        Ok(())
    }
}
