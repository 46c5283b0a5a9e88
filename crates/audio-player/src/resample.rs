//! Conversion stage: source layout/format/rate → interleaved stereo `i16`.
//!
//! Channel layout and sample format are always converted. The rate is passed through
//! unless an explicit output rate is configured, in which case Rubato's sinc resampler
//! runs on fixed-size input chunks and buffers whatever does not fill a chunk. That
//! internal buffering is why callers size their output from
//! [`Converter::max_output_samples`] and never from the frame's own sample count.

use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{
    Async, FixedAsync, Indexing, Resampler as RubatoResampler, SincInterpolationParameters,
    SincInterpolationType, WindowFunction, calculate_cutoff,
};

use crate::buffer::OUTPUT_CHANNELS;
use crate::error::{PlayerError, Result};
use crate::frame::{Frame, FrameSamples, SampleFormat};
use crate::layout::ChannelLayout;
use crate::resource::Release;
use crate::source::StreamDescriptor;

/// A stage that turns decoded frames into interleaved stereo `i16`.
pub trait Converter: Release {
    /// Upper bound on the frames [`Converter::convert`] may produce for `frame`.
    fn max_output_samples(&self, frame: &Frame) -> usize;

    /// Convert `frame` into `out` (sized from the bound) and return the frames produced.
    fn convert(&mut self, frame: &Frame, out: &mut [i16]) -> Result<usize>;

    /// Upper bound on the frames [`Converter::flush`] may produce.
    fn max_flush_samples(&self) -> usize;

    /// Emit anything still buffered internally. Called once at end of stream.
    fn flush(&mut self, out: &mut [i16]) -> Result<usize>;
}

/// Source and target formats for one session.
#[derive(Clone, Debug)]
pub struct ResamplePlan {
    pub source_channels: usize,
    pub source_layout: ChannelLayout,
    pub source_format: Option<SampleFormat>,
    pub source_rate: u32,
    pub target_layout: ChannelLayout,
    pub target_rate: u32,
    pub chunk_frames: usize,
}

impl ResamplePlan {
    /// Plan for a stream: stereo `i16`, at `output_rate` or the source rate.
    pub fn for_stream(
        stream: &StreamDescriptor,
        output_rate: Option<u32>,
        chunk_frames: usize,
    ) -> Self {
        Self {
            source_channels: stream.channels,
            source_layout: stream.layout,
            source_format: stream.sample_format,
            source_rate: stream.sample_rate,
            target_layout: ChannelLayout::stereo(),
            target_rate: output_rate.unwrap_or(stream.sample_rate),
            chunk_frames,
        }
    }

    pub fn converts_rate(&self) -> bool {
        self.source_rate != self.target_rate
    }
}

/// Layout/format converter with optional rate conversion.
pub struct Resampler {
    plan: ResamplePlan,
    matrix: Vec<(f32, f32)>,
    rate: Option<RateStage>,
}

impl Resampler {
    pub fn configure(plan: ResamplePlan) -> Result<Self> {
        if plan.source_layout.count() == 0 {
            return Err(PlayerError::ResampleInit("source layout has no channels".into()));
        }
        if plan.source_layout.count() != plan.source_channels {
            return Err(PlayerError::ResampleInit(format!(
                "source layout describes {} channels but the stream has {}",
                plan.source_layout.count(),
                plan.source_channels
            )));
        }
        if plan.target_layout.count() != OUTPUT_CHANNELS {
            return Err(PlayerError::ResampleInit(format!(
                "target layout must be stereo, got {} channels",
                plan.target_layout.count()
            )));
        }
        if plan.source_rate == 0 || plan.target_rate == 0 {
            return Err(PlayerError::ResampleInit(format!(
                "invalid rates {} Hz -> {} Hz",
                plan.source_rate, plan.target_rate
            )));
        }

        let rate = if plan.converts_rate() {
            Some(RateStage::new(&plan)?)
        } else {
            None
        };

        tracing::debug!(
            src_channels = plan.source_channels,
            src_rate = plan.source_rate,
            dst_rate = plan.target_rate,
            src_format = ?plan.source_format,
            "resampler configured"
        );

        Ok(Self {
            matrix: plan.source_layout.stereo_matrix(),
            plan,
            rate,
        })
    }

    pub fn plan(&self) -> &ResamplePlan {
        &self.plan
    }

    fn check_frame(&self, frame: &Frame) -> Result<()> {
        if frame.channels != self.plan.source_channels {
            return Err(PlayerError::Resample(format!(
                "frame has {} channels, stream was configured with {}",
                frame.channels, self.plan.source_channels
            )));
        }
        Ok(())
    }
}

impl Converter for Resampler {
    fn max_output_samples(&self, frame: &Frame) -> usize {
        match &self.rate {
            None => frame.sample_count(),
            Some(stage) => stage.max_output_frames(frame.sample_count()),
        }
    }

    fn convert(&mut self, frame: &Frame, out: &mut [i16]) -> Result<usize> {
        self.check_frame(frame)?;
        match &mut self.rate {
            None => {
                let frames = frame.sample_count();
                if out.len() < frames * OUTPUT_CHANNELS {
                    return Err(PlayerError::Resample(format!(
                        "output holds {} samples, frame needs {}",
                        out.len(),
                        frames * OUTPUT_CHANNELS
                    )));
                }
                mix_to_i16(frame, &self.matrix, out);
                Ok(frames)
            }
            Some(stage) => {
                let matrix = &self.matrix;
                mix(frame, matrix, |l, r| {
                    stage.pending.push(l);
                    stage.pending.push(r);
                });
                stage.process_full_chunks(out)
            }
        }
    }

    fn max_flush_samples(&self) -> usize {
        self.rate.as_ref().map(RateStage::max_flush_frames).unwrap_or(0)
    }

    fn flush(&mut self, out: &mut [i16]) -> Result<usize> {
        match &mut self.rate {
            None => Ok(0),
            Some(stage) => stage.process_tail(out),
        }
    }
}

impl Release for Resampler {
    fn release(&mut self) {
        if self.rate.take().is_some() {
            tracing::debug!("rate converter released");
        }
    }
}

/// Sinc rate conversion over stereo `f32`, fed in fixed-size chunks.
struct RateStage {
    inner: Box<dyn RubatoResampler<f32>>,
    chunk_frames: usize,
    pending: Vec<f32>,
    scratch: Vec<f32>,
    indexing: Indexing,
}

impl RateStage {
    fn new(plan: &ResamplePlan) -> Result<Self> {
        let f_ratio = plan.target_rate as f64 / plan.source_rate as f64;

        let sinc_len = 128;
        let window = WindowFunction::BlackmanHarris2;
        let params = SincInterpolationParameters {
            sinc_len,
            f_cutoff: calculate_cutoff(sinc_len, window),
            interpolation: SincInterpolationType::Cubic,
            oversampling_factor: 256,
            window,
        };

        let chunk_frames = plan.chunk_frames.max(1);
        let inner = Async::<f32>::new_sinc(
            f_ratio,
            1.1,
            &params,
            chunk_frames,
            OUTPUT_CHANNELS,
            FixedAsync::Input,
        )
        .map_err(|e| PlayerError::ResampleInit(e.to_string()))?;
        let scratch = vec![0.0f32; inner.output_frames_max() * OUTPUT_CHANNELS];

        Ok(Self {
            inner: Box::new(inner),
            chunk_frames,
            pending: Vec::with_capacity(chunk_frames * OUTPUT_CHANNELS * 2),
            scratch,
            indexing: Indexing {
                input_offset: 0,
                output_offset: 0,
                active_channels_mask: None,
                partial_len: None,
            },
        })
    }

    fn pending_frames(&self) -> usize {
        self.pending.len() / OUTPUT_CHANNELS
    }

    fn max_output_frames(&self, incoming_frames: usize) -> usize {
        let chunks = (self.pending_frames() + incoming_frames) / self.chunk_frames;
        chunks * self.inner.output_frames_max()
    }

    fn max_flush_frames(&self) -> usize {
        if self.pending.is_empty() {
            0
        } else {
            self.inner.output_frames_max()
        }
    }

    fn process_full_chunks(&mut self, out: &mut [i16]) -> Result<usize> {
        let mut written = 0;
        while self.pending_frames() >= self.chunk_frames {
            let produced = self.run_chunk(None)?;
            written = self.emit(produced, out, written)?;
            self.pending.drain(..self.chunk_frames * OUTPUT_CHANNELS);
        }
        Ok(written)
    }

    fn process_tail(&mut self, out: &mut [i16]) -> Result<usize> {
        let tail_frames = self.pending_frames();
        if tail_frames == 0 {
            return Ok(0);
        }
        self.pending.resize(self.chunk_frames * OUTPUT_CHANNELS, 0.0);
        let produced = self.run_chunk(Some(tail_frames))?;
        self.pending.clear();
        self.emit(produced, out, 0)
    }

    /// Resample the first chunk of `pending` into `scratch`; returns output frames.
    fn run_chunk(&mut self, partial_len: Option<usize>) -> Result<usize> {
        let input = InterleavedSlice::new(
            &self.pending[..self.chunk_frames * OUTPUT_CHANNELS],
            OUTPUT_CHANNELS,
            self.chunk_frames,
        )
        .map_err(|e| PlayerError::Resample(format!("input adapter: {e}")))?;

        let out_capacity_frames = self.scratch.len() / OUTPUT_CHANNELS;
        let mut output =
            InterleavedSlice::new_mut(&mut self.scratch, OUTPUT_CHANNELS, out_capacity_frames)
                .map_err(|e| PlayerError::Resample(format!("output adapter: {e}")))?;

        self.indexing.input_offset = 0;
        self.indexing.output_offset = 0;
        self.indexing.partial_len = partial_len;

        let (_nbr_in, nbr_out) = self
            .inner
            .process_into_buffer(&input, &mut output, Some(&self.indexing))
            .map_err(|e| PlayerError::Resample(e.to_string()))?;
        Ok(nbr_out)
    }

    /// Copy `frames` resampled frames from `scratch` into `out` at frame offset `at`.
    fn emit(&self, frames: usize, out: &mut [i16], at: usize) -> Result<usize> {
        let start = at * OUTPUT_CHANNELS;
        let end = start + frames * OUTPUT_CHANNELS;
        if end > out.len() {
            return Err(PlayerError::Resample(format!(
                "rate converter produced {} samples past a {}-sample buffer",
                end - out.len(),
                out.len()
            )));
        }
        for (dst, src) in out[start..end].iter_mut().zip(&self.scratch) {
            *dst = f32_to_i16(*src);
        }
        Ok(at + frames)
    }
}

/// Sample types a frame may carry, normalized to `[-1.0, 1.0)`.
trait MixSample: Copy {
    fn to_f32(self) -> f32;
}

impl MixSample for u8 {
    fn to_f32(self) -> f32 {
        (self as f32 - 128.0) / 128.0
    }
}

impl MixSample for i16 {
    fn to_f32(self) -> f32 {
        self as f32 / 32_768.0
    }
}

impl MixSample for i32 {
    fn to_f32(self) -> f32 {
        (self as f64 / 2_147_483_648.0) as f32
    }
}

impl MixSample for f32 {
    fn to_f32(self) -> f32 {
        self
    }
}

impl MixSample for f64 {
    fn to_f32(self) -> f32 {
        self as f32
    }
}

fn f32_to_i16(x: f32) -> i16 {
    (x * 32_768.0).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Downmix/upmix every source frame to a stereo pair.
fn mix(frame: &Frame, matrix: &[(f32, f32)], emit: impl FnMut(f32, f32)) {
    match &frame.samples {
        FrameSamples::U8(v) => mix_slice(v, frame.channels, matrix, emit),
        FrameSamples::S16(v) => mix_slice(v, frame.channels, matrix, emit),
        FrameSamples::S32(v) => mix_slice(v, frame.channels, matrix, emit),
        FrameSamples::F32(v) => mix_slice(v, frame.channels, matrix, emit),
        FrameSamples::F64(v) => mix_slice(v, frame.channels, matrix, emit),
    }
}

fn mix_slice<T: MixSample>(
    samples: &[T],
    channels: usize,
    matrix: &[(f32, f32)],
    mut emit: impl FnMut(f32, f32),
) {
    for source in samples.chunks_exact(channels) {
        let (mut l, mut r) = (0.0f32, 0.0f32);
        for (x, (ml, mr)) in source.iter().zip(matrix) {
            let x = x.to_f32();
            l += x * ml;
            r += x * mr;
        }
        emit(l, r);
    }
}

fn mix_to_i16(frame: &Frame, matrix: &[(f32, f32)], out: &mut [i16]) {
    if let FrameSamples::S16(v) = &frame.samples {
        match frame.channels {
            2 if matrix == [(1.0, 0.0), (0.0, 1.0)] => {
                out[..v.len()].copy_from_slice(v);
                return;
            }
            1 => {
                for (pair, s) in out.chunks_exact_mut(OUTPUT_CHANNELS).zip(v) {
                    pair[0] = *s;
                    pair[1] = *s;
                }
                return;
            }
            _ => {}
        }
    }

    let mut i = 0;
    mix(frame, matrix, |l, r| {
        out[i] = f32_to_i16(l);
        out[i + 1] = f32_to_i16(r);
        i += OUTPUT_CHANNELS;
    });
}
