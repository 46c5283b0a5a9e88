//! Decoded audio frames in their native sample representation.

use symphonia::core::audio::AudioBufferRef;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::sample::SampleFormat as CodecSampleFormat;

/// Native sample representation of decoded audio.
///
/// Narrower or unsigned codec formats are widened to the closest variant when the frame
/// is copied out of the codec.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleFormat {
    U8,
    S16,
    S32,
    F32,
    F64,
}

impl SampleFormat {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::S16 => 2,
            SampleFormat::S32 | SampleFormat::F32 => 4,
            SampleFormat::F64 => 8,
        }
    }

    /// Map a codec-reported format onto the representation frames will carry.
    pub fn from_codec(format: CodecSampleFormat) -> Self {
        match format {
            CodecSampleFormat::U8 => SampleFormat::U8,
            CodecSampleFormat::U16 | CodecSampleFormat::S8 | CodecSampleFormat::S16 => {
                SampleFormat::S16
            }
            CodecSampleFormat::U24
            | CodecSampleFormat::U32
            | CodecSampleFormat::S24
            | CodecSampleFormat::S32 => SampleFormat::S32,
            CodecSampleFormat::F32 => SampleFormat::F32,
            CodecSampleFormat::F64 => SampleFormat::F64,
        }
    }
}

/// Interleaved samples, one variant per [`SampleFormat`].
#[derive(Clone, Debug, PartialEq)]
pub enum FrameSamples {
    U8(Vec<u8>),
    S16(Vec<i16>),
    S32(Vec<i32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl FrameSamples {
    pub fn format(&self) -> SampleFormat {
        match self {
            FrameSamples::U8(_) => SampleFormat::U8,
            FrameSamples::S16(_) => SampleFormat::S16,
            FrameSamples::S32(_) => SampleFormat::S32,
            FrameSamples::F32(_) => SampleFormat::F32,
            FrameSamples::F64(_) => SampleFormat::F64,
        }
    }

    /// Total interleaved samples across all channels.
    pub fn len(&self) -> usize {
        match self {
            FrameSamples::U8(v) => v.len(),
            FrameSamples::S16(v) => v.len(),
            FrameSamples::S32(v) => v.len(),
            FrameSamples::F32(v) => v.len(),
            FrameSamples::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A unit of decoded audio: interleaved samples plus the shape needed to interpret them.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub rate: u32,
    pub channels: usize,
    pub samples: FrameSamples,
}

impl Frame {
    pub fn new(rate: u32, channels: usize, samples: FrameSamples) -> Self {
        Self {
            rate,
            channels,
            samples,
        }
    }

    /// Samples per channel.
    pub fn sample_count(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels
    }

    pub fn format(&self) -> SampleFormat {
        self.samples.format()
    }

    /// Copy a decoded codec buffer into an owned, interleaved frame.
    pub fn from_decoded(decoded: AudioBufferRef<'_>) -> Self {
        let spec = *decoded.spec();
        let format = match &decoded {
            AudioBufferRef::U8(_) => SampleFormat::U8,
            AudioBufferRef::U16(_) | AudioBufferRef::S8(_) | AudioBufferRef::S16(_) => {
                SampleFormat::S16
            }
            AudioBufferRef::U24(_)
            | AudioBufferRef::U32(_)
            | AudioBufferRef::S24(_)
            | AudioBufferRef::S32(_) => SampleFormat::S32,
            AudioBufferRef::F32(_) => SampleFormat::F32,
            AudioBufferRef::F64(_) => SampleFormat::F64,
        };
        let samples = match format {
            SampleFormat::U8 => FrameSamples::U8(interleave(decoded)),
            SampleFormat::S16 => FrameSamples::S16(interleave(decoded)),
            SampleFormat::S32 => FrameSamples::S32(interleave(decoded)),
            SampleFormat::F32 => FrameSamples::F32(interleave(decoded)),
            SampleFormat::F64 => FrameSamples::F64(interleave(decoded)),
        };
        Self {
            rate: spec.rate,
            channels: spec.channels.count(),
            samples,
        }
    }
}

fn interleave<T>(decoded: AudioBufferRef<'_>) -> Vec<T>
where
    T: symphonia::core::sample::Sample + symphonia::core::conv::ConvertibleSample,
{
    let mut buf = SampleBuffer::<T>::new(decoded.frames() as u64, *decoded.spec());
    buf.copy_interleaved_ref(decoded);
    buf.samples().to_vec()
}
