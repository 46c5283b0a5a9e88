//! Resource providers for the pipeline driver.
//!
//! The driver never constructs components itself; it asks a [`MediaBackend`] for each one
//! as the session reaches the point where the required parameters are known.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crate::decode::{Decoder, SymphoniaDecoder};
use crate::error::Result;
use crate::playback::{AudioSink, CpalSink, SinkSpec};
use crate::resample::{Converter, ResamplePlan, Resampler};
use crate::runtime::RuntimeGuard;
use crate::source::{PacketSource, StreamDescriptor, SymphoniaSource};

pub trait MediaBackend {
    type Source: PacketSource;
    type Decoder: Decoder;
    type Converter: Converter;
    type Sink: AudioSink;

    fn open_source(&mut self, input: &str) -> Result<Self::Source>;

    fn open_decoder(&mut self, stream: &StreamDescriptor) -> Result<Self::Decoder>;

    fn open_converter(&mut self, plan: ResamplePlan) -> Result<Self::Converter>;

    fn open_sink(&mut self, spec: &SinkSpec) -> Result<Self::Sink>;
}

/// Symphonia for demux/decode, Rubato for rate conversion, CPAL for output.
pub struct SystemBackend {
    host: cpal::Host,
    cancel: Option<Arc<AtomicBool>>,
    _runtime: RuntimeGuard,
}

impl SystemBackend {
    pub fn new(cancel: Option<Arc<AtomicBool>>) -> Self {
        Self {
            _runtime: RuntimeGuard::acquire(),
            host: cpal::default_host(),
            cancel,
        }
    }
}

impl MediaBackend for SystemBackend {
    type Source = SymphoniaSource;
    type Decoder = SymphoniaDecoder;
    type Converter = Resampler;
    type Sink = CpalSink;

    fn open_source(&mut self, input: &str) -> Result<SymphoniaSource> {
        SymphoniaSource::open(input, self.cancel.clone())
    }

    fn open_decoder(&mut self, stream: &StreamDescriptor) -> Result<SymphoniaDecoder> {
        SymphoniaDecoder::configure(stream)
    }

    fn open_converter(&mut self, plan: ResamplePlan) -> Result<Resampler> {
        Resampler::configure(plan)
    }

    fn open_sink(&mut self, spec: &SinkSpec) -> Result<CpalSink> {
        CpalSink::open(&self.host, spec)
    }
}
