//! Sink writer (CPAL output stream).
//!
//! [`CpalSink::open`] builds an output stream for stereo `i16` at a fixed rate. The
//! driver's [`AudioSink::write`] pushes into a bounded [`DeviceQueue`] and blocks while it
//! is full. The real-time callback:
//! - pulls whole frames from the queue without blocking
//! - converts `i16` to the device sample format when the device does not take `i16`
//! - fills any shortfall with silence and counts it as an underrun

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};

use crate::buffer::OUTPUT_CHANNELS;
use crate::device;
use crate::error::{PlayerError, Result};
use crate::queue::{DeviceQueue, calc_max_buffered_samples};
use crate::resource::Release;

/// Destination for converted, gain-adjusted audio.
pub trait AudioSink: Release {
    /// Queue interleaved stereo samples, blocking until the device has room for them.
    fn write(&mut self, samples: &[i16]) -> Result<()>;

    /// Let everything written so far play out. Only called on normal end of stream.
    fn finish(&mut self) -> Result<()>;
}

/// Parameters the sink is opened with.
#[derive(Clone, Debug)]
pub struct SinkSpec {
    pub rate: u32,
    pub channels: u16,
    pub device: Option<String>,
    pub buffer_seconds: f32,
}

/// Counters shared with the output callback.
#[derive(Debug, Default)]
pub struct SinkCounters {
    pub played_frames: AtomicU64,
    pub underrun_events: AtomicU64,
    pub underrun_frames: AtomicU64,
}

pub struct CpalSink {
    stream: Option<cpal::Stream>,
    queue: Arc<DeviceQueue>,
    counters: Arc<SinkCounters>,
    device_name: String,
}

impl CpalSink {
    pub fn open(host: &cpal::Host, spec: &SinkSpec) -> Result<Self> {
        let device = device::pick_device(host, spec.device.as_deref())
            .map_err(|e| PlayerError::NoOutputDevice(format!("{e:#}")))?;
        let device_name = device
            .description()
            .map(|d| d.name().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        let supported = device::pick_output_config(&device, spec.rate, spec.channels)
            .map_err(|e| PlayerError::StreamOpen(format!("{device_name}: {e:#}")))?;
        let mut config: cpal::StreamConfig = supported.config();
        if let Some(size) = device::pick_buffer_size(&supported) {
            config.buffer_size = size;
        }

        let queue = Arc::new(DeviceQueue::new(
            OUTPUT_CHANNELS,
            calc_max_buffered_samples(spec.rate, OUTPUT_CHANNELS, spec.buffer_seconds),
        ));
        let counters = Arc::new(SinkCounters::default());

        let stream = build_output_stream(
            &device,
            &config,
            supported.sample_format(),
            &queue,
            &counters,
        )?;
        stream
            .play()
            .map_err(|e| PlayerError::StreamOpen(format!("{device_name}: {e}")))?;

        tracing::debug!(
            device = %device_name,
            rate_hz = spec.rate,
            format = ?supported.sample_format(),
            "output stream started"
        );

        Ok(Self {
            stream: Some(stream),
            queue,
            counters,
            device_name,
        })
    }

}

impl AudioSink for CpalSink {
    fn write(&mut self, samples: &[i16]) -> Result<()> {
        if self.stream.is_none() {
            return Err(PlayerError::Underrun("output stream closed".into()));
        }
        self.queue.push_blocking(samples).map_err(PlayerError::Underrun)
    }

    fn finish(&mut self) -> Result<()> {
        self.queue.close();
        if let Some(reason) = self.queue.wait_until_drained() {
            return Err(PlayerError::Underrun(reason));
        }
        // The callback has taken the last samples; give the device time to play them.
        thread::sleep(Duration::from_millis(100));
        Ok(())
    }
}

impl Release for CpalSink {
    fn release(&mut self) {
        self.queue.close();
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                tracing::debug!("pausing output stream failed: {e}");
            }
            drop(stream);
            let underruns = self.counters.underrun_events.load(Ordering::Relaxed);
            tracing::debug!(
                device = %self.device_name,
                played_frames = self.counters.played_frames.load(Ordering::Relaxed),
                underruns,
                underrun_frames = self.counters.underrun_frames.load(Ordering::Relaxed),
                "output stream closed"
            );
        }
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        self.release();
    }
}

/// Build a CPAL output stream fed from `queue`, in the device's sample format.
pub fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    queue: &Arc<DeviceQueue>,
    counters: &Arc<SinkCounters>,
) -> Result<cpal::Stream> {
    match sample_format {
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, queue, counters),
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, queue, counters),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, queue, counters),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, queue, counters),
        other => Err(PlayerError::StreamOpen(format!(
            "unsupported sample format: {other:?}"
        ))),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    queue: &Arc<DeviceQueue>,
    counters: &Arc<SinkCounters>,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<i16> + Send + 'static,
{
    let channels_out = config.channels as usize;
    let queue_cb = queue.clone();
    let queue_err = queue.clone();
    let counters_cb = counters.clone();
    let mut staged: Vec<i16> = Vec::new();
    let silence = <T as cpal::Sample>::from_sample::<i16>(0);

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [T], _| {
                let frames = data.len() / channels_out;
                staged.clear();
                queue_cb.pop_into(&mut staged, frames);
                let got = staged.len() / OUTPUT_CHANNELS;

                for (dst, src) in data
                    .chunks_exact_mut(channels_out)
                    .zip(staged.chunks_exact(OUTPUT_CHANNELS))
                {
                    for (ch, out) in dst.iter_mut().enumerate() {
                        *out = <T as cpal::Sample>::from_sample::<i16>(src[ch.min(1)]);
                    }
                }
                data[got * channels_out..].fill(silence);

                if got > 0 {
                    counters_cb.played_frames.fetch_add(got as u64, Ordering::Relaxed);
                }
                // Starved while still expecting input: an underrun.
                if got < frames && !queue_cb.is_drained() {
                    counters_cb.underrun_events.fetch_add(1, Ordering::Relaxed);
                    counters_cb
                        .underrun_frames
                        .fetch_add((frames - got) as u64, Ordering::Relaxed);
                }
            },
            move |err| {
                tracing::error!("[output] stream error: {err}");
                queue_err.fail(err.to_string());
            },
            None,
        )
        .map_err(|e| PlayerError::StreamOpen(e.to_string()))?;

    Ok(stream)
}
