use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use symphonia::core::audio::Channels;
use symphonia::core::codecs::CodecParameters;

use super::*;
use crate::decode::SymphoniaDecoder;
use crate::frame::FrameSamples;
use crate::layout::ChannelLayout;
use crate::resample::Resampler;
use crate::resource::Release;
use crate::source::tests::{wav_bytes, write_temp_wav};
use crate::source::{Packet, StreamDescriptor, SymphoniaSource};

const FRAME_SAMPLES: usize = 4;

/// Shared record of what the stubs saw.
#[derive(Clone, Default)]
struct Log(Rc<RefCell<Vec<String>>>);

impl Log {
    fn push(&self, entry: &str) {
        self.0.borrow_mut().push(entry.to_string());
    }

    fn count(&self, entry: &str) -> usize {
        self.0.borrow().iter().filter(|e| *e == entry).count()
    }

    fn releases(&self) -> Vec<String> {
        self.0
            .borrow()
            .iter()
            .filter(|e| e.starts_with("release "))
            .cloned()
            .collect()
    }
}

fn mono_stream() -> StreamDescriptor {
    StreamDescriptor {
        index: 0,
        codec_params: CodecParameters::new(),
        sample_rate: 8_000,
        channels: 1,
        layout: ChannelLayout::from_positions(Channels::FRONT_LEFT),
        sample_format: Some(crate::frame::SampleFormat::S16),
        codec: None,
        duration_ms: None,
    }
}

fn packet(ts: u64) -> Packet {
    Packet {
        stream_index: 0,
        ts,
        dur: FRAME_SAMPLES as u64,
        data: vec![0u8; FRAME_SAMPLES * 2].into_boxed_slice(),
    }
}

struct StubSource {
    stream: StreamDescriptor,
    packets: VecDeque<Packet>,
    log: Log,
}

impl Release for StubSource {
    fn release(&mut self) {
        self.log.push("release source");
    }
}

impl PacketSource for StubSource {
    fn stream(&self) -> &StreamDescriptor {
        &self.stream
    }

    fn next_packet(&mut self) -> Result<Option<Packet>> {
        Ok(self.packets.pop_front())
    }
}

/// Holds back the last `delay` frames until flushed; rejects packets whose `ts` is listed.
struct StubDecoder {
    delay: usize,
    reject: Vec<u64>,
    held: VecDeque<Frame>,
    ready: VecDeque<Frame>,
    log: Log,
}

impl Release for StubDecoder {
    fn release(&mut self) {
        self.log.push("release decoder");
    }
}

impl Decoder for StubDecoder {
    fn submit(&mut self, packet: Packet) -> Result<()> {
        if self.reject.contains(&packet.ts) {
            return Err(PlayerError::SkippedPacket(format!("bad packet {}", packet.ts)));
        }
        let samples = vec![packet.ts as i16 * 100; FRAME_SAMPLES];
        self.held
            .push_back(Frame::new(8_000, 1, FrameSamples::S16(samples)));
        while self.held.len() > self.delay {
            if let Some(frame) = self.held.pop_front() {
                self.ready.push_back(frame);
            }
        }
        Ok(())
    }

    fn receive_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.ready.pop_front())
    }

    fn flush(&mut self) -> Result<()> {
        self.log.push("flush decoder");
        self.ready.extend(self.held.drain(..));
        Ok(())
    }
}

struct LoggedConverter {
    inner: Resampler,
    log: Log,
}

impl Release for LoggedConverter {
    fn release(&mut self) {
        self.inner.release();
        self.log.push("release converter");
    }
}

impl Converter for LoggedConverter {
    fn max_output_samples(&self, frame: &Frame) -> usize {
        self.inner.max_output_samples(frame)
    }

    fn convert(&mut self, frame: &Frame, out: &mut [i16]) -> Result<usize> {
        self.inner.convert(frame, out)
    }

    fn max_flush_samples(&self) -> usize {
        self.inner.max_flush_samples()
    }

    fn flush(&mut self, out: &mut [i16]) -> Result<usize> {
        self.inner.flush(out)
    }
}

struct StubSink {
    fail_on: Option<usize>,
    /// Raise the flag during this write, as a Ctrl-C would.
    cancel_on: Option<(usize, Arc<AtomicBool>)>,
    calls: usize,
    written: Rc<RefCell<Vec<i16>>>,
    log: Log,
}

impl Release for StubSink {
    fn release(&mut self) {
        self.log.push("release sink");
    }
}

impl AudioSink for StubSink {
    fn write(&mut self, samples: &[i16]) -> Result<()> {
        self.calls += 1;
        self.log.push("write");
        if let Some((call, flag)) = &self.cancel_on {
            if *call == self.calls {
                flag.store(true, Ordering::Relaxed);
            }
        }
        if self.fail_on == Some(self.calls) {
            return Err(PlayerError::Underrun("device gone".into()));
        }
        self.written.borrow_mut().extend_from_slice(samples);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.log.push("finish");
        Ok(())
    }
}

#[derive(Default)]
struct StubBackend {
    packets: u64,
    delay: usize,
    reject: Vec<u64>,
    fail_on: Option<usize>,
    cancel_on: Option<(usize, Arc<AtomicBool>)>,
    no_stream: bool,
    log: Log,
    written: Rc<RefCell<Vec<i16>>>,
}

impl MediaBackend for StubBackend {
    type Source = StubSource;
    type Decoder = StubDecoder;
    type Converter = LoggedConverter;
    type Sink = StubSink;

    fn open_source(&mut self, input: &str) -> Result<StubSource> {
        if self.no_stream {
            return Err(PlayerError::NoAudioStream {
                path: input.to_string(),
            });
        }
        Ok(StubSource {
            stream: mono_stream(),
            packets: (0..self.packets).map(packet).collect(),
            log: self.log.clone(),
        })
    }

    fn open_decoder(&mut self, _stream: &StreamDescriptor) -> Result<StubDecoder> {
        Ok(StubDecoder {
            delay: self.delay,
            reject: self.reject.clone(),
            held: VecDeque::new(),
            ready: VecDeque::new(),
            log: self.log.clone(),
        })
    }

    fn open_converter(&mut self, plan: ResamplePlan) -> Result<LoggedConverter> {
        Ok(LoggedConverter {
            inner: Resampler::configure(plan)?,
            log: self.log.clone(),
        })
    }

    fn open_sink(&mut self, _spec: &SinkSpec) -> Result<StubSink> {
        Ok(StubSink {
            fail_on: self.fail_on,
            cancel_on: self.cancel_on.clone(),
            calls: 0,
            written: self.written.clone(),
            log: self.log.clone(),
        })
    }
}

fn pipeline(backend: StubBackend) -> Pipeline<StubBackend> {
    Pipeline::new(backend, PlaybackConfig::default())
}

#[test]
fn plays_every_packet_and_closes() {
    let backend = StubBackend {
        packets: 5,
        ..Default::default()
    };
    let written = backend.written.clone();
    let log = backend.log.clone();
    let mut p = pipeline(backend);

    let summary = p.run("stub").unwrap();

    assert_eq!(p.state(), PipelineState::Closed);
    assert_eq!(summary.packets_read, 5);
    assert_eq!(summary.writes, 5);
    assert_eq!(summary.samples_written, 5 * FRAME_SAMPLES as u64);
    assert_eq!(summary.output_rate, Some(8_000));
    // Mono is duplicated to both channels.
    assert_eq!(written.borrow().len(), 5 * FRAME_SAMPLES * 2);
    assert_eq!(written.borrow()[FRAME_SAMPLES * 2], 100);
    assert_eq!(log.count("finish"), 1);
}

#[test]
fn missing_stream_fails_without_writes() {
    let backend = StubBackend {
        no_stream: true,
        ..Default::default()
    };
    let log = backend.log.clone();
    let mut p = pipeline(backend);

    let err = p.run("silence.txt").unwrap_err();

    assert!(matches!(err, PlayerError::NoAudioStream { .. }));
    assert_eq!(err.exit_code(), 1);
    assert_eq!(p.state(), PipelineState::Errored);
    assert_eq!(log.count("write"), 0);
    assert!(log.releases().is_empty());
}

#[test]
fn sink_failure_stops_writes_and_releases_everything_once() {
    let backend = StubBackend {
        packets: 10,
        fail_on: Some(3),
        ..Default::default()
    };
    let log = backend.log.clone();
    let mut p = pipeline(backend);

    let err = p.run("stub").unwrap_err();

    assert!(matches!(err, PlayerError::Underrun(_)));
    assert_eq!(p.state(), PipelineState::Errored);
    assert_eq!(log.count("write"), 3);
    assert_eq!(log.count("finish"), 0);
    assert_eq!(p.summary().writes, 2);
    assert_eq!(
        log.releases(),
        vec![
            "release sink",
            "release converter",
            "release decoder",
            "release source"
        ]
    );
}

#[test]
fn buffered_frames_come_out_of_the_drain() {
    let backend = StubBackend {
        packets: 6,
        delay: 3,
        ..Default::default()
    };
    let written = backend.written.clone();
    let mut p = pipeline(backend);

    let summary = p.run("stub").unwrap();

    assert_eq!(summary.frames_decoded, 3);
    assert_eq!(summary.frames_drained, 3);
    assert_eq!(summary.writes, 6);
    // Drained frames keep their order: the last one came from packet 5.
    let written = written.borrow();
    assert_eq!(written[written.len() - 1], 500);
}

#[test]
fn rejected_packets_are_skipped() {
    let backend = StubBackend {
        packets: 5,
        reject: vec![1, 3],
        ..Default::default()
    };
    let mut p = pipeline(backend);

    let summary = p.run("stub").unwrap();

    assert_eq!(p.state(), PipelineState::Closed);
    assert_eq!(summary.packets_read, 5);
    assert_eq!(summary.packets_skipped, 2);
    assert_eq!(summary.writes, 3);
}

#[test]
fn gain_is_applied_before_the_sink() {
    let backend = StubBackend {
        packets: 2,
        ..Default::default()
    };
    let written = backend.written.clone();
    let config = PlaybackConfig {
        gain: 0.5,
        ..Default::default()
    };
    let mut p = Pipeline::new(backend, config);

    p.run("stub").unwrap();

    assert!(written.borrow()[FRAME_SAMPLES * 2..].iter().all(|s| *s == 50));
}

#[test]
fn cancellation_aborts_and_releases() {
    let backend = StubBackend {
        packets: 3,
        ..Default::default()
    };
    let log = backend.log.clone();
    let cancel = Arc::new(AtomicBool::new(true));
    let mut p = pipeline(backend).with_cancel(cancel);

    let err = p.run("stub").unwrap_err();

    assert!(matches!(err, PlayerError::Cancelled));
    assert_eq!(p.state(), PipelineState::Errored);
    assert_eq!(log.count("write"), 0);
    assert_eq!(log.releases().len(), 4);
}

#[test]
fn cancellation_during_the_last_write_is_not_a_clean_end() {
    let cancel = Arc::new(AtomicBool::new(false));
    let backend = StubBackend {
        packets: 2,
        cancel_on: Some((2, cancel.clone())),
        ..Default::default()
    };
    let log = backend.log.clone();
    let mut p = pipeline(backend).with_cancel(cancel);

    let err = p.run("stub").unwrap_err();

    assert!(matches!(err, PlayerError::Cancelled));
    assert_eq!(p.state(), PipelineState::Errored);
    assert_eq!(log.count("write"), 2);
    assert_eq!(log.count("finish"), 0);
    assert_eq!(log.releases().len(), 4);
}

#[test]
fn cancellation_while_draining_stops_before_finish() {
    let cancel = Arc::new(AtomicBool::new(false));
    let backend = StubBackend {
        packets: 3,
        delay: 2,
        cancel_on: Some((2, cancel.clone())),
        ..Default::default()
    };
    let log = backend.log.clone();
    let mut p = pipeline(backend).with_cancel(cancel);

    let err = p.run("stub").unwrap_err();

    assert!(matches!(err, PlayerError::Cancelled));
    // Write 2 is the first drained frame; the third is never emitted.
    assert_eq!(log.count("write"), 2);
    assert_eq!(log.count("finish"), 0);
    assert_eq!(p.summary().frames_drained, 1);
}

#[test]
fn sink_failure_while_draining_is_fatal() {
    let backend = StubBackend {
        packets: 4,
        delay: 3,
        fail_on: Some(2),
        ..Default::default()
    };
    let log = backend.log.clone();
    let mut p = pipeline(backend);

    let err = p.run("stub").unwrap_err();

    assert!(matches!(err, PlayerError::Underrun(_)));
    assert_eq!(p.state(), PipelineState::Errored);
    assert_eq!(log.count("flush decoder"), 1);
    assert_eq!(log.count("write"), 2);
    assert_eq!(log.count("finish"), 0);
    assert_eq!(p.summary().frames_decoded, 1);
    assert_eq!(p.summary().writes, 1);
    assert_eq!(
        log.releases(),
        vec![
            "release sink",
            "release converter",
            "release decoder",
            "release source"
        ]
    );
}

#[test]
fn pipeline_can_run_again_after_a_session() {
    let backend = StubBackend {
        packets: 2,
        ..Default::default()
    };
    let mut p = pipeline(backend);

    let first = p.run("stub").unwrap();
    let second = p.run("stub").unwrap();

    assert_eq!(first, second);
    assert_eq!(p.state(), PipelineState::Closed);
}

/// Real demux/decode/convert stages feeding a recording sink.
struct WavBackend {
    written: Rc<RefCell<Vec<i16>>>,
    log: Log,
}

impl MediaBackend for WavBackend {
    type Source = SymphoniaSource;
    type Decoder = SymphoniaDecoder;
    type Converter = Resampler;
    type Sink = StubSink;

    fn open_source(&mut self, input: &str) -> Result<SymphoniaSource> {
        SymphoniaSource::open(input, None)
    }

    fn open_decoder(&mut self, stream: &StreamDescriptor) -> Result<SymphoniaDecoder> {
        SymphoniaDecoder::configure(stream)
    }

    fn open_converter(&mut self, plan: ResamplePlan) -> Result<Resampler> {
        Resampler::configure(plan)
    }

    fn open_sink(&mut self, _spec: &SinkSpec) -> Result<StubSink> {
        Ok(StubSink {
            fail_on: None,
            cancel_on: None,
            calls: 0,
            written: self.written.clone(),
            log: self.log.clone(),
        })
    }
}

#[test]
fn silent_wav_plays_as_silence() {
    let path = write_temp_wav("pipeline-silence.wav", &wav_bytes(44_100, 2, 4_410, 0));
    let written = Rc::new(RefCell::new(Vec::new()));
    let backend = WavBackend {
        written: written.clone(),
        log: Log::default(),
    };
    let mut p = Pipeline::new(backend, PlaybackConfig::default());

    let summary = p.run(path.to_str().unwrap()).unwrap();
    let _ = std::fs::remove_file(&path);

    assert_eq!(p.state(), PipelineState::Closed);
    assert_eq!(summary.samples_written, 4_410);
    assert_eq!(written.borrow().len(), 4_410 * 2);
    assert!(written.borrow().iter().all(|s| *s == 0));
}

#[test]
fn wav_at_another_rate_is_resampled() {
    let path = write_temp_wav("pipeline-resample.wav", &wav_bytes(44_100, 1, 44_100, 1_000));
    let written = Rc::new(RefCell::new(Vec::new()));
    let backend = WavBackend {
        written: written.clone(),
        log: Log::default(),
    };
    let config = PlaybackConfig {
        output_rate: Some(48_000),
        ..Default::default()
    };
    let mut p = Pipeline::new(backend, config);

    let summary = p.run(path.to_str().unwrap()).unwrap();
    let _ = std::fs::remove_file(&path);

    assert_eq!(summary.output_rate, Some(48_000));
    // One second in, roughly one second out (resampler delay trims a little).
    let frames = summary.samples_written as i64;
    assert!((frames - 48_000).abs() < 2_000, "got {frames} frames");
    assert_eq!(written.borrow().len() as u64, summary.samples_written * 2);
}
