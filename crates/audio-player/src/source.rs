//! Source reader: container probing, stream selection and packet production.
//!
//! Uses Symphonia to:
//! - open a local file or an HTTP(S) URL
//! - probe the container and pick the best audio track
//! - hand out only that track's packets, one at a time

use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use symphonia::core::codecs::{CODEC_TYPE_NULL, CodecParameters};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Track};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{PlayerError, Result};
use crate::frame::SampleFormat;
use crate::http_stream::{HttpRangeConfig, HttpRangeSource};
use crate::layout::ChannelLayout;
use crate::resource::Release;

/// The audio stream chosen for playback.
#[derive(Clone, Debug)]
pub struct StreamDescriptor {
    /// Track id within the container.
    pub index: u32,
    pub codec_params: CodecParameters,
    pub sample_rate: u32,
    pub channels: usize,
    pub layout: ChannelLayout,
    /// Native sample format, when the container reports one.
    pub sample_format: Option<SampleFormat>,
    /// Codec name (best-effort).
    pub codec: Option<String>,
    /// Duration in milliseconds (best-effort).
    pub duration_ms: Option<u64>,
}

impl StreamDescriptor {
    /// Describe a track, or `None` when it is not playable audio.
    pub fn from_track(track: &Track) -> Option<Self> {
        let params = &track.codec_params;
        if params.codec == CODEC_TYPE_NULL {
            return None;
        }
        let sample_rate = params.sample_rate.filter(|r| *r > 0)?;
        let count = params.channels.map(|c| c.count());
        let layout = ChannelLayout::resolve(params.channels, params.channel_layout, count)?;

        Some(Self {
            index: track.id,
            codec_params: params.clone(),
            sample_rate,
            channels: layout.count(),
            layout,
            sample_format: params.sample_format.map(SampleFormat::from_codec),
            codec: codec_name_from_params(params),
            duration_ms: duration_ms_from_codec_params(params),
        })
    }
}

/// A unit of compressed data from the selected stream.
#[derive(Clone, Debug, PartialEq)]
pub struct Packet {
    pub stream_index: u32,
    pub ts: u64,
    pub dur: u64,
    pub data: Box<[u8]>,
}

/// Pull-based producer of the selected stream's packets.
pub trait PacketSource: Release {
    fn stream(&self) -> &StreamDescriptor;

    /// Next packet of the selected stream, or `None` at end of stream.
    fn next_packet(&mut self) -> Result<Option<Packet>>;
}

/// [`PacketSource`] backed by a Symphonia format reader.
pub struct SymphoniaSource {
    format: Option<Box<dyn FormatReader>>,
    stream: StreamDescriptor,
    discarded: u64,
}

impl SymphoniaSource {
    /// Open `input` (a path or an `http(s)://` URL) and select its best audio stream.
    pub fn open(input: &str, cancel: Option<Arc<AtomicBool>>) -> Result<Self> {
        let open_err = |reason: String| PlayerError::Open {
            path: input.to_string(),
            reason,
        };

        let source: Box<dyn MediaSource> = if is_remote(input) {
            Box::new(HttpRangeSource::new(
                input.to_string(),
                HttpRangeConfig::default(),
                cancel,
            ))
        } else {
            Box::new(File::open(input).map_err(|e| open_err(e.to_string()))?)
        };

        let mss = MediaSourceStream::new(source, Default::default());
        let probed = symphonia::default::get_probe()
            .format(
                &hint_for(input),
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| open_err(e.to_string()))?;

        Self::from_reader(input, probed.format)
    }

    /// Select the best audio stream from an already-probed reader.
    pub fn from_reader(input: &str, format: Box<dyn FormatReader>) -> Result<Self> {
        let stream = select_stream(format.as_ref()).ok_or_else(|| PlayerError::NoAudioStream {
            path: input.to_string(),
        })?;

        tracing::debug!(
            track = stream.index,
            rate_hz = stream.sample_rate,
            channels = stream.channels,
            codec = stream.codec.as_deref().unwrap_or("unknown"),
            "audio stream selected"
        );

        Ok(Self {
            format: Some(format),
            stream,
            discarded: 0,
        })
    }

    /// Packets from other tracks dropped so far.
    pub fn discarded_packets(&self) -> u64 {
        self.discarded
    }
}

impl PacketSource for SymphoniaSource {
    fn stream(&self) -> &StreamDescriptor {
        &self.stream
    }

    fn next_packet(&mut self) -> Result<Option<Packet>> {
        let Some(format) = self.format.as_mut() else {
            return Ok(None);
        };

        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(e) => {
                    tracing::error!("[source] read failed, ending stream: {e}");
                    return Ok(None);
                }
            };

            if packet.track_id() != self.stream.index {
                self.discarded += 1;
                continue;
            }

            return Ok(Some(Packet {
                stream_index: packet.track_id(),
                ts: packet.ts,
                dur: packet.dur,
                data: packet.data,
            }));
        }
    }
}

impl Release for SymphoniaSource {
    fn release(&mut self) {
        if self.format.take().is_some() && self.discarded > 0 {
            tracing::debug!(discarded = self.discarded, "packets from other tracks dropped");
        }
    }
}

/// Prefer the container's default track, then the first playable one.
fn select_stream(format: &dyn FormatReader) -> Option<StreamDescriptor> {
    format
        .default_track()
        .and_then(StreamDescriptor::from_track)
        .or_else(|| format.tracks().iter().find_map(StreamDescriptor::from_track))
}

pub fn is_remote(input: &str) -> bool {
    let lower = input.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Container hint from the path (or URL path) extension.
fn hint_for(input: &str) -> Hint {
    let mut hint = Hint::new();
    let path_part = input.split(['?', '#']).next().unwrap_or(input);
    if let Some(ext) = Path::new(path_part).extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }
    hint
}

/// Best-effort duration in milliseconds from codec metadata.
///
/// Returns `None` if the container does not provide total frames or sample rate.
fn duration_ms_from_codec_params(codec_params: &CodecParameters) -> Option<u64> {
    let frames = codec_params.n_frames?;
    let rate = codec_params.sample_rate? as u64;
    if rate == 0 {
        return None;
    }
    Some(frames.saturating_mul(1000) / rate)
}

/// Best-effort codec label for diagnostics.
fn codec_name_from_params(params: &CodecParameters) -> Option<String> {
    use symphonia::core::codecs::*;
    let name = match params.codec {
        CODEC_TYPE_FLAC => "FLAC",
        CODEC_TYPE_MP3 => "MP3",
        CODEC_TYPE_AAC => "AAC",
        CODEC_TYPE_ALAC => "ALAC",
        CODEC_TYPE_VORBIS => "VORBIS",
        CODEC_TYPE_OPUS => "OPUS",
        CODEC_TYPE_PCM_S16LE | CODEC_TYPE_PCM_S16BE => "PCM_S16",
        CODEC_TYPE_PCM_S24LE | CODEC_TYPE_PCM_S24BE => "PCM_S24",
        CODEC_TYPE_PCM_S32LE | CODEC_TYPE_PCM_S32BE => "PCM_S32",
        CODEC_TYPE_PCM_F32LE | CODEC_TYPE_PCM_F32BE => "PCM_F32",
        _ => return None,
    };
    Some(name.to_string())
}
