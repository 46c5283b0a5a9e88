//! Decoder stage.
//!
//! Feeds compressed packets to a codec and hands back owned [`Frame`]s. The contract is
//! the classic send/receive loop:
//! - [`Decoder::submit`] one packet (a rejected packet is a recoverable
//!   [`PlayerError::SkippedPacket`])
//! - pull frames with [`drain_frames`] until the codec needs more input
//! - at end of input, [`Decoder::flush`] once and drain again to collect buffered frames

use std::collections::VecDeque;

use symphonia::core::codecs::{Decoder as CodecDecoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::Packet as CodecPacket;

use crate::error::{PlayerError, Result};
use crate::frame::Frame;
use crate::resource::Release;
use crate::source::{Packet, StreamDescriptor};

pub trait Decoder: Release {
    /// Hand one packet to the codec.
    fn submit(&mut self, packet: Packet) -> Result<()>;

    /// Next decoded frame, or `None` once the codec needs more input.
    fn receive_frame(&mut self) -> Result<Option<Frame>>;

    /// Signal end of input. Frames the codec was holding become receivable.
    fn flush(&mut self) -> Result<()>;
}

/// Lazily pull frames from `decoder` until it reports that it needs more input.
pub fn drain_frames<D: Decoder + ?Sized>(decoder: &mut D) -> impl Iterator<Item = Result<Frame>> + '_ {
    let mut done = false;
    std::iter::from_fn(move || {
        if done {
            return None;
        }
        match decoder.receive_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                done = true;
                None
            }
            Err(e) => {
                done = true;
                Some(Err(e))
            }
        }
    })
}

/// [`Decoder`] backed by a Symphonia codec.
///
/// Symphonia decodes one packet into one buffer, so each accepted packet queues exactly
/// one frame.
pub struct SymphoniaDecoder {
    codec: Option<Box<dyn CodecDecoder>>,
    ready: VecDeque<Frame>,
    flushed: bool,
}

impl SymphoniaDecoder {
    pub fn configure(stream: &StreamDescriptor) -> Result<Self> {
        let codec = symphonia::default::get_codecs()
            .make(&stream.codec_params, &DecoderOptions::default())
            .map_err(|e| PlayerError::CodecOpen(e.to_string()))?;
        Ok(Self {
            codec: Some(codec),
            ready: VecDeque::new(),
            flushed: false,
        })
    }
}

impl Decoder for SymphoniaDecoder {
    fn submit(&mut self, packet: Packet) -> Result<()> {
        let Some(codec) = self.codec.as_mut() else {
            return Err(PlayerError::SkippedPacket("decoder released".into()));
        };
        let packet =
            CodecPacket::new_from_boxed_slice(packet.stream_index, packet.ts, packet.dur, packet.data);

        match codec.decode(&packet) {
            Ok(decoded) => {
                if decoded.frames() > 0 {
                    self.ready.push_back(Frame::from_decoded(decoded));
                }
                return Ok(());
            }
            Err(SymphoniaError::ResetRequired) => {}
            Err(e) => return Err(PlayerError::SkippedPacket(e.to_string())),
        }

        codec.reset();
        Err(PlayerError::SkippedPacket("codec reset required".into()))
    }

    fn receive_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.ready.pop_front())
    }

    fn flush(&mut self) -> Result<()> {
        if self.flushed {
            return Ok(());
        }
        self.flushed = true;
        if let Some(codec) = self.codec.as_mut() {
            let result = codec.finalize();
            if let Some(ok) = result.verify_ok {
                tracing::debug!(verify_ok = ok, "decoder finalized");
            }
        }
        Ok(())
    }
}

impl Release for SymphoniaDecoder {
    fn release(&mut self) {
        self.codec = None;
        self.ready.clear();
    }
}
