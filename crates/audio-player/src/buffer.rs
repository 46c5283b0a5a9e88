//! Reusable interleaved stereo `i16` output buffer.
//!
//! The sizing contract lives here instead of at each call site:
//! 1. [`OutputBuffer::prepare`] sizes the buffer to the converter's reported bound.
//! 2. The converter writes into the returned slice and reports how much it produced.
//! 3. [`OutputBuffer::commit`] rejects any count above the prepared bound.
//!
//! Capacity only grows, so steady-state playback does not reallocate.

use crate::error::{PlayerError, Result};

pub const OUTPUT_CHANNELS: usize = 2;
pub const BYTES_PER_SAMPLE: usize = std::mem::size_of::<i16>();

#[derive(Debug, Default)]
pub struct OutputBuffer {
    samples: Vec<i16>,
    prepared_frames: usize,
    filled_frames: usize,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size the buffer for up to `max_frames` stereo frames and return the writable region.
    pub fn prepare(&mut self, max_frames: usize) -> &mut [i16] {
        let len = max_frames * OUTPUT_CHANNELS;
        // `resize` keeps capacity when shrinking the length.
        self.samples.resize(len, 0);
        self.prepared_frames = max_frames;
        self.filled_frames = 0;
        &mut self.samples[..len]
    }

    /// Mark `frames` as produced and return them for in-place processing.
    pub fn commit(&mut self, frames: usize) -> Result<&mut [i16]> {
        if frames > self.prepared_frames {
            return Err(PlayerError::Resample(format!(
                "converter reported {frames} frames for a {}-frame buffer",
                self.prepared_frames
            )));
        }
        self.filled_frames = frames;
        Ok(&mut self.samples[..frames * OUTPUT_CHANNELS])
    }

    /// Committed interleaved samples.
    pub fn filled(&self) -> &[i16] {
        &self.samples[..self.filled_frames * OUTPUT_CHANNELS]
    }

    /// Size in bytes of the committed samples.
    pub fn filled_bytes(&self) -> usize {
        self.filled_frames * OUTPUT_CHANNELS * BYTES_PER_SAMPLE
    }

    pub fn capacity_frames(&self) -> usize {
        self.samples.capacity() / OUTPUT_CHANNELS
    }

    /// Free the allocation at session end.
    pub fn release(&mut self) {
        self.samples = Vec::new();
        self.prepared_frames = 0;
        self.filled_frames = 0;
    }
}
