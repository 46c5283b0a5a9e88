//! Bounded hand-off between the driver thread and the device callback.
//!
//! The driver pushes interleaved `i16` and blocks while the queue is full; the CPAL
//! callback pops without ever blocking. That blocking push is what paces the driver to
//! the device's consumption rate.
//!
//! Shutdown is explicit:
//! - [`DeviceQueue::close`] marks normal end of input (the callback drains what is left)
//! - [`DeviceQueue::fail`] records a device error and wakes a blocked writer

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

pub struct DeviceQueue {
    channels: usize,
    inner: Mutex<QueueInner>,
    cv: Condvar,
    max_buffered_samples: usize,
}

struct QueueInner {
    queue: VecDeque<i16>,
    done: bool,
    failure: Option<String>,
}

/// Queue capacity in **samples** for `buffer_seconds` of audio.
///
/// Non-finite or non-positive durations fall back to half a second.
pub fn calc_max_buffered_samples(rate_hz: u32, channels: usize, buffer_seconds: f32) -> usize {
    let secs = if buffer_seconds.is_finite() && buffer_seconds > 0.0 {
        buffer_seconds
    } else {
        0.5
    };
    let frames = (rate_hz as f32 * secs).ceil() as usize;
    frames.max(1).saturating_mul(channels)
}

impl DeviceQueue {
    pub fn new(channels: usize, max_buffered_samples: usize) -> Self {
        Self {
            channels,
            inner: Mutex::new(QueueInner {
                queue: VecDeque::with_capacity(max_buffered_samples),
                done: false,
                failure: None,
            }),
            cv: Condvar::new(),
            max_buffered_samples: max_buffered_samples.max(channels),
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Buffered frames (best-effort snapshot).
    pub fn len_frames(&self) -> usize {
        self.inner.lock().unwrap().queue.len() / self.channels
    }

    pub fn failure(&self) -> Option<String> {
        self.inner.lock().unwrap().failure.clone()
    }

    /// Mark end of input. Idempotent.
    pub fn close(&self) {
        self.inner.lock().unwrap().done = true;
        self.cv.notify_all();
    }

    /// Record a device failure; the first reason wins. Pending and future pushes fail.
    pub fn fail(&self, reason: impl Into<String>) {
        let mut g = self.inner.lock().unwrap();
        if g.failure.is_none() {
            g.failure = Some(reason.into());
        }
        g.done = true;
        drop(g);
        self.cv.notify_all();
    }

    /// Push interleaved samples, blocking while the queue is full.
    ///
    /// Fails with the recorded reason if the device failed, or if the queue was closed
    /// before every sample was accepted.
    pub fn push_blocking(&self, samples: &[i16]) -> Result<(), String> {
        let mut offset = 0;
        while offset < samples.len() {
            let mut g = self.inner.lock().unwrap();
            while g.queue.len() >= self.max_buffered_samples && !g.done {
                g = self.cv.wait(g).unwrap();
            }
            if let Some(reason) = &g.failure {
                return Err(reason.clone());
            }
            if g.done {
                return Err("output queue closed".to_string());
            }

            let room = self.max_buffered_samples - g.queue.len();
            let take = room.min(samples.len() - offset);
            g.queue.extend(&samples[offset..offset + take]);
            offset += take;
            drop(g);
            self.cv.notify_all();
        }
        Ok(())
    }

    /// Non-blocking pop of up to `max_frames` whole frames into `out`. Returns samples copied.
    ///
    /// Safe to call from the real-time callback: it never waits on the condition variable.
    pub fn pop_into(&self, out: &mut Vec<i16>, max_frames: usize) -> usize {
        let mut g = self.inner.lock().unwrap();
        let take = (g.queue.len() / self.channels).min(max_frames) * self.channels;
        if take == 0 {
            return 0;
        }
        out.extend(g.queue.drain(..take));
        drop(g);
        self.cv.notify_all();
        take
    }

    /// Whether end of input was signalled and nothing remains to play.
    pub fn is_drained(&self) -> bool {
        let g = self.inner.lock().unwrap();
        g.done && g.queue.is_empty()
    }

    /// Block until the callback has drained a closed queue, or the device failed.
    ///
    /// Returns the failure reason, if any.
    pub fn wait_until_drained(&self) -> Option<String> {
        let mut g = self.inner.lock().unwrap();
        loop {
            if g.failure.is_some() {
                return g.failure.clone();
            }
            if g.done && g.queue.is_empty() {
                return None;
            }
            // The callback notifies on every pop, but a device that stops calling back
            // would otherwise park us forever without seeing a later `fail`.
            let (ng, _timeout) = self.cv.wait_timeout(g, Duration::from_millis(50)).unwrap();
            g = ng;
        }
    }
}
