//! Remote inputs: an HTTP range reader the container layer can read and seek.
//!
//! Bytes are fetched in fixed-size blocks with `Range` requests and the current block is
//! cached, so sequential demuxing costs one request per block.

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use symphonia::core::io::MediaSource;

#[derive(Clone, Debug)]
pub(crate) struct HttpRangeConfig {
    /// Bytes per fetched block.
    pub(crate) block_size: usize,
    /// Per-request timeout.
    pub(crate) timeout: Duration,
}

impl Default for HttpRangeConfig {
    fn default() -> Self {
        Self {
            block_size: 256 * 1024,
            timeout: Duration::from_secs(10),
        }
    }
}

/// One fetched block plus the total resource length, when the server reported it.
struct RangeChunk {
    data: Vec<u8>,
    total_len: Option<u64>,
}

pub(crate) struct HttpRangeSource {
    url: String,
    config: HttpRangeConfig,
    pos: u64,
    len: Option<u64>,
    block: Vec<u8>,
    block_start: u64,
    cancel: Option<Arc<AtomicBool>>,
}

impl HttpRangeSource {
    pub(crate) fn new(
        url: String,
        config: HttpRangeConfig,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Self {
        Self {
            url,
            config,
            pos: 0,
            len: None,
            block: Vec::new(),
            block_start: 0,
            cancel,
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|c| c.load(Ordering::Relaxed))
    }

    fn block_end(&self) -> u64 {
        self.block_start.saturating_add(self.block.len() as u64)
    }

    fn total_len(&mut self) -> io::Result<u64> {
        if let Some(len) = self.len {
            return Ok(len);
        }
        let chunk = self.fetch(0, 0)?;
        let len = chunk
            .total_len
            .ok_or_else(|| io::Error::other("server did not report a content length"))?;
        self.len = Some(len);
        Ok(len)
    }

    fn fetch(&self, start: u64, end: u64) -> io::Result<RangeChunk> {
        let range = format!("bytes={start}-{end}");
        let started = Instant::now();
        let resp = ureq::get(&self.url)
            .config()
            .timeout_per_call(Some(self.config.timeout))
            .build()
            .header("Range", &range)
            .call()
            .map_err(|e| io::Error::other(format!("range request {range} failed: {e}")))?;

        let status = resp.status();
        let header = |name: &str| {
            resp.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let content_range = header("Content-Range");
        let content_length = header("Content-Length").and_then(|s| s.parse::<u64>().ok());

        let mut data = Vec::new();
        let (_, body) = resp.into_parts();
        body.into_reader()
            .read_to_end(&mut data)
            .map_err(|e| io::Error::other(format!("range body read failed: {e}")))?;

        tracing::trace!(
            range = range.as_str(),
            bytes = data.len(),
            took_ms = started.elapsed().as_millis() as u64,
            "http range fetched"
        );

        let total_len = match status {
            ureq::http::StatusCode::PARTIAL_CONTENT => content_range
                .as_deref()
                .and_then(total_from_content_range)
                .or(content_length),
            ureq::http::StatusCode::OK => content_length,
            _ => None,
        };

        Ok(RangeChunk { data, total_len })
    }

    fn refill(&mut self) -> io::Result<()> {
        let start = self.pos;
        let mut end = start
            .saturating_add(self.config.block_size as u64)
            .saturating_sub(1);
        if let Some(len) = self.len.filter(|l| *l > 0) {
            end = end.min(len - 1);
        }

        let chunk = self.fetch(start, end)?;
        if chunk.total_len.is_some() {
            self.len = chunk.total_len;
        }
        self.block = chunk.data;
        self.block_start = start;
        Ok(())
    }
}

impl Read for HttpRangeSource {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() || self.cancelled() {
            return Ok(0);
        }
        if self.len.is_some_and(|len| self.pos >= len) {
            return Ok(0);
        }

        if self.pos < self.block_start || self.pos >= self.block_end() {
            self.refill()?;
        }
        if self.pos >= self.block_end() {
            return Ok(0);
        }

        let offset = (self.pos - self.block_start) as usize;
        let n = (self.block.len() - offset).min(out.len());
        out[..n].copy_from_slice(&self.block[offset..offset + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for HttpRangeSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.pos = match pos {
            SeekFrom::Start(x) => x,
            SeekFrom::Current(d) => offset_by(self.pos, d),
            SeekFrom::End(d) => {
                let len = self.total_len()?;
                offset_by(len, d)
            }
        };
        Ok(self.pos)
    }
}

impl MediaSource for HttpRangeSource {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        self.len
    }
}

/// Total length from a `Content-Range: bytes start-end/total` header.
fn total_from_content_range(header: &str) -> Option<u64> {
    let (_, total) = header.split_once('/')?;
    total.trim().parse::<u64>().ok()
}

fn offset_by(base: u64, delta: i64) -> u64 {
    if delta >= 0 {
        base.saturating_add(delta as u64)
    } else {
        base.saturating_sub(delta.unsigned_abs())
    }
}
