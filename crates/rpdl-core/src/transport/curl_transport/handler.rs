//! Easy2 Handler that buffers the response for pull-style chunk reads.
//! Pauses the transfer when the buffer is full instead of growing without bound.

use std::str;

use curl::easy::WriteError;

/// Buffered body bytes above which further writes pause the transfer.
pub(crate) const PENDING_LIMIT: usize = 256 * 1024;

/// Handler state for the single transfer of a request.
pub struct Collector {
    pub(super) response_headers: Vec<String>,
    pub(super) pending: Vec<u8>,
    pub(super) body_started: bool,
    pub(super) paused: bool,
    limit: usize,
}

impl Collector {
    pub(super) fn new() -> Self {
        Self::with_limit(PENDING_LIMIT)
    }

    pub(super) fn with_limit(limit: usize) -> Self {
        Self {
            response_headers: Vec::new(),
            pending: Vec::new(),
            body_started: false,
            paused: false,
            limit,
        }
    }

    /// Moves up to `buf.len()` buffered bytes into `buf`.
    pub(super) fn take(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        n
    }
}

impl curl::easy::Handler for Collector {
    fn header(&mut self, data: &[u8]) -> bool {
        if let Ok(s) = str::from_utf8(data) {
            let line = s.trim_end();
            if line.starts_with("HTTP/") {
                // New response (e.g. after a redirect): keep only its headers.
                self.response_headers.clear();
            }
            if !line.is_empty() {
                self.response_headers.push(line.to_string());
            }
        }
        true
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        if !self.pending.is_empty() && self.pending.len() + data.len() > self.limit {
            // libcurl redelivers the same data after unpause.
            self.paused = true;
            return Err(WriteError::Pause);
        }
        self.body_started = true;
        self.pending.extend_from_slice(data);
        Ok(data.len())
    }
}
