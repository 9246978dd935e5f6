//! libcurl transport driven through the multi interface.
//!
//! The session pulls body bytes chunk by chunk, so the transfer is pumped
//! with `perform`/`wait` only when the buffered bytes run out. Runs on the
//! calling thread; nothing here spawns threads (libcurl's resolver may).

mod handler;
mod headers;

pub use handler::Collector;

use std::time::Duration;

use curl::easy::Easy2;
use curl::multi::{Easy2Handle, Multi};

use super::{Connection, Request, Transport, TransportError};
use headers::{parse_head, ResponseHead};

/// How long one `wait` may block before the transfer is pumped again.
const WAIT_SLICE: Duration = Duration::from_millis(500);

/// Per-transfer curl settings.
#[derive(Debug, Clone, Copy)]
pub struct CurlOptions {
    /// Connect timeout. `None` leaves the libcurl default.
    pub connect_timeout: Option<Duration>,
    /// Redirect hop limit.
    pub max_redirections: u32,
}

impl Default for CurlOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Some(Duration::from_secs(15)),
            max_redirections: 10,
        }
    }
}

/// Portable transport backed by libcurl.
#[derive(Debug, Clone, Default)]
pub struct CurlTransport {
    options: CurlOptions,
}

impl CurlTransport {
    pub fn new(options: CurlOptions) -> Self {
        Self { options }
    }
}

impl Transport for CurlTransport {
    type Connection = CurlConnection;

    fn open_connection(&self, user_agent: &str) -> Result<CurlConnection, TransportError> {
        curl::init();
        if user_agent.contains(['\r', '\n']) {
            return Err(TransportError::Open("user agent contains a line break".into()));
        }
        tracing::debug!(user_agent, "curl connection opened");
        Ok(CurlConnection {
            user_agent: user_agent.to_string(),
            options: self.options,
        })
    }
}

/// Connection context: settings shared by the request it opens.
#[derive(Debug)]
pub struct CurlConnection {
    user_agent: String,
    options: CurlOptions,
}

impl CurlConnection {
    fn build_easy(&self, url: &str) -> Result<Easy2<Collector>, curl::Error> {
        let mut easy = Easy2::new(Collector::new());
        easy.url(url)?;
        easy.get(true)?;
        easy.useragent(&self.user_agent)?;
        easy.follow_location(true)?;
        easy.max_redirections(self.options.max_redirections)?;
        if let Some(timeout) = self.options.connect_timeout {
            easy.connect_timeout(timeout)?;
        }
        Ok(easy)
    }
}

impl Connection for CurlConnection {
    type Request = CurlRequest;

    fn open_request(&mut self, url: &str) -> Result<CurlRequest, TransportError> {
        let easy = self
            .build_easy(url)
            .map_err(|e| TransportError::Request(format!("curl setup: {}", e)))?;

        let multi = Multi::new();
        let handle = multi
            .add2(easy)
            .map_err(|e| TransportError::Request(format!("curl multi add: {}", e)))?;

        let mut request = CurlRequest {
            handle,
            multi,
            finished: None,
            head: ResponseHead::default(),
        };
        request.await_headers()?;
        Ok(request)
    }
}

/// One in-flight GET. Dropping it detaches the handle and closes the connection.
pub struct CurlRequest {
    // Declared before `multi` so the handle is detached first.
    handle: Easy2Handle<Collector>,
    multi: Multi,
    /// Transfer result once libcurl reports completion.
    finished: Option<Result<(), String>>,
    head: ResponseHead,
}

impl CurlRequest {
    /// Drives the transfer once: perform, collect completion, wait for activity.
    fn pump(&mut self) -> Result<(), String> {
        self.multi
            .perform()
            .map_err(|e| format!("curl multi perform: {}", e))?;

        let mut result = None;
        let handle = &self.handle;
        self.multi.messages(|msg| {
            if let Some(res) = msg.result_for2(handle) {
                result = Some(res);
            }
        });
        if let Some(res) = result {
            self.finished = Some(res.map_err(|e| e.to_string()));
            return Ok(());
        }

        self.multi
            .wait(&mut [], WAIT_SLICE)
            .map_err(|e| format!("curl multi wait: {}", e))?;
        Ok(())
    }

    /// Pumps until the first body byte arrives or the transfer ends, then
    /// validates the final response status.
    fn await_headers(&mut self) -> Result<(), TransportError> {
        while !self.handle.get_ref().body_started && self.finished.is_none() {
            self.pump().map_err(TransportError::Request)?;
        }
        // A failure after body bytes arrived is surfaced by `read_chunk`.
        if let Some(Err(msg)) = &self.finished {
            if !self.handle.get_ref().body_started {
                return Err(TransportError::Request(msg.clone()));
            }
        }

        self.head = parse_head(&self.handle.get_ref().response_headers);
        match self.head.status {
            Some(code) if (200..300).contains(&code) => {
                tracing::debug!(
                    status = code,
                    content_length = ?self.head.content_length,
                    last_modified = ?self.head.last_modified,
                    "response headers received"
                );
                Ok(())
            }
            Some(code) => Err(TransportError::Status(code)),
            None => Err(TransportError::Request("no HTTP status line".into())),
        }
    }
}

impl Request for CurlRequest {
    fn last_modified(&mut self) -> Option<i64> {
        self.head.last_modified
    }

    fn content_length(&mut self) -> Option<u64> {
        self.head.content_length
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let collector = self.handle.get_mut();
            if !collector.pending.is_empty() {
                let n = collector.take(buf);
                if collector.paused {
                    collector.paused = false;
                    self.handle
                        .unpause_write()
                        .map_err(|e| TransportError::Read(format!("curl unpause: {}", e)))?;
                }
                return Ok(n);
            }
            match &self.finished {
                Some(Ok(())) => return Ok(0),
                Some(Err(msg)) => return Err(TransportError::Read(msg.clone())),
                None => self.pump().map_err(TransportError::Read)?,
            }
        }
    }
}
