//! Platform transport capability used by the fetch session.
//!
//! A transport is split into three levels that mirror the lifetime of one
//! download: a connection (no network traffic yet), a request (headers
//! received), and chunked body reads. Closing is `Drop`.
//!
//! Exactly one implementation is linked into a build; see [`PlatformTransport`].

mod curl_transport;

#[cfg(test)]
pub(crate) mod scripted;

pub use curl_transport::{CurlConnection, CurlOptions, CurlRequest, CurlTransport};

use thiserror::Error;

use crate::outcome::TransportErrorKind;

/// The transport compiled into this build.
pub type PlatformTransport = CurlTransport;

/// Error reported by a transport operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("failed to open transport: {0}")]
    Open(String),
    #[error("request failed: {0}")]
    Request(String),
    /// Server answered with a non-2xx status.
    #[error("HTTP {0}")]
    Status(u32),
    #[error("read failed: {0}")]
    Read(String),
}

impl TransportError {
    /// True for statuses that mean the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TransportError::Status(404 | 410))
    }

    /// Stage classification for the outcome taxonomy.
    pub fn kind(&self) -> TransportErrorKind {
        match self {
            TransportError::Open(_) => TransportErrorKind::OpenFailed,
            TransportError::Request(_) | TransportError::Status(_) => {
                TransportErrorKind::RequestFailed
            }
            TransportError::Read(_) => TransportErrorKind::ReadFailed,
        }
    }
}

/// Entry point of a transport: creates connections.
pub trait Transport {
    type Connection: Connection;

    /// Prepares a connection context. No bytes are exchanged yet.
    fn open_connection(&self, user_agent: &str) -> Result<Self::Connection, TransportError>;
}

/// An opened connection context that can issue one request.
pub trait Connection {
    type Request: Request;

    /// Issues an anonymous GET and returns once response headers are known.
    fn open_request(&mut self, url: &str) -> Result<Self::Request, TransportError>;
}

/// A request whose headers have been received.
pub trait Request {
    /// `Last-Modified` as Unix seconds, if present and parseable.
    fn last_modified(&mut self) -> Option<i64>;

    /// `Content-Length`, if present.
    fn content_length(&mut self) -> Option<u64>;

    /// Reads up to `buf.len()` body bytes. Returns 0 at end of stream.
    /// Short reads are not errors.
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;
}
