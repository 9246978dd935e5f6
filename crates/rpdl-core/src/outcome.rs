//! Terminal outcomes of a fetch and their process exit codes.

use std::fmt;

/// Exit code for a successful fetch.
pub const EXIT_SUCCESS: u8 = 0;
/// Exit code for a sandbox install failure (EPERM).
pub const EXIT_SANDBOX_FAILED: u8 = 1;
/// Exit code for a missing or empty resource (ENOENT).
pub const EXIT_NOT_FOUND: u8 = 2;
/// Exit code for a transport failure (EIO).
pub const EXIT_IO_ERROR: u8 = 5;
/// Exit code for invalid arguments (EINVAL).
pub const EXIT_INVALID_REQUEST: u8 = 22;
/// Exit code for a resource above the size ceiling (ENOSPC).
pub const EXIT_TOO_LARGE: u8 = 28;
/// Exit code when the platform cannot sandbox at all (ENOSYS).
pub const EXIT_SANDBOX_UNAVAILABLE: u8 = 38;

/// Downloaded payload. On success `0 < data.len() <= max_size`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub data: Vec<u8>,
    /// Last-modified time in Unix seconds, when the transport supplied one.
    pub mtime: Option<i64>,
}

/// Which transport stage failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Could not create the transport connection.
    OpenFailed,
    /// The request could not be issued or the server rejected it.
    RequestFailed,
    /// The body stream failed after headers were received.
    ReadFailed,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::OpenFailed => write!(f, "transport open failed"),
            TransportErrorKind::RequestFailed => write!(f, "request failed"),
            TransportErrorKind::ReadFailed => write!(f, "read failed"),
        }
    }
}

/// Exactly one of these ends every fetch. There are no partial results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success(FetchResult),
    NotFound,
    TooLarge,
    TransportError(TransportErrorKind),
}

impl FetchOutcome {
    /// Process exit code reported to the orchestrator.
    pub fn exit_code(&self) -> u8 {
        match self {
            FetchOutcome::Success(_) => EXIT_SUCCESS,
            FetchOutcome::NotFound => EXIT_NOT_FOUND,
            FetchOutcome::TooLarge => EXIT_TOO_LARGE,
            FetchOutcome::TransportError(_) => EXIT_IO_ERROR,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchOutcome::Success(r) => write!(f, "success ({} bytes)", r.data.len()),
            FetchOutcome::NotFound => write!(f, "not found"),
            FetchOutcome::TooLarge => write!(f, "too large"),
            FetchOutcome::TransportError(kind) => write!(f, "transport error: {}", kind),
        }
    }
}
