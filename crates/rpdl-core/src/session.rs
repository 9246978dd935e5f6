//! Single-request download state machine.
//!
//! `Init → Opened → Probing → Streaming → {Complete | Aborted}`. Content length
//! is checked before any body byte is requested; the body is accumulated in
//! one growing buffer and the result is all-or-nothing.

use std::fmt;

use crate::outcome::{FetchOutcome, FetchResult, TransportErrorKind};
use crate::request::FetchRequest;
use crate::transport::{Connection, Request, Transport, TransportError};

/// Size of every read after the first.
pub const BUF_SIZE_INCREMENT: usize = 64 * 1024;

/// Initial reservation when the server does not announce a length.
pub const UNKNOWN_LENGTH_RESERVE: usize = 256 * 1024;

/// Session state, logged on each transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Opened,
    Probing,
    Streaming,
    Complete,
    Aborted,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Init => "init",
            SessionState::Opened => "opened",
            SessionState::Probing => "probing",
            SessionState::Streaming => "streaming",
            SessionState::Complete => "complete",
            SessionState::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Why a session ended without a payload.
#[derive(Debug)]
enum Abort {
    NotFound,
    TooLarge,
    Transport(TransportErrorKind),
}

impl From<TransportError> for Abort {
    fn from(e: TransportError) -> Self {
        if e.is_not_found() {
            Abort::NotFound
        } else {
            Abort::Transport(e.kind())
        }
    }
}

/// One fetch attempt over a transport. Consumed by [`FetchSession::run`].
pub struct FetchSession<'t, T: Transport> {
    transport: &'t T,
    state: SessionState,
}

impl<'t, T: Transport> FetchSession<'t, T> {
    pub fn new(transport: &'t T) -> Self {
        Self {
            transport,
            state: SessionState::Init,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Performs exactly one attempt. No retries.
    pub fn run(mut self, request: &FetchRequest) -> FetchOutcome {
        match self.fetch(request) {
            Ok(result) => {
                self.transition(SessionState::Complete);
                tracing::info!(
                    url = request.url(),
                    bytes = result.data.len(),
                    mtime = ?result.mtime,
                    "fetch complete"
                );
                FetchOutcome::Success(result)
            }
            Err(abort) => {
                self.transition(SessionState::Aborted);
                let outcome = match abort {
                    Abort::NotFound => FetchOutcome::NotFound,
                    Abort::TooLarge => FetchOutcome::TooLarge,
                    Abort::Transport(kind) => FetchOutcome::TransportError(kind),
                };
                tracing::info!(url = request.url(), %outcome, "fetch aborted");
                outcome
            }
        }
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(from = %self.state, to = %next, "session state");
        self.state = next;
    }

    fn fetch(&mut self, request: &FetchRequest) -> Result<FetchResult, Abort> {
        let mut connection = self.transport.open_connection(request.user_agent())?;
        self.transition(SessionState::Opened);

        let mut stream = connection.open_request(request.url())?;
        self.transition(SessionState::Probing);

        let mtime = stream.last_modified();
        let content_length = stream.content_length();
        let max_size = request.max_size();

        let known_length = match content_length {
            Some(0) => {
                // Some origins answer a missing resource with an empty 200.
                tracing::debug!("zero Content-Length, treating as not found");
                return Err(Abort::NotFound);
            }
            Some(len) if len > max_size => {
                tracing::debug!(content_length = len, max_size, "Content-Length above ceiling");
                return Err(Abort::TooLarge);
            }
            Some(len) => Some(usize::try_from(len).map_err(|_| Abort::TooLarge)?),
            None => None,
        };

        self.transition(SessionState::Streaming);
        let data = read_body(&mut stream, known_length, max_size)?;
        if data.is_empty() {
            return Err(Abort::NotFound);
        }
        Ok(FetchResult { data, mtime })
    }
}

/// Reads until a zero-length chunk. Any read error discards the buffer.
fn read_body<R: Request>(
    stream: &mut R,
    known_length: Option<usize>,
    max_size: u64,
) -> Result<Vec<u8>, Abort> {
    let mut data: Vec<u8> = Vec::new();
    let (reserve, mut cur_increment) = match known_length {
        Some(len) => (len.checked_add(BUF_SIZE_INCREMENT), len),
        None => (
            Some(UNKNOWN_LENGTH_RESERVE + BUF_SIZE_INCREMENT),
            BUF_SIZE_INCREMENT,
        ),
    };
    // The announced length is server-controlled: an unallocatable one is too large.
    let reserved = reserve.is_some_and(|n| data.try_reserve(n).is_ok());
    if !reserved {
        tracing::debug!(?known_length, "cannot reserve body buffer");
        return Err(Abort::TooLarge);
    }

    loop {
        let prev_size = data.len();
        data.resize(prev_size + cur_increment, 0);

        let n = match stream.read_chunk(&mut data[prev_size..]) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = %e, received = prev_size, "body read failed");
                return Err(Abort::Transport(TransportErrorKind::ReadFailed));
            }
        };
        data.truncate(prev_size + n);
        if n == 0 {
            break;
        }
        if data.len() as u64 > max_size {
            tracing::debug!(received = data.len(), max_size, "body exceeded ceiling");
            return Err(Abort::TooLarge);
        }

        cur_increment = BUF_SIZE_INCREMENT;
    }

    Ok(data)
}
