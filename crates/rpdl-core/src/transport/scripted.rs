//! In-memory transport that replays a script and records every call.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use super::{Connection, Request, Transport, TransportError};

/// What the fake server does.
#[derive(Debug, Clone, Default)]
pub(crate) struct Script {
    pub open_error: Option<TransportError>,
    pub request_error: Option<TransportError>,
    pub last_modified: Option<i64>,
    pub content_length: Option<u64>,
    /// Delivered in order; a chunk larger than the caller's buffer is split.
    pub chunks: Vec<Result<Vec<u8>, TransportError>>,
}

impl Script {
    pub fn body(content_length: Option<u64>, chunks: Vec<Vec<u8>>) -> Self {
        Self {
            content_length,
            chunks: chunks.into_iter().map(Ok).collect(),
            ..Self::default()
        }
    }
}

/// Calls observed by the transport.
#[derive(Debug, Default)]
pub(crate) struct CallLog {
    pub connections: usize,
    pub requests: usize,
    /// Buffer length passed to each `read_chunk`.
    pub reads: Vec<usize>,
    pub closed: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct ScriptedTransport {
    script: Script,
    log: Rc<RefCell<CallLog>>,
}

impl ScriptedTransport {
    pub fn new(script: Script) -> (Self, Rc<RefCell<CallLog>>) {
        let log = Rc::new(RefCell::new(CallLog::default()));
        (
            Self {
                script,
                log: Rc::clone(&log),
            },
            log,
        )
    }
}

impl Transport for ScriptedTransport {
    type Connection = ScriptedConnection;

    fn open_connection(&self, _user_agent: &str) -> Result<ScriptedConnection, TransportError> {
        self.log.borrow_mut().connections += 1;
        if let Some(e) = &self.script.open_error {
            return Err(e.clone());
        }
        Ok(ScriptedConnection {
            script: self.script.clone(),
            log: Rc::clone(&self.log),
        })
    }
}

pub(crate) struct ScriptedConnection {
    script: Script,
    log: Rc<RefCell<CallLog>>,
}

impl Connection for ScriptedConnection {
    type Request = ScriptedRequest;

    fn open_request(&mut self, _url: &str) -> Result<ScriptedRequest, TransportError> {
        self.log.borrow_mut().requests += 1;
        if let Some(e) = &self.script.request_error {
            return Err(e.clone());
        }
        Ok(ScriptedRequest {
            last_modified: self.script.last_modified,
            content_length: self.script.content_length,
            chunks: self.script.chunks.clone().into(),
            log: Rc::clone(&self.log),
        })
    }
}

pub(crate) struct ScriptedRequest {
    last_modified: Option<i64>,
    content_length: Option<u64>,
    chunks: VecDeque<Result<Vec<u8>, TransportError>>,
    log: Rc<RefCell<CallLog>>,
}

impl Request for ScriptedRequest {
    fn last_modified(&mut self) -> Option<i64> {
        self.last_modified
    }

    fn content_length(&mut self) -> Option<u64> {
        self.content_length
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        self.log.borrow_mut().reads.push(buf.len());
        match self.chunks.pop_front() {
            None => Ok(0),
            Some(Err(e)) => Err(e),
            Some(Ok(mut chunk)) => {
                if chunk.len() > buf.len() {
                    let rest = chunk.split_off(buf.len());
                    self.chunks.push_front(Ok(rest));
                }
                buf[..chunk.len()].copy_from_slice(&chunk);
                Ok(chunk.len())
            }
        }
    }
}

impl Drop for ScriptedRequest {
    fn drop(&mut self) {
        self.log.borrow_mut().closed = true;
    }
}
