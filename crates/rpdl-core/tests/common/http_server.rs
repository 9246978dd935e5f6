//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves a fixed set of routes, one request per connection, and records the
//! request heads it received so tests can check what the client sent.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// How a route answers.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Status with a `Content-Length` body and optional `Last-Modified`.
    Fixed {
        status: &'static str,
        body: Vec<u8>,
        last_modified: Option<&'static str>,
    },
    /// 200 with `Transfer-Encoding: chunked`, split into `chunk` sized pieces.
    Chunked { body: Vec<u8>, chunk: usize },
    /// 200 with no length at all; the body ends when the connection closes.
    CloseDelimited { body: Vec<u8> },
    /// Declares `declared` bytes, sends `body`, then closes early.
    Truncated { declared: u64, body: Vec<u8> },
    /// 302 to another path on this server.
    Redirect { location: &'static str },
}

impl Reply {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Reply::Fixed {
            status: "200 OK",
            body: body.into(),
            last_modified: None,
        }
    }

    pub fn status(status: &'static str) -> Self {
        Reply::Fixed {
            status,
            body: b"error page".to_vec(),
            last_modified: None,
        }
    }
}

/// A running server. Lives until the test process exits.
pub struct TestServer {
    base: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl TestServer {
    /// URL for `path` (which must start with '/').
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Request heads received so far, in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// Starts a server in a background thread answering `routes`; unknown paths get 404.
pub fn start(routes: Vec<(&'static str, Reply)>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let routes: Arc<HashMap<&'static str, Reply>> = Arc::new(routes.into_iter().collect());
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&requests);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let routes = Arc::clone(&routes);
            let seen = Arc::clone(&seen);
            thread::spawn(move || handle(stream, &routes, &seen));
        }
    });
    TestServer {
        base: format!("http://127.0.0.1:{}", port),
        requests,
    }
}

fn read_head(stream: &mut TcpStream) -> Option<String> {
    let mut head = Vec::new();
    let mut buf = [0u8; 4096];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            return None;
        }
        head.extend_from_slice(&buf[..n]);
    }
    String::from_utf8(head).ok()
}

fn handle(mut stream: TcpStream, routes: &HashMap<&'static str, Reply>, seen: &Mutex<Vec<String>>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let head = match read_head(&mut stream) {
        Some(h) => h,
        None => return,
    };
    let path = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    seen.lock().unwrap().push(head);

    let reply = routes
        .get(path.as_str())
        .cloned()
        .unwrap_or_else(|| Reply::status("404 Not Found"));
    let _ = write_reply(&mut stream, reply);
}

fn write_reply(stream: &mut TcpStream, reply: Reply) -> std::io::Result<()> {
    match reply {
        Reply::Fixed {
            status,
            body,
            last_modified,
        } => {
            let lm = last_modified
                .map(|v| format!("Last-Modified: {}\r\n", v))
                .unwrap_or_default();
            let head = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n",
                status,
                body.len(),
                lm
            );
            stream.write_all(head.as_bytes())?;
            stream.write_all(&body)?;
        }
        Reply::Chunked { body, chunk } => {
            stream.write_all(
                b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
            )?;
            for piece in body.chunks(chunk.max(1)) {
                stream.write_all(format!("{:x}\r\n", piece.len()).as_bytes())?;
                stream.write_all(piece)?;
                stream.write_all(b"\r\n")?;
            }
            stream.write_all(b"0\r\n\r\n")?;
        }
        Reply::CloseDelimited { body } => {
            stream.write_all(b"HTTP/1.1 200 OK\r\nConnection: close\r\n\r\n")?;
            stream.write_all(&body)?;
        }
        Reply::Truncated { declared, body } => {
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                declared
            );
            stream.write_all(head.as_bytes())?;
            stream.write_all(&body)?;
        }
        Reply::Redirect { location } => {
            let head = format!(
                "HTTP/1.1 302 Found\r\nLocation: {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                location
            );
            stream.write_all(head.as_bytes())?;
        }
    }
    stream.flush()?;
    let _ = stream.shutdown(std::net::Shutdown::Write);
    Ok(())
}
