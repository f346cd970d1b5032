//! Minimal HTTP/1.1 request parsing and response writing
//!
//! One request per connection; the server always answers with
//! `Connection: close`.

use std::io::{self, BufRead, BufReader, Read, Write};

/// Upper bound on request line plus headers
const MAX_HEAD_BYTES: usize = 8 * 1024;
/// Upper bound on a request body
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// A parsed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    /// Path without the query string
    pub path: String,
    pub body: Vec<u8>,
}

impl Request {
    /// Read one request; `Ok(None)` when the peer closed without sending
    pub fn read_from<R: Read>(stream: R) -> io::Result<Option<Request>> {
        let mut reader = BufReader::new(stream.take((MAX_HEAD_BYTES + MAX_BODY_BYTES) as u64));
        let mut head_bytes = 0;

        let mut request_line = String::new();
        if reader.read_line(&mut request_line)? == 0 {
            return Ok(None);
        }
        head_bytes += request_line.len();

        let mut parts = request_line.split_whitespace();
        let (method, target) = match (parts.next(), parts.next()) {
            (Some(method), Some(target)) => (method.to_string(), target),
            _ => return Err(invalid("malformed request line")),
        };
        let path = target.split('?').next().unwrap_or("/").to_string();

        let mut content_length = 0usize;
        loop {
            let mut header = String::new();
            let n = reader.read_line(&mut header)?;
            head_bytes += n;
            if n == 0 || head_bytes > MAX_HEAD_BYTES {
                return Err(invalid("request head too large or truncated"));
            }
            let header = header.trim_end();
            if header.is_empty() {
                break;
            }
            if let Some((name, value)) = header.split_once(':') {
                if name.trim().eq_ignore_ascii_case("content-length") {
                    content_length = value
                        .trim()
                        .parse()
                        .map_err(|_| invalid("bad content-length"))?;
                }
            }
        }

        if content_length > MAX_BODY_BYTES {
            return Err(invalid("request body too large"));
        }
        let mut body = vec![0u8; content_length];
        reader.read_exact(&mut body).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => invalid("request body shorter than content-length"),
            _ => e,
        })?;

        Ok(Some(Request { method, path, body }))
    }
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

/// A response ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: &'static str,
    pub content_type: &'static str,
    pub body: String,
}

impl Response {
    pub fn text(status: &'static str, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8",
            body: body.into(),
        }
    }

    pub fn json(status: &'static str, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: body.into(),
        }
    }

    /// Status code as a number, for logging
    pub fn code(&self) -> u16 {
        self.status
            .split_whitespace()
            .next()
            .and_then(|code| code.parse().ok())
            .unwrap_or(500)
    }

    pub fn write_to<W: Write>(&self, mut stream: W) -> io::Result<()> {
        let response = format!(
            "HTTP/1.1 {}\r\n\
             Content-Type: {}\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\
             \r\n\
             {}",
            self.status,
            self.content_type,
            self.body.len(),
            self.body
        );
        stream.write_all(response.as_bytes())?;
        stream.flush()
    }
}
