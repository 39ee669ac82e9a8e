//! Feed request parsing and response rendering
//!
//! Both protocol variants carry the same plain-text request shape: one
//! request line (`METHOD SP PATH [SP VERSION]`), optional header lines,
//! then a blank line. On the simple variant the request arrives directly
//! on the connection; on the multiplexed variant it arrives as the payload
//! of a `Request` frame.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, Result};

/// A parsed feed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Request method (e.g. `GET`)
    pub method: String,
    /// Request path (e.g. `/events`)
    pub path: String,
}

/// Error type for request parsing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    /// No request line present
    #[error("empty request")]
    Empty,
    /// Request line did not contain method and path
    #[error("malformed request line: {0:?}")]
    MalformedRequestLine(String),
}

/// Parse the request text received through the blank line
///
/// Header lines after the request line are tolerated and ignored.
pub fn parse_request(text: &str) -> std::result::Result<Request, RequestError> {
    let line = text
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .ok_or(RequestError::Empty)?;

    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(method), Some(path)) => Ok(Request {
            method: method.to_string(),
            path: path.to_string(),
        }),
        _ => Err(RequestError::MalformedRequestLine(line.to_string())),
    }
}

/// Read raw request text from the transport, through the blank line
///
/// Returns `Ok(None)` when the peer closes before completing a request.
/// Exceeding `max_bytes` without a terminator is
/// [`Error::RequestTooLarge`].
pub async fn read_request<R>(reader: &mut R, max_bytes: usize) -> Result<Option<String>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(512);
    loop {
        if let Some(end) = terminator_end(&buf) {
            return Ok(Some(String::from_utf8_lossy(&buf[..end]).into_owned()));
        }
        if buf.len() >= max_bytes {
            return Err(Error::RequestTooLarge(max_bytes));
        }
        if reader.read_buf(&mut buf).await? == 0 {
            return Ok(None);
        }
    }
}

/// Position just past the blank line, if one has arrived
fn terminator_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|window| window == b"\r\n\r\n")
        .map(|pos| pos + 4)
        .or_else(|| {
            buf.windows(2)
                .position(|window| window == b"\n\n")
                .map(|pos| pos + 2)
        })
}

/// Response preamble for a successful subscription
///
/// Declares an open-ended text event stream, disables caching, permits
/// cross-origin reads and keeps the connection open. No `content-length`
/// and no completion: all further bytes come from the hub.
pub fn streaming_preamble() -> Bytes {
    Bytes::from_static(
        b"HTTP/1.1 200 OK\r\n\
          content-type: text/event-stream\r\n\
          cache-control: no-cache\r\n\
          access-control-allow-origin: *\r\n\
          connection: keep-alive\r\n\
          \r\n",
    )
}

fn terminal(status: &str, body: &str) -> Bytes {
    Bytes::from(format!(
        "HTTP/1.1 {status}\r\n\
         content-type: text/plain\r\n\
         content-length: {}\r\n\
         connection: close\r\n\
         \r\n\
         {body}",
        body.len()
    ))
}

/// Terminal response for an unknown path
pub fn not_found() -> Bytes {
    terminal("404 Not Found", "not found\n")
}

/// Terminal response for a non-GET request to the feed path
pub fn method_not_allowed() -> Bytes {
    terminal("405 Method Not Allowed", "method not allowed\n")
}

/// Terminal response for an unparseable request
pub fn bad_request() -> Bytes {
    terminal("400 Bad Request", "bad request\n")
}
