//! Crate error types
//!
//! All fallible library paths return [`Result`]. Per-connection and
//! per-stream failures are isolated by the callers; nothing in here
//! escalates to a process-wide failure.

pub use crate::protocol::mux::FrameError;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport-level I/O failure
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS configuration or handshake failure
    #[error("tls error: {0}")]
    Tls(#[from] rustls::Error),

    /// Self-signed certificate generation failure
    #[error("certificate generation failed: {0}")]
    Certificate(#[from] rcgen::Error),

    /// The peer agreed to no recognized application protocol.
    /// Fatal for the connection; the connection is torn down without retry.
    #[error("no supported application protocol negotiated")]
    UnsupportedProtocol,

    /// The TLS handshake did not complete within the configured timeout
    #[error("tls handshake timed out")]
    HandshakeTimeout,

    /// Malformed multiplexing frame. Fatal only to the owning logical
    /// stream; the connection itself stays in sync.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// Inbound request exceeded the configured size limit
    #[error("request too large (limit {0} bytes)")]
    RequestTooLarge(usize),
}
