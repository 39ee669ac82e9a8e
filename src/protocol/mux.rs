//! Stream multiplexing frame codec
//!
//! The multiplexed variant splits one connection into independent logical
//! streams. Every unit on the wire is a frame tagged with the stream it
//! belongs to:
//!
//! ```text
//! ┌──────────────┬────────┬──────────────┬─────────────┐
//! │ stream_id u32│ kind u8│ length u32   │ payload ... │
//! └──────────────┴────────┴──────────────┴─────────────┘
//! ```
//!
//! All integers are big-endian. Stream id 0 is reserved. Frames for
//! distinct streams may interleave arbitrarily; within one stream, frame
//! order is preserved.
//!
//! A frame whose header parses but whose contents are invalid (unknown
//! kind, reserved stream id, oversized payload) is *malformed*: the codec
//! consumes it fully, keeping the connection in sync, and reports a
//! [`FrameError`] so the caller can tear down the owning stream only. A
//! truncated header or payload means framing sync is lost and surfaces as
//! an I/O error, ending the connection.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::Result;

/// Size of the fixed frame header
pub const FRAME_HEADER_LEN: usize = 9;

/// Frame type discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Client request text opening a logical stream
    Request = 1,
    /// Response or feed bytes (server to client)
    Data = 2,
    /// End of one logical stream; siblings are unaffected
    Close = 3,
}

impl FrameKind {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(FrameKind::Request),
            2 => Some(FrameKind::Data),
            3 => Some(FrameKind::Close),
            _ => None,
        }
    }
}

/// A decoded multiplexing frame
///
/// Cheap to clone; the payload is reference-counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Owning logical stream, unique within the connection
    pub stream_id: u32,
    /// Frame type
    pub kind: FrameKind,
    /// Frame body
    pub payload: Bytes,
}

impl Frame {
    /// Create a request frame
    pub fn request(stream_id: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            stream_id,
            kind: FrameKind::Request,
            payload: payload.into(),
        }
    }

    /// Create a data frame
    pub fn data(stream_id: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            stream_id,
            kind: FrameKind::Data,
            payload: payload.into(),
        }
    }

    /// Create a close frame
    pub fn close(stream_id: u32) -> Self {
        Self {
            stream_id,
            kind: FrameKind::Close,
            payload: Bytes::new(),
        }
    }
}

/// Malformed-frame classification
///
/// Each variant names the invariant that broke; all are fatal only to the
/// stream the frame was addressed to.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// Unrecognized frame kind byte
    #[error("unknown frame kind {kind} on stream {stream_id}")]
    UnknownKind { stream_id: u32, kind: u8 },

    /// Frame addressed to the reserved stream id 0
    #[error("frame addressed to reserved stream id 0")]
    ReservedStreamId,

    /// Payload length above the configured maximum
    #[error("oversized frame on stream {stream_id}: {len} bytes")]
    Oversized { stream_id: u32, len: usize },
}

impl FrameError {
    /// The stream the malformed frame was addressed to
    pub fn stream_id(&self) -> u32 {
        match self {
            FrameError::UnknownKind { stream_id, .. } => *stream_id,
            FrameError::ReservedStreamId => 0,
            FrameError::Oversized { stream_id, .. } => *stream_id,
        }
    }
}

/// Encode a frame into a contiguous buffer
pub fn encode(frame: &Frame) -> Bytes {
    let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + frame.payload.len());
    buf.put_u32(frame.stream_id);
    buf.put_u8(frame.kind as u8);
    buf.put_u32(frame.payload.len() as u32);
    buf.put_slice(&frame.payload);
    buf.freeze()
}

/// Write one frame
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&encode(frame)).await
}

/// Read one frame
///
/// Returns `Ok(None)` on clean end-of-stream (EOF at a frame boundary).
/// Malformed frames are consumed in full before the error is returned, so
/// the caller can keep reading sibling frames.
pub async fn read_frame<R>(reader: &mut R, max_payload: usize) -> Result<Option<Frame>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; FRAME_HEADER_LEN];

    // EOF before the first header byte is a normal connection close; EOF
    // anywhere later is a truncated frame.
    if reader.read(&mut header[..1]).await? == 0 {
        return Ok(None);
    }
    reader.read_exact(&mut header[1..]).await?;

    let mut fields = &header[..];
    let stream_id = fields.get_u32();
    let kind_byte = fields.get_u8();
    let len = fields.get_u32() as usize;

    if len > max_payload {
        discard(reader, len).await?;
        return Err(FrameError::Oversized { stream_id, len }.into());
    }

    let mut payload = BytesMut::zeroed(len);
    reader.read_exact(&mut payload).await?;

    let Some(kind) = FrameKind::from_u8(kind_byte) else {
        return Err(FrameError::UnknownKind {
            stream_id,
            kind: kind_byte,
        }
        .into());
    };
    if stream_id == 0 {
        return Err(FrameError::ReservedStreamId.into());
    }

    Ok(Some(Frame {
        stream_id,
        kind,
        payload: payload.freeze(),
    }))
}

/// Consume and drop `len` payload bytes to stay frame-aligned
async fn discard<R>(reader: &mut R, mut len: usize) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut scratch = [0u8; 8 * 1024];
    while len > 0 {
        let take = len.min(scratch.len());
        reader.read_exact(&mut scratch[..take]).await?;
        len -= take;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    const MAX: usize = 64 * 1024;

    async fn feed(frames: &[Bytes]) -> tokio::io::DuplexStream {
        let (mut tx, rx) = tokio::io::duplex(64 * 1024);
        for frame in frames {
            tx.write_all(frame).await.expect("feed");
        }
        drop(tx);
        rx
    }

    #[tokio::test]
    async fn test_round_trip() {
        let frame = Frame::request(7, Bytes::from_static(b"GET /events HTTP/1.1\r\n\r\n"));
        let mut rx = feed(&[encode(&frame)]).await;

        let decoded = read_frame(&mut rx, MAX).await.expect("read").expect("frame");
        assert_eq!(decoded, frame);
        assert!(read_frame(&mut rx, MAX).await.expect("eof").is_none());
    }

    #[tokio::test]
    async fn test_interleaved_streams_decode_independently() {
        let first = Frame::data(1, Bytes::from_static(b"for stream one"));
        let second = Frame::data(2, Bytes::from_static(b"for stream two"));
        let mut rx = feed(&[encode(&first), encode(&second), encode(&Frame::close(1))]).await;

        assert_eq!(read_frame(&mut rx, MAX).await.unwrap().unwrap(), first);
        assert_eq!(read_frame(&mut rx, MAX).await.unwrap().unwrap(), second);
        assert_eq!(
            read_frame(&mut rx, MAX).await.unwrap().unwrap(),
            Frame::close(1)
        );
    }

    #[tokio::test]
    async fn test_unknown_kind_is_stream_fatal_and_resyncs() {
        let mut bad = BytesMut::new();
        bad.put_u32(9);
        bad.put_u8(0xEE);
        bad.put_u32(3);
        bad.put_slice(b"???");
        let good = Frame::close(4);
        let mut rx = feed(&[bad.freeze(), encode(&good)]).await;

        match read_frame(&mut rx, MAX).await {
            Err(Error::Frame(err)) => {
                assert_eq!(err, FrameError::UnknownKind { stream_id: 9, kind: 0xEE });
                assert_eq!(err.stream_id(), 9);
            }
            other => panic!("expected frame error, got {other:?}"),
        }
        // The malformed frame was consumed; the next one decodes cleanly.
        assert_eq!(read_frame(&mut rx, MAX).await.unwrap().unwrap(), good);
    }

    #[tokio::test]
    async fn test_reserved_stream_id_rejected() {
        let frame = Frame::data(0, Bytes::from_static(b"nope"));
        let mut rx = feed(&[encode(&frame)]).await;

        match read_frame(&mut rx, MAX).await {
            Err(Error::Frame(FrameError::ReservedStreamId)) => {}
            other => panic!("expected reserved-id error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_oversized_frame_is_discarded_and_reported() {
        let big = Frame::data(3, Bytes::from(vec![0xAB; 100]));
        let good = Frame::close(3);
        let mut rx = feed(&[encode(&big), encode(&good)]).await;

        match read_frame(&mut rx, 16).await {
            Err(Error::Frame(FrameError::Oversized { stream_id: 3, len: 100 })) => {}
            other => panic!("expected oversized error, got {other:?}"),
        }
        assert_eq!(read_frame(&mut rx, MAX).await.unwrap().unwrap(), good);
    }

    #[tokio::test]
    async fn test_truncated_header_is_connection_fatal() {
        let mut rx = feed(&[Bytes::from_static(&[0, 0, 0, 1, 2])]).await;

        match read_frame(&mut rx, MAX).await {
            Err(Error::Io(err)) => {
                assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
            }
            other => panic!("expected i/o error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_write_frame_matches_encode() {
        let frame = Frame::data(5, Bytes::from_static(b"payload"));
        let (mut tx, mut rx) = tokio::io::duplex(1024);
        write_frame(&mut tx, &frame).await.expect("write");
        drop(tx);

        let mut wire = Vec::new();
        rx.read_to_end(&mut wire).await.expect("drain");
        assert_eq!(Bytes::from(wire), encode(&frame));
    }
}
