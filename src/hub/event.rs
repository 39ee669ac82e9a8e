//! Event values and wire framing
//!
//! An event is produced by an external source and sequenced by the hub.
//! The wire frame is UTF-8 text: an event-type line, an identifier line
//! carrying the sequence number, a data line carrying the payload, then a
//! blank line.

use std::time::SystemTime;

use bytes::{BufMut, Bytes, BytesMut};

/// An immutable published event
///
/// Cheap to clone: the payload is reference-counted, not copied.
#[derive(Debug, Clone)]
pub struct Event {
    /// Sequence number assigned by the hub, monotonically increasing per
    /// hub instance; never repeats or goes backward within a server lifetime
    pub seq: u64,

    /// Opaque payload bytes (serialized upstream; must not contain newlines)
    pub payload: Bytes,

    /// When the event was accepted for publication
    pub timestamp: SystemTime,
}

impl Event {
    /// Create an event with an already-assigned sequence number
    pub fn new(seq: u64, payload: Bytes, timestamp: SystemTime) -> Self {
        Self {
            seq,
            payload,
            timestamp,
        }
    }
}

/// Encode an event into its text wire frame
///
/// ```text
/// event: <name>\n
/// id: <seq>\n
/// data: <payload>\n
/// \n
/// ```
pub fn encode_frame(event: &Event, event_name: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(32 + event_name.len() + event.payload.len());
    buf.put_slice(b"event: ");
    buf.put_slice(event_name.as_bytes());
    buf.put_slice(b"\nid: ");
    buf.put_slice(event.seq.to_string().as_bytes());
    buf.put_slice(b"\ndata: ");
    buf.put_slice(&event.payload);
    buf.put_slice(b"\n\n");
    buf.freeze()
}
