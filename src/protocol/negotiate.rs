//! Protocol variant negotiation
//!
//! The variant is decided from the ALPN outcome of the TLS handshake
//! itself, so no extra round trip is spent on negotiation. Exactly two
//! outcomes are recognized; anything else is fatal for the connection.

use crate::error::Error;

/// ALPN identifier for the multiplexed variant
pub const ALPN_MUX: &[u8] = b"ecast/mux";

/// ALPN identifier for the simple (one stream per connection) variant
pub const ALPN_SIMPLE: &[u8] = b"ecast/1";

/// The closed set of application protocol variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVariant {
    /// Many logical streams multiplexed over one connection
    Multiplexed,
    /// The whole connection is a single implicit stream
    Simple,
}

impl ProtocolVariant {
    /// Map a negotiated ALPN protocol to a variant
    ///
    /// `None` (no agreement) and unrecognized identifiers are
    /// [`Error::UnsupportedProtocol`]: fatal and unretryable for that
    /// connection only.
    pub fn from_alpn(alpn: Option<&[u8]>) -> Result<Self, Error> {
        match alpn {
            Some(proto) if proto == ALPN_MUX => Ok(ProtocolVariant::Multiplexed),
            Some(proto) if proto == ALPN_SIMPLE => Ok(ProtocolVariant::Simple),
            _ => Err(Error::UnsupportedProtocol),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognized_outcomes() {
        assert_eq!(
            ProtocolVariant::from_alpn(Some(ALPN_MUX)).unwrap(),
            ProtocolVariant::Multiplexed
        );
        assert_eq!(
            ProtocolVariant::from_alpn(Some(ALPN_SIMPLE)).unwrap(),
            ProtocolVariant::Simple
        );
    }

    #[test]
    fn test_unrecognized_outcomes_are_fatal() {
        assert!(matches!(
            ProtocolVariant::from_alpn(None),
            Err(Error::UnsupportedProtocol)
        ));
        assert!(matches!(
            ProtocolVariant::from_alpn(Some(b"http/1.1")),
            Err(Error::UnsupportedProtocol)
        ));
    }
}
