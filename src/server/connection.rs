//! Per-connection handshake and pipeline assembly
//!
//! The handshake decides everything: the TLS accept yields the ALPN
//! outcome, the negotiator maps it to exactly one protocol variant, and
//! the matching pipeline is assembled before any application data is read.

use std::sync::Arc;

use tokio::net::TcpStream;
use tokio_rustls::TlsAcceptor;

use crate::error::{Error, Result};
use crate::hub::BroadcasterHandle;
use crate::protocol::negotiate::ProtocolVariant;
use crate::server::config::ServerConfig;
use crate::session::{multiplexed, simple};

/// Handshake an accepted socket and run its negotiated pipeline to completion
pub(crate) async fn drive(
    socket: TcpStream,
    session_id: u64,
    acceptor: TlsAcceptor,
    config: Arc<ServerConfig>,
    hub: BroadcasterHandle,
) -> Result<()> {
    let tls = tokio::time::timeout(config.connection_timeout, acceptor.accept(socket))
        .await
        .map_err(|_| Error::HandshakeTimeout)??;

    // Negotiation happens exactly once per connection, with no extra round
    // trip: the outcome was carried by the handshake itself.
    let variant = ProtocolVariant::from_alpn(tls.get_ref().1.alpn_protocol())?;
    tracing::debug!(session_id, ?variant, "protocol negotiated");

    match variant {
        ProtocolVariant::Simple => simple::drive(tls, session_id, config, hub).await,
        ProtocolVariant::Multiplexed => multiplexed::drive(tls, session_id, config, hub).await,
    }
}
