//! TLS settings and acceptor construction
//!
//! The negotiation between the two protocol variants happens inside the
//! TLS handshake: both ALPN identifiers are offered here, and the selected
//! one is read back once the handshake completes.

use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio_rustls::TlsAcceptor;

use crate::error::Result;
use crate::protocol::negotiate::{ALPN_MUX, ALPN_SIMPLE};

/// Certificate material for the server
#[derive(Debug)]
pub struct TlsSettings {
    cert_chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl TlsSettings {
    /// Use an existing certificate chain and private key
    pub fn new(cert_chain: Vec<CertificateDer<'static>>, key: PrivateKeyDer<'static>) -> Self {
        Self { cert_chain, key }
    }

    /// Generate a self-signed certificate for the given hostnames
    ///
    /// Dev and test use only; production deployments load provisioned
    /// certificate material through [`TlsSettings::new`].
    pub fn self_signed(hostnames: impl Into<Vec<String>>) -> Result<Self> {
        let cert = rcgen::generate_simple_self_signed(hostnames.into())?;
        let cert_der = CertificateDer::from(cert.serialize_der()?);
        let key_der = PrivatePkcs8KeyDer::from(cert.get_key_pair().serialize_der());
        Ok(Self {
            cert_chain: vec![cert_der],
            key: key_der.into(),
        })
    }

    /// The configured certificate chain (leaf first)
    ///
    /// Test clients use this to trust a self-signed server.
    pub fn cert_chain(&self) -> &[CertificateDer<'static>] {
        &self.cert_chain
    }

    /// Build the TLS acceptor offering both protocol variants via ALPN
    pub(crate) fn into_acceptor(self) -> Result<TlsAcceptor> {
        let mut config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(self.cert_chain, self.key)?;
        config.alpn_protocols = vec![ALPN_MUX.to_vec(), ALPN_SIMPLE.to_vec()];
        Ok(TlsAcceptor::from(Arc::new(config)))
    }
}
