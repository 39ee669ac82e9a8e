//! Tail client for the event feed
//!
//! Run with: cargo run --example tail_client [ADDR]
//!
//! Connects over TLS with the simple-variant ALPN identifier, subscribes
//! to the feed path and prints every received event to stdout. Accepts any
//! server certificate, so it pairs with the self-signed simple_server
//! demo. Do not reuse the verifier outside of demos and tests.

use std::sync::Arc;

use anyhow::{Context, Result};
use rustls::pki_types::ServerName;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use eventcast::ALPN_SIMPLE;

#[tokio::main]
async fn main() -> Result<()> {
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:8443".to_string());
    let addr = addr.replace("localhost", "127.0.0.1");

    let mut config = rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(NoCertVerifier))
        .with_no_client_auth();
    config.alpn_protocols = vec![ALPN_SIMPLE.to_vec()];
    let connector = TlsConnector::from(Arc::new(config));

    let tcp = TcpStream::connect(&addr)
        .await
        .with_context(|| format!("connect to {addr}"))?;
    let server_name = ServerName::try_from("localhost").context("server name")?;
    let mut tls = connector.connect(server_name, tcp).await.context("tls handshake")?;

    tls.write_all(b"GET /events HTTP/1.1\r\n\r\n")
        .await
        .context("send request")?;

    println!("subscribed to {addr}; waiting for events (ctrl-c to quit)");
    let mut buf = [0u8; 4096];
    loop {
        let n = tls.read(&mut buf).await.context("read feed")?;
        if n == 0 {
            println!("server closed the feed");
            return Ok(());
        }
        print!("{}", String::from_utf8_lossy(&buf[..n]));
    }
}

// Dangerous: certificate verifier that accepts any certificate
#[derive(Debug)]
struct NoCertVerifier;

impl rustls::client::danger::ServerCertVerifier for NoCertVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer,
        _intermediates: &[rustls::pki_types::CertificateDer],
        _server_name: &rustls::pki_types::ServerName,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ED25519,
        ]
    }
}
