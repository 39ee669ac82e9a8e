//! # eventcast
//!
//! A TLS event-feed broadcast server. One process terminates TLS, picks an
//! application protocol variant via ALPN during the handshake (no extra
//! round trip), demultiplexes logical streams on the multiplexed variant,
//! and fans a sequenced text event feed out to every subscribed stream.
//! A bounded replay buffer backfills late joiners.
//!
//! Event production is the caller's concern: anything holding a
//! [`BroadcasterHandle`] can publish opaque payload bytes, and the hub
//! assigns sequence numbers and delivers the framed events.
//!
//! ```no_run
//! use eventcast::{EventServer, ServerConfig, TlsSettings};
//!
//! #[tokio::main]
//! async fn main() -> eventcast::Result<()> {
//!     let tls = TlsSettings::self_signed(vec!["localhost".to_string()])?;
//!     let server = EventServer::bind(ServerConfig::default(), tls).await?;
//!
//!     let feed = server.handle();
//!     tokio::spawn(async move {
//!         let mut ticker = tokio::time::interval(std::time::Duration::from_secs(1));
//!         loop {
//!             ticker.tick().await;
//!             let _ = feed.publish("{\"load\":0.42}").await;
//!         }
//!     });
//!
//!     server.run().await
//! }
//! ```

pub mod error;
pub mod hub;
pub mod protocol;
pub mod server;
pub mod session;
pub mod stats;

pub use error::{Error, Result};
pub use hub::{BroadcasterHandle, Event, HubConfig};
pub use protocol::{ProtocolVariant, ALPN_MUX, ALPN_SIMPLE};
pub use server::{EventServer, ServerConfig, TlsSettings};
