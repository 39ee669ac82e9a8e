//! Server: listener, TLS termination, per-connection negotiation

pub mod config;
pub mod listener;
pub mod tls;

mod connection;

pub use config::ServerConfig;
pub use listener::EventServer;
pub use tls::TlsSettings;
