//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

use crate::hub::HubConfig;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// TLS handshake and negotiation must complete within this time
    pub connection_timeout: Duration,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Path that exposes the broadcast feed
    pub feed_path: String,

    /// Maximum accepted request size
    pub max_request_bytes: usize,

    /// Maximum accepted multiplexing frame payload size
    pub max_frame_bytes: usize,

    /// Bound of the per-connection outbound frame queue
    pub write_queue_capacity: usize,

    /// Broadcast hub configuration
    pub hub: HubConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8443".parse().unwrap(),
            max_connections: 0, // Unlimited
            connection_timeout: Duration::from_secs(10),
            tcp_nodelay: true, // Important for low latency
            feed_path: "/events".to_string(),
            max_request_bytes: 8 * 1024,
            max_frame_bytes: 64 * 1024,
            write_queue_capacity: 64,
            hub: HubConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the handshake timeout
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the feed path
    pub fn feed_path(mut self, path: impl Into<String>) -> Self {
        self.feed_path = path.into();
        self
    }

    /// Set the hub configuration
    pub fn hub(mut self, hub: HubConfig) -> Self {
        self.hub = hub;
        self
    }

    /// Set the maximum multiplexing frame payload size
    pub fn max_frame_bytes(mut self, bytes: usize) -> Self {
        self.max_frame_bytes = bytes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 8443);
        assert_eq!(config.max_connections, 0);
        assert_eq!(config.connection_timeout, Duration::from_secs(10));
        assert!(config.tcp_nodelay);
        assert_eq!(config.feed_path, "/events");
        assert_eq!(config.max_request_bytes, 8 * 1024);
        assert_eq!(config.max_frame_bytes, 64 * 1024);
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:9443".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr.port(), 9443);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:8443".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .max_connections(50)
            .connection_timeout(Duration::from_secs(5))
            .feed_path("/feed")
            .max_frame_bytes(16 * 1024)
            .hub(HubConfig::default().replay_capacity(8));

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.connection_timeout, Duration::from_secs(5));
        assert_eq!(config.feed_path, "/feed");
        assert_eq!(config.max_frame_bytes, 16 * 1024);
        assert_eq!(config.hub.replay_capacity, 8);
    }
}
