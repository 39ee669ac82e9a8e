//! Feed server listener
//!
//! Handles the TCP accept loop and spawns one handler task per connection.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio_rustls::TlsAcceptor;

use crate::error::{Error, Result};
use crate::hub::{Broadcaster, BroadcasterHandle};
use crate::server::config::ServerConfig;
use crate::server::connection;
use crate::server::tls::TlsSettings;
use crate::stats::ServerStats;

/// TLS event-feed server
pub struct EventServer {
    listener: TcpListener,
    acceptor: TlsAcceptor,
    config: Arc<ServerConfig>,
    hub: BroadcasterHandle,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
    stats: Arc<ServerStats>,
}

impl EventServer {
    /// Bind the listener and spawn the broadcast hub
    pub async fn bind(config: ServerConfig, tls: TlsSettings) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        let acceptor = tls.into_acceptor()?;
        let hub = Broadcaster::spawn(config.hub.clone());

        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Ok(Self {
            listener,
            acceptor,
            config: Arc::new(config),
            hub,
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
            stats: Arc::new(ServerStats::new()),
        })
    }

    /// Handle for publishing into the feed
    pub fn handle(&self) -> BroadcasterHandle {
        self.hub.clone()
    }

    /// Server counters
    pub fn stats(&self) -> &Arc<ServerStats> {
        &self.stats
    }

    /// The locally bound address
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        tracing::info!(addr = %self.local_addr()?, "event feed server listening");
        self.accept_loop().await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        tracing::info!(addr = %self.local_addr()?, "event feed server listening");

        tokio::select! {
            _ = shutdown => {
                tracing::info!("shutdown signal received");
                Ok(())
            }
            result = self.accept_loop() => result,
        }
    }

    async fn accept_loop(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to accept connection");
                }
            }
        }
    }

    async fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let _permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    self.stats.record_rejected();
                    tracing::warn!(peer = %peer_addr, "connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        self.stats.record_accepted();

        tracing::debug!(session_id, peer = %peer_addr, "new connection");

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::debug!(session_id, error = %e, "failed to set TCP_NODELAY");
            }
        }

        let acceptor = self.acceptor.clone();
        let config = Arc::clone(&self.config);
        let hub = self.hub.clone();
        let stats = Arc::clone(&self.stats);

        tokio::spawn(async move {
            // The permit (if any) is held for the whole connection.
            let _permit = _permit;

            match connection::drive(socket, session_id, acceptor, config, hub).await {
                Ok(()) => {}
                Err(Error::UnsupportedProtocol) => {
                    stats.record_negotiation_failure();
                    tracing::warn!(
                        session_id,
                        peer = %peer_addr,
                        "no supported protocol negotiated; connection closed"
                    );
                }
                Err(e) => {
                    tracing::debug!(session_id, error = %e, "connection error");
                }
            }

            stats.record_closed();
            tracing::debug!(session_id, "connection closed");
        });
    }
}
