//! Simple-variant connection driver
//!
//! The whole connection is one implicit logical stream: read one request,
//! answer it, and on a successful subscription hand the write half to a
//! writer task that is fed exclusively by the hub.

use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::hub::BroadcasterHandle;
use crate::protocol::request;
use crate::server::config::ServerConfig;
use crate::session::state::{RequestOutcome, StreamPipeline};

/// Drive a connection negotiated to the simple variant
pub(crate) async fn drive<S>(
    stream: S,
    session_id: u64,
    config: Arc<ServerConfig>,
    hub: BroadcasterHandle,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut pipeline = StreamPipeline::new(0);
    pipeline.open();

    let raw = match request::read_request(&mut reader, config.max_request_bytes).await {
        Ok(Some(text)) => text,
        Ok(None) => {
            // Peer left before completing a request.
            pipeline.close();
            return Ok(());
        }
        Err(Error::RequestTooLarge(limit)) => {
            writer.write_all(&request::bad_request()).await?;
            let _ = writer.shutdown().await;
            pipeline.close();
            return Err(Error::RequestTooLarge(limit));
        }
        Err(err) => return Err(err),
    };

    let parsed = match request::parse_request(&raw) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::debug!(session_id, error = %err, "malformed request");
            writer.write_all(&request::bad_request()).await?;
            let _ = writer.shutdown().await;
            pipeline.responded();
            return Ok(());
        }
    };

    let response = match StreamPipeline::classify(&parsed, &config.feed_path) {
        RequestOutcome::Subscribe => None,
        RequestOutcome::NotFound => Some(request::not_found()),
        RequestOutcome::MethodNotAllowed => Some(request::method_not_allowed()),
    };
    if let Some(response) = response {
        writer.write_all(&response).await?;
        writer.flush().await?;
        let _ = writer.shutdown().await;
        pipeline.responded();
        return Ok(());
    }

    // Subscription handshake: preamble first, then register the sink. From
    // here on the pipeline writes nothing itself; every further byte on
    // this connection is driven by the hub.
    writer.write_all(&request::streaming_preamble()).await?;
    writer.flush().await?;

    let subscriber_id = session_id << 32;
    let (sink_tx, mut sink_rx) =
        mpsc::channel::<Bytes>(config.hub.subscriber_queue_capacity.max(1));
    if hub.subscribe(subscriber_id, sink_tx).await.is_err() {
        tracing::warn!(session_id, "hub unavailable; closing connection");
        let _ = writer.shutdown().await;
        pipeline.close();
        return Ok(());
    }
    pipeline.subscribed(subscriber_id);
    tracing::debug!(session_id, subscriber_id, "feed subscription established");

    // Writer task owns the write half for the rest of the connection.
    let writer_task = tokio::spawn(async move {
        while let Some(chunk) = sink_rx.recv().await {
            if writer.write_all(&chunk).await.is_err() {
                break;
            }
            if writer.flush().await.is_err() {
                break;
            }
        }
        let _ = writer.shutdown().await;
    });

    // Park on the read half to notice peer disconnect; anything the peer
    // sends after the request is discarded.
    let mut scratch = [0u8; 1024];
    loop {
        match reader.read(&mut scratch).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
    }

    // Unsubscribe exactly once, before the writer winds down. The hub
    // holds the only sink sender, so removal closes the writer's queue.
    if let Some(id) = pipeline.close() {
        let _ = hub.unsubscribe(id).await;
    }
    let _ = writer_task.await;

    tracing::debug!(session_id, "feed stream closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::hub::{Broadcaster, HubConfig};

    fn test_config() -> Arc<ServerConfig> {
        Arc::new(ServerConfig::default())
    }

    async fn read_some(client: &mut tokio::io::DuplexStream, expected: usize) -> Vec<u8> {
        let mut collected = Vec::new();
        let mut scratch = [0u8; 4096];
        while collected.len() < expected {
            let n = tokio::time::timeout(Duration::from_secs(1), client.read(&mut scratch))
                .await
                .expect("read timeout")
                .expect("read");
            if n == 0 {
                break;
            }
            collected.extend_from_slice(&scratch[..n]);
        }
        collected
    }

    #[tokio::test]
    async fn subscription_receives_preamble_and_live_events() {
        let hub = Broadcaster::spawn(HubConfig::default());
        let (mut client, server) = tokio::io::duplex(16 * 1024);
        let driver = tokio::spawn(drive(server, 1, test_config(), hub.clone()));

        client
            .write_all(b"GET /events HTTP/1.1\r\n\r\n")
            .await
            .expect("request");

        let preamble = request::streaming_preamble();
        let received = read_some(&mut client, preamble.len()).await;
        assert_eq!(&received[..], &preamble[..]);

        // The subscription is registered once the preamble is out; wait for
        // the registry to reflect it before publishing.
        while hub.stats().active_subscribers() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        hub.publish(Bytes::from_static(b"alpha")).await.expect("publish");

        let frame = read_some(&mut client, 1).await;
        let text = String::from_utf8(frame).expect("utf8");
        assert!(text.starts_with("event: tick\nid: 0\ndata: alpha\n\n"), "got {text:?}");

        // Peer disconnect unsubscribes exactly once; the command is
        // processed asynchronously by the hub task.
        drop(client);
        driver.await.expect("join").expect("drive");
        tokio::time::timeout(Duration::from_secs(1), async {
            while hub.stats().active_subscribers() != 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("unsubscribe");
    }

    #[tokio::test]
    async fn unknown_path_gets_terminal_response() {
        let hub = Broadcaster::spawn(HubConfig::default());
        let (mut client, server) = tokio::io::duplex(4096);
        let driver = tokio::spawn(drive(server, 2, test_config(), hub.clone()));

        client
            .write_all(b"GET /other HTTP/1.1\r\n\r\n")
            .await
            .expect("request");

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.expect("response");
        let text = String::from_utf8(response).expect("utf8");
        assert!(text.starts_with("HTTP/1.1 404"));

        driver.await.expect("join").expect("drive");
        assert_eq!(hub.stats().active_subscribers(), 0);
    }

    #[tokio::test]
    async fn wrong_method_gets_terminal_response() {
        let hub = Broadcaster::spawn(HubConfig::default());
        let (mut client, server) = tokio::io::duplex(4096);
        let driver = tokio::spawn(drive(server, 3, test_config(), hub.clone()));

        client
            .write_all(b"POST /events HTTP/1.1\r\n\r\n")
            .await
            .expect("request");

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.expect("response");
        assert!(String::from_utf8(response).expect("utf8").starts_with("HTTP/1.1 405"));

        driver.await.expect("join").expect("drive");
    }

    #[tokio::test]
    async fn disconnect_before_request_is_clean() {
        let hub = Broadcaster::spawn(HubConfig::default());
        let (client, server) = tokio::io::duplex(4096);
        let driver = tokio::spawn(drive(server, 4, test_config(), hub));

        drop(client);
        driver.await.expect("join").expect("drive");
    }
}
