//! Multiplexed-variant connection driver
//!
//! One reader task demultiplexes inbound frames onto per-stream pipelines,
//! created lazily on the first frame that names a new stream id. Every
//! stream owns its own pipeline, sink queue and pump task; nothing is
//! shared between streams, so one stream's data can never surface on a
//! sibling. All outbound frames funnel through a single bounded queue
//! drained by the one task that owns the connection's write half.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::hub::BroadcasterHandle;
use crate::protocol::mux::{self, Frame, FrameKind};
use crate::protocol::request;
use crate::server::config::ServerConfig;
use crate::session::state::{RequestOutcome, StreamPipeline};

/// Drive a connection negotiated to the multiplexed variant
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
    let (out_tx, mut out_rx) = mpsc::channel::<Frame>(config.write_queue_capacity.max(1));

    // Sole owner of the write half; stream pumps feed it.
    let writer_task = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if mux::write_frame(&mut writer, &frame).await.is_err() {
                break;
            }
            if writer.flush().await.is_err() {
                break;
            }
        }
        let _ = writer.shutdown().await;
    });

    let mut streams: HashMap<u32, StreamPipeline> = HashMap::new();
    let result = read_loop(
        &mut reader,
        &mut streams,
        &out_tx,
        session_id,
        &config,
        &hub,
    )
    .await;

    // Connection teardown closes every owned stream and unsubscribes each
    // exactly once.
    for (_, mut pipeline) in streams.drain() {
        if let Some(id) = pipeline.close() {
            let _ = hub.unsubscribe(id).await;
        }
    }
    drop(out_tx);
    let _ = writer_task.await;

    tracing::debug!(session_id, "multiplexed connection closed");
    result
}

async fn read_loop<R>(
    reader: &mut R,
    streams: &mut HashMap<u32, StreamPipeline>,
    out_tx: &mpsc::Sender<Frame>,
    session_id: u64,
    config: &ServerConfig,
    hub: &BroadcasterHandle,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    loop {
        match mux::read_frame(reader, config.max_frame_bytes).await {
            Ok(Some(frame)) => {
                on_frame(frame, streams, out_tx, session_id, config, hub).await?;
            }
            Ok(None) => return Ok(()),
            // Malformed frame: fatal only to the owning stream. The codec
            // consumed the frame, so siblings keep flowing.
            Err(Error::Frame(err)) => {
                let stream_id = err.stream_id();
                tracing::warn!(
                    session_id,
                    stream_id,
                    error = %err,
                    "malformed frame; closing stream"
                );
                close_stream(streams, stream_id, hub).await;
                if stream_id != 0 {
                    send_out(out_tx, Frame::close(stream_id)).await?;
                }
            }
            Err(err) => return Err(err),
        }
    }
}

async fn on_frame(
    frame: Frame,
    streams: &mut HashMap<u32, StreamPipeline>,
    out_tx: &mpsc::Sender<Frame>,
    session_id: u64,
    config: &ServerConfig,
    hub: &BroadcasterHandle,
) -> Result<()> {
    let stream_id = frame.stream_id;
    match frame.kind {
        FrameKind::Request => {
            if streams.contains_key(&stream_id) {
                tracing::warn!(session_id, stream_id, "second request on open stream; closing stream");
                close_stream(streams, stream_id, hub).await;
                return send_out(out_tx, Frame::close(stream_id)).await;
            }

            // Fresh pipeline per stream id, never reused across streams.
            let mut pipeline = StreamPipeline::new(stream_id);
            pipeline.open();

            let text = String::from_utf8_lossy(&frame.payload);
            let parsed = match request::parse_request(&text) {
                Ok(parsed) => parsed,
                Err(err) => {
                    tracing::debug!(session_id, stream_id, error = %err, "malformed request");
                    send_out(out_tx, Frame::data(stream_id, request::bad_request())).await?;
                    return send_out(out_tx, Frame::close(stream_id)).await;
                }
            };

            match StreamPipeline::classify(&parsed, &config.feed_path) {
                RequestOutcome::Subscribe => {
                    send_out(out_tx, Frame::data(stream_id, request::streaming_preamble())).await?;

                    let subscriber_id = session_id << 32 | u64::from(stream_id);
                    let (sink_tx, mut sink_rx) =
                        mpsc::channel::<Bytes>(config.hub.subscriber_queue_capacity.max(1));

                    // Pump: this stream's own execution context. The hub
                    // only ever touches the sink sender; the pump wraps
                    // each chunk into a frame for the shared writer.
                    let pump_out = out_tx.clone();
                    tokio::spawn(async move {
                        while let Some(chunk) = sink_rx.recv().await {
                            if pump_out.send(Frame::data(stream_id, chunk)).await.is_err() {
                                break;
                            }
                        }
                    });

                    if hub.subscribe(subscriber_id, sink_tx).await.is_err() {
                        tracing::warn!(session_id, stream_id, "hub unavailable; closing stream");
                        return send_out(out_tx, Frame::close(stream_id)).await;
                    }
                    pipeline.subscribed(subscriber_id);
                    streams.insert(stream_id, pipeline);
                    tracing::debug!(
                        session_id,
                        stream_id,
                        subscriber_id,
                        "feed subscription established"
                    );
                }
                RequestOutcome::NotFound => {
                    send_out(out_tx, Frame::data(stream_id, request::not_found())).await?;
                    send_out(out_tx, Frame::close(stream_id)).await?;
                    pipeline.responded();
                }
                RequestOutcome::MethodNotAllowed => {
                    send_out(out_tx, Frame::data(stream_id, request::method_not_allowed())).await?;
                    send_out(out_tx, Frame::close(stream_id)).await?;
                    pipeline.responded();
                }
            }
        }
        FrameKind::Data => {
            // Clients have nothing to send after the request.
            tracing::warn!(session_id, stream_id, "unexpected data frame; closing stream");
            close_stream(streams, stream_id, hub).await;
            send_out(out_tx, Frame::close(stream_id)).await?;
        }
        FrameKind::Close => {
            close_stream(streams, stream_id, hub).await;
        }
    }
    Ok(())
}

/// Tear down one logical stream; siblings are unaffected
async fn close_stream(
    streams: &mut HashMap<u32, StreamPipeline>,
    stream_id: u32,
    hub: &BroadcasterHandle,
) {
    if let Some(mut pipeline) = streams.remove(&stream_id) {
        if let Some(id) = pipeline.close() {
            let _ = hub.unsubscribe(id).await;
        }
    }
}

async fn send_out(out_tx: &mpsc::Sender<Frame>, frame: Frame) -> Result<()> {
    out_tx.send(frame).await.map_err(|_| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "connection writer stopped",
        ))
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use tokio::io::DuplexStream;

    use super::*;
    use crate::hub::{Broadcaster, HubConfig};

    const MAX: usize = 64 * 1024;

    async fn start(
        hub: BroadcasterHandle,
    ) -> (DuplexStream, tokio::task::JoinHandle<Result<()>>) {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let driver = tokio::spawn(drive(
            server,
            1,
            Arc::new(ServerConfig::default()),
            hub,
        ));
        (client, driver)
    }

    async fn next_frame(client: &mut DuplexStream) -> Frame {
        tokio::time::timeout(Duration::from_secs(1), mux::read_frame(client, MAX))
            .await
            .expect("frame timeout")
            .expect("read")
            .expect("open")
    }

    async fn subscribe_stream(client: &mut DuplexStream, stream_id: u32) {
        mux::write_frame(
            client,
            &Frame::request(stream_id, Bytes::from_static(b"GET /events HTTP/1.1\r\n\r\n")),
        )
        .await
        .expect("request");
        let preamble = next_frame(client).await;
        assert_eq!(preamble.stream_id, stream_id);
        assert_eq!(preamble.kind, FrameKind::Data);
        assert_eq!(preamble.payload, request::streaming_preamble());
    }

    async fn wait_for_subscribers(hub: &BroadcasterHandle, count: u64) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while hub.stats().active_subscribers() != count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("subscriber count");
    }

    #[tokio::test]
    async fn two_streams_receive_the_same_publish() {
        let hub = Broadcaster::spawn(HubConfig::default());
        let (mut client, driver) = start(hub.clone()).await;

        subscribe_stream(&mut client, 1).await;
        subscribe_stream(&mut client, 2).await;
        wait_for_subscribers(&hub, 2).await;

        hub.publish(Bytes::from_static(b"shared")).await.expect("publish");

        // One frame per stream, identical payload and sequence number;
        // cross-stream order is unspecified.
        let mut seen: HashMap<u32, Bytes> = HashMap::new();
        for _ in 0..2 {
            let frame = next_frame(&mut client).await;
            assert_eq!(frame.kind, FrameKind::Data);
            assert!(seen.insert(frame.stream_id, frame.payload).is_none());
        }
        let one = seen.remove(&1).expect("stream 1 frame");
        let two = seen.remove(&2).expect("stream 2 frame");
        assert_eq!(one, two);
        assert!(one.starts_with(b"event: tick\nid: 0\ndata: shared\n\n"));

        drop(client);
        driver.await.expect("join").expect("drive");
        wait_for_subscribers(&hub, 0).await;
    }

    #[tokio::test]
    async fn closing_one_stream_leaves_siblings_alive() {
        let hub = Broadcaster::spawn(HubConfig::default());
        let (mut client, driver) = start(hub.clone()).await;

        subscribe_stream(&mut client, 1).await;
        subscribe_stream(&mut client, 2).await;
        wait_for_subscribers(&hub, 2).await;

        mux::write_frame(&mut client, &Frame::close(1)).await.expect("close");
        wait_for_subscribers(&hub, 1).await;

        hub.publish(Bytes::from_static(b"still here")).await.expect("publish");
        let frame = next_frame(&mut client).await;
        assert_eq!(frame.stream_id, 2);
        assert!(frame.payload.starts_with(b"event: tick\nid: 0\ndata: still here\n\n"));

        drop(client);
        driver.await.expect("join").expect("drive");
    }

    #[tokio::test]
    async fn double_close_is_a_noop() {
        let hub = Broadcaster::spawn(HubConfig::default());
        let (mut client, driver) = start(hub.clone()).await;

        subscribe_stream(&mut client, 3).await;
        wait_for_subscribers(&hub, 1).await;

        mux::write_frame(&mut client, &Frame::close(3)).await.expect("close");
        mux::write_frame(&mut client, &Frame::close(3)).await.expect("close again");
        wait_for_subscribers(&hub, 0).await;

        drop(client);
        driver.await.expect("join").expect("drive");
    }

    #[tokio::test]
    async fn non_feed_path_gets_terminal_response_and_close() {
        let hub = Broadcaster::spawn(HubConfig::default());
        let (mut client, driver) = start(hub.clone()).await;

        mux::write_frame(
            &mut client,
            &Frame::request(5, Bytes::from_static(b"GET /other HTTP/1.1\r\n\r\n")),
        )
        .await
        .expect("request");

        let response = next_frame(&mut client).await;
        assert_eq!(response.stream_id, 5);
        assert!(response.payload.starts_with(b"HTTP/1.1 404"));
        let close = next_frame(&mut client).await;
        assert_eq!(close.kind, FrameKind::Close);
        assert_eq!(close.stream_id, 5);
        assert_eq!(hub.stats().active_subscribers(), 0);

        drop(client);
        driver.await.expect("join").expect("drive");
    }

    #[tokio::test]
    async fn malformed_frame_kills_only_its_stream() {
        let hub = Broadcaster::spawn(HubConfig::default());
        let (mut client, driver) = start(hub.clone()).await;

        subscribe_stream(&mut client, 1).await;
        subscribe_stream(&mut client, 2).await;
        wait_for_subscribers(&hub, 2).await;

        // Hand-built frame with an unknown kind byte, addressed to stream 1.
        let mut bad = bytes::BytesMut::new();
        use bytes::BufMut;
        bad.put_u32(1);
        bad.put_u8(0x7F);
        bad.put_u32(0);
        tokio::io::AsyncWriteExt::write_all(&mut client, &bad).await.expect("bad frame");

        // Stream 1 is torn down with a close frame; stream 2 keeps flowing.
        let close = next_frame(&mut client).await;
        assert_eq!(close.kind, FrameKind::Close);
        assert_eq!(close.stream_id, 1);
        wait_for_subscribers(&hub, 1).await;

        hub.publish(Bytes::from_static(b"survivor")).await.expect("publish");
        let frame = next_frame(&mut client).await;
        assert_eq!(frame.stream_id, 2);

        drop(client);
        driver.await.expect("join").expect("drive");
    }
}
