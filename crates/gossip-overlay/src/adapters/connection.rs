//! Per-connection tasks shared by both listeners.
//!
//! A connection runs one reader loop (decode, hand to the service) and one
//! writer task (drain the handle's queue into the socket). Closing the handle
//! stops the reader; the writer flushes what is queued, then shuts the socket.
//! A message the codec refuses to encode is dropped; only I/O errors end the
//! writer.

use std::future::Future;
use std::net::SocketAddr;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::{Decoder, Encoder, Framed};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::connection::ConnectionHandle;
use crate::domain::{OverlayError, WireError};

/// Run one connection to completion.
///
/// Returns once the remote hung up, a frame failed to decode, `on_message`
/// returned an error that ends the connection, or the handle was closed.
pub async fn drive<S, C, M, F>(
    stream: S,
    codec: C,
    handle: ConnectionHandle<M>,
    mut outbound: mpsc::UnboundedReceiver<M>,
    mut on_message: F,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    C: Decoder<Item = M, Error = WireError> + Encoder<M, Error = WireError> + Send + 'static,
    M: Send + 'static,
    F: FnMut(M) -> Result<(), OverlayError>,
{
    let (mut sink, mut frames) = Framed::new(stream, codec).split();
    let shutdown = handle.shutdown_token();
    let remote = handle.remote().to_string();

    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                message = outbound.recv() => match message {
                    Some(message) => match sink.send(message).await {
                        Ok(()) => {}
                        Err(err) if err.is_io() => {
                            debug!(peer = %remote, error = %err, "Write failed");
                            break;
                        }
                        Err(err) => {
                            warn!(peer = %remote, error = %err, "Dropping unencodable message");
                        }
                    },
                    None => break,
                },
                _ = shutdown.cancelled() => {
                    while let Ok(message) = outbound.try_recv() {
                        if let Err(err) = sink.send(message).await {
                            if err.is_io() {
                                break;
                            }
                        }
                    }
                    break;
                }
            }
        }
        let _ = sink.close().await;
    });

    loop {
        tokio::select! {
            frame = frames.next() => match frame {
                Some(Ok(message)) => {
                    if let Err(err) = on_message(message) {
                        if err.closes_connection() {
                            warn!(peer = %handle.remote(), error = %err, "Closing connection");
                            break;
                        }
                        debug!(peer = %handle.remote(), error = %err, "Message dropped");
                    }
                }
                Some(Err(err)) => {
                    warn!(peer = %handle.remote(), error = %err, "Protocol error");
                    break;
                }
                None => {
                    debug!(peer = %handle.remote(), "Connection closed by remote");
                    break;
                }
            },
            _ = handle.closed() => break,
        }
    }

    handle.close();
    if let Err(err) = writer.await {
        debug!(peer = %handle.remote(), error = %err, "Writer task aborted");
    }
}

/// Accept connections until `shutdown` fires, spawning `serve` for each.
pub async fn accept_loop<F, Fut>(listener: TcpListener, shutdown: CancellationToken, serve: F)
where
    F: Fn(TcpStream, SocketAddr) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, remote)) => {
                    tokio::spawn(serve(stream, remote));
                }
                Err(err) => warn!(error = %err, "Accept failed"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ConnectionId;
    use crate::protocol::p2p::MAX_FRAME_LEN;
    use crate::protocol::{GossipBroadcast, ModuleCodec, ModuleMessage, PeerCodec, PeerMessage};

    #[tokio::test]
    async fn test_frames_flow_both_ways_and_close_flushes() {
        let (local, remote) = tokio::io::duplex(1024);
        let (handle, rx) = ConnectionHandle::<ModuleMessage>::new(ConnectionId::new(), "duplex");
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(drive(local, ModuleCodec, handle.clone(), rx, move |m| {
            let _ = seen_tx.send(m);
            Ok(())
        }));

        let mut other = Framed::new(remote, ModuleCodec);
        other
            .send(ModuleMessage::Notify { data_type: 7 })
            .await
            .unwrap();
        assert_eq!(
            seen_rx.recv().await,
            Some(ModuleMessage::Notify { data_type: 7 })
        );

        handle.send(ModuleMessage::Validation {
            message_id: 3,
            valid: true,
        });
        handle.close();
        task.await.unwrap();

        assert_eq!(
            other.next().await.unwrap().unwrap(),
            ModuleMessage::Validation {
                message_id: 3,
                valid: true
            }
        );
        assert!(other.next().await.is_none());
    }

    #[tokio::test]
    async fn test_protocol_error_ends_connection() {
        use tokio::io::AsyncWriteExt;

        let (local, mut remote) = tokio::io::duplex(1024);
        let (handle, rx) = ConnectionHandle::<ModuleMessage>::new(ConnectionId::new(), "duplex");
        let task = tokio::spawn(drive(local, ModuleCodec, handle.clone(), rx, |_| Ok(())));

        // Unknown message type 600.
        remote
            .write_all(&[0x00, 0x08, 0x02, 0x58, 0, 0, 0, 0])
            .await
            .unwrap();
        task.await.unwrap();
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn test_unencodable_message_keeps_link_open() {
        let (local, remote) = tokio::io::duplex(64 * 1024);
        let (handle, rx) = ConnectionHandle::<PeerMessage>::new(ConnectionId::new(), "duplex");
        let task = tokio::spawn(drive(local, PeerCodec::new(), handle.clone(), rx, |_| Ok(())));

        let oversized = PeerMessage::Broadcast(GossipBroadcast {
            data_type_id: 7,
            message_id: "aWQ=".to_string(),
            message: "A".repeat(MAX_FRAME_LEN),
            key_list: vec!["k1".to_string()],
            ttl: 3,
        });
        assert!(handle.send(oversized));
        assert!(handle.send(PeerMessage::failure("after")));

        let mut other = Framed::new(remote, PeerCodec::new());
        assert_eq!(
            other.next().await.unwrap().unwrap(),
            PeerMessage::failure("after")
        );
        assert!(!handle.is_closed());

        handle.close();
        task.await.unwrap();
        assert!(other.next().await.is_none());
    }
}
