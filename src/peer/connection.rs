use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;

use futures::SinkExt;
use log::{debug, info, warn};
use size::Size;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout};
use tokio_stream::StreamExt;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

use crate::client::Download;
use crate::codec::{AsyncDecoder, AsyncEncoder, TransportMessage};
use crate::core::TransferRate;
use crate::event::Event;
use crate::message::{Handshake, Message, MessageCodec};
use crate::peer::stats::PeerStats;

/// Why a peer connection was closed. Peer-local by design: none of these
/// outcomes affect other connections or the session.
#[derive(Debug, Error)]
pub enum PeerError {
    /// The transport stream could not be opened.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// The peer's handshake was malformed or for a different torrent.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// No traffic received from the peer for too long.
    #[error("peer timed out")]
    Timeout,

    /// The peer broke the wire protocol.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// Transport-level failure mid-session.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PeerError {
    /// Whether the address should be put in reconnect cooldown.
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            Self::ConnectFailed(_) | Self::HandshakeFailed(_) | Self::Timeout
        )
    }
}

/// One spawned task per remote peer: opens the transport (unless an accepted
/// socket is handed in), exchanges handshakes, then pumps framed messages in
/// both directions until cancelled or the peer goes away.
pub struct Connection {
    pub tx: Sender<Message>,
    join_handle: JoinHandle<()>,
    cancellation_token: CancellationToken,
}

impl Connection {
    pub fn spawn(
        addr: SocketAddr,
        socket: Option<TcpStream>,
        events_tx: Sender<Event>,
        download: Arc<Download>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(download.config.channel_buffer);
        let cancellation_token = CancellationToken::new();
        let token_clone = cancellation_token.clone();
        let join_handle = tokio::spawn(async move {
            let result = run(addr, socket, download, events_tx.clone(), rx, token_clone).await;
            let error = match result {
                Ok(()) => {
                    info!("peer {} disconnected", addr);
                    None
                }
                Err(err) => {
                    warn!("[{}] connection closed: {}", addr, err);
                    Some(err)
                }
            };
            if events_tx
                .send(Event::Disconnected(addr, error))
                .await
                .is_err()
            {
                // Session is already shutting down
                debug!("[{}] event channel closed", addr);
            }
        });
        Self {
            tx,
            join_handle,
            cancellation_token,
        }
    }

    pub async fn send(&self, message: Message) {
        if self.tx.send(message).await.is_err() {
            warn!("channel already closed");
        }
    }

    pub fn abort(self) {
        self.join_handle.abort();
    }

    pub async fn shutdown(self) -> anyhow::Result<()> {
        self.cancellation_token.cancel();
        self.join_handle.await?;
        Ok(())
    }
}

async fn run(
    addr: SocketAddr,
    socket: Option<TcpStream>,
    download: Arc<Download>,
    events_tx: Sender<Event>,
    mut rx: Receiver<Message>,
    cancellation_token: CancellationToken,
) -> Result<(), PeerError> {
    let config = &download.config;
    let handshake = Handshake::new(
        download.torrent.info.info_hash.clone(),
        config.client_id.clone(),
    );

    let (mut socket, direction) = connect_if_needed(addr, socket, config.connect_timeout).await?;
    timeout(
        config.connect_timeout,
        exchange_handshakes(&mut socket, handshake, direction),
    )
    .await
    .map_err(|_| PeerError::HandshakeFailed("handshake timed out".to_string()))??;

    let max_size = (config.block_size.bytes() as usize) + 9;
    let mut messages = Framed::new(socket, MessageCodec::new(max_size));
    let mut update_stats = tokio::time::interval(config.update_stats_interval);
    let mut stats = PeerStats::default();
    let mut running = true;

    while running {
        let start = Instant::now();
        tokio::select! {
            _ = update_stats.tick() => {
                let sample = std::mem::take(&mut stats);
                let event = Event::StatsUpdated(addr, sample);
                if events_tx.send(event).await.is_err() {
                    running = false;
                }
            },
            Some(message) = rx.recv() => {
                debug!("[{}] > sending {:?}", addr, &message);
                let message_size = Size::from_bytes(message.transport_bytes());
                messages.send(message).await?;
                let elapsed = Instant::now() - start;
                stats.upload += TransferRate(message_size, elapsed);
            },
            message = messages.next() => match message {
                Some(Ok(message)) => {
                    debug!("[{}] < got {:?}", addr, message);
                    let elapsed = Instant::now() - start;
                    let message_size = Size::from_bytes(message.transport_bytes());
                    stats.download += TransferRate(message_size, elapsed);
                    let event = Event::MessageReceived(addr, message);
                    if events_tx.send(event).await.is_err() {
                        running = false;
                    }
                }
                Some(Err(err)) if err.kind() == ErrorKind::InvalidData => {
                    return Err(PeerError::ProtocolViolation(err.to_string()));
                }
                Some(Err(err)) => {
                    return Err(PeerError::Io(err));
                }
                None => {
                    info!("[{}] socket closed, shutting down...", addr);
                    running = false;
                }
            },
            _ = cancellation_token.cancelled() => {
                info!("[{}] shutting down...", addr);
                running = false;
            }
        }
    }

    messages.flush().await?;
    Ok(())
}

async fn connect_if_needed(
    addr: SocketAddr,
    socket: Option<TcpStream>,
    connect_timeout: std::time::Duration,
) -> Result<(TcpStream, HandshakeDirection), PeerError> {
    match socket {
        Some(socket) => {
            info!("accepted connection from {}", addr);
            Ok((socket, HandshakeDirection::PeerToClient))
        }
        None => {
            info!("connecting to {}...", addr);
            let socket = timeout(connect_timeout, TcpStream::connect(addr))
                .await
                .map_err(|_| PeerError::ConnectFailed("connect timed out".to_string()))?
                .map_err(|err| PeerError::ConnectFailed(err.to_string()))?;
            Ok((socket, HandshakeDirection::ClientToPeer))
        }
    }
}

async fn exchange_handshakes(
    socket: &mut TcpStream,
    handshake: Handshake,
    direction: HandshakeDirection,
) -> Result<(), PeerError> {
    if direction == HandshakeDirection::ClientToPeer {
        // Send handshake first
        handshake.encode(socket).await?;
    }
    // Wait for handshake from peer
    let handshake_got = Handshake::decode(socket)
        .await
        .map_err(|err| PeerError::HandshakeFailed(err.to_string()))?;
    if direction == HandshakeDirection::PeerToClient {
        // Send handshake second
        handshake.encode(socket).await?;
    }
    if handshake.info_hash != handshake_got.info_hash {
        return Err(PeerError::HandshakeFailed("info hash mismatch".to_string()));
    }
    if !handshake_got.is_standard_protocol() {
        return Err(PeerError::HandshakeFailed(format!(
            "unsupported protocol: {}",
            handshake_got.protocol
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum HandshakeDirection {
    ClientToPeer,
    PeerToClient,
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    use crate::client::tests::create_download;
    use crate::core::PeerId;
    use crate::crypto::Sha1;

    use super::*;

    #[tokio::test]
    async fn handshake_info_hash_mismatch_closes_connection() {
        let download = Arc::new(create_download());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // A "peer" serving some other torrent
        let other = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let _ = Handshake::decode(&mut socket).await.unwrap();
            let reply = Handshake::new(Sha1([9; 20]), PeerId::random());
            reply.encode(&mut socket).await.unwrap();
            socket.flush().await.unwrap();
        });

        let (events_tx, mut events_rx) = mpsc::channel(8);
        let _connection = Connection::spawn(addr, None, events_tx, download);

        let event = events_rx.recv().await.expect("no event");
        match event {
            Event::Disconnected(peer, Some(PeerError::HandshakeFailed(reason))) => {
                assert_eq!(peer, addr);
                assert_eq!(reason, "info hash mismatch");
            }
            other => panic!("unexpected event: {:?}", other),
        }
        other.await.unwrap();
    }

    #[tokio::test]
    async fn connect_refused_reports_failure() {
        let download = Arc::new(create_download());
        // Bind-then-drop to get an address nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (events_tx, mut events_rx) = mpsc::channel(8);
        let _connection = Connection::spawn(addr, None, events_tx, download);

        let event = events_rx.recv().await.expect("no event");
        assert!(matches!(
            event,
            Event::Disconnected(_, Some(PeerError::ConnectFailed(_)))
        ));
    }
}
